use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vastu::angle::Point;
use vastu::config::{self, ConfigError, RotationDirection, Settings};
use vastu::engine::EngineCore;
use vastu::layout::ZoneLayout;


#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid {arg} '{value}'; expected two numbers as X,Y")]
    InvalidPoint { arg: &'static str, value: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("image size must be positive, got {width}x{height}")]
    EmptyImage { width: f64, height: f64 },
    #[error("reference point must differ from the center")]
    Uncalibrated,
    #[error("point coincides with the center and has no direction")]
    PointAtCenter,
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "vastu", about = "Vastu zone layout calculator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print north and the sixteen zone sectors.
    Layout {
        #[command(flatten)]
        calibration: CalibrationArgs,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print the zone containing a point.
    Locate {
        #[command(flatten)]
        calibration: CalibrationArgs,
        #[arg(long, allow_hyphen_values = true)]
        point: String,
    },
    /// Print the draw command list as JSON.
    Draw {
        #[command(flatten)]
        calibration: CalibrationArgs,
        #[arg(long, help = "Floor plan size as W,H; defaults to the viewport size")]
        image: Option<String>,
    },
}

/// Inputs shared by every subcommand. Values stay raw until [`CalibrationArgs::resolve`]
/// so malformed input surfaces as a [`CliError`].
#[derive(Args, Debug, Clone)]
struct CalibrationArgs {
    #[arg(long, allow_hyphen_values = true, help = "Brahmasthan position as X,Y")]
    center: String,

    #[arg(long, allow_hyphen_values = true, help = "Reference point position as X,Y")]
    reference: String,

    #[arg(long, env = "VASTU_OFFSET", default_value = "0", allow_hyphen_values = true)]
    offset: String,

    #[arg(long, env = "VASTU_DIRECTION", default_value = "cw")]
    direction: String,

    #[arg(long, env = "VASTU_SNAP_INTERVAL", default_value = "2")]
    snap_interval: String,

    #[arg(long, default_value_t = false)]
    no_snap: bool,

    #[arg(long, env = "VASTU_VIEWPORT", default_value = "1000,1000")]
    viewport: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Resolved {
    center: Point,
    reference: Point,
    settings: Settings,
    viewport: (f64, f64),
}

impl CalibrationArgs {
    fn resolve(&self) -> Result<Resolved, CliError> {
        let direction = self.direction.parse::<RotationDirection>()?;
        let settings = Settings {
            offset_deg: config::parse_offset_strict(&self.offset)?,
            direction,
            snap_interval_deg: config::parse_snap_interval_strict(&self.snap_interval)?,
            snap_enabled: !self.no_snap,
        };
        Ok(Resolved {
            center: parse_point("center", &self.center)?,
            reference: parse_point("reference", &self.reference)?,
            settings,
            viewport: parse_pair("viewport", &self.viewport)?,
        })
    }
}

fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output = run(cli.command)?;
    println!("{output}");
    Ok(())
}

fn run(command: Command) -> Result<String, CliError> {
    match command {
        Command::Layout { calibration, json } => {
            let core = calibrate(&calibration.resolve()?, None)?;
            let layout = core.layout().ok_or(CliError::Uncalibrated)?;
            if json { Ok(serde_json::to_string_pretty(&layout)?) } else { Ok(format_layout_table(&layout)) }
        }
        Command::Locate { calibration, point } => {
            let core = calibrate(&calibration.resolve()?, None)?;
            let point = parse_point("point", &point)?;
            core.zone_at(point).map(str::to_owned).ok_or(CliError::PointAtCenter)
        }
        Command::Draw { calibration, image } => {
            let resolved = calibration.resolve()?;
            let image = image.map(|raw| parse_pair("image", &raw)).transpose()?;
            let core = calibrate(&resolved, image)?;
            Ok(serde_json::to_string_pretty(&core.draw_commands())?)
        }
    }
}

/// Drive an engine through the same steps a user takes in the browser:
/// load an image, click the center, click the reference.
fn calibrate(resolved: &Resolved, image: Option<(f64, f64)>) -> Result<EngineCore, CliError> {
    let (vw, vh) = resolved.viewport;
    let (iw, ih) = image.unwrap_or(resolved.viewport);

    let mut core = EngineCore::with_settings(resolved.settings);
    core.set_viewport(vw, vh, 1.0);
    let (token, _) = core.begin_image_load();
    core.on_image_loaded(token, iw, ih);
    if !core.image_usable() {
        return Err(CliError::EmptyImage { width: iw, height: ih });
    }
    core.on_pointer_down(resolved.center);
    core.on_pointer_down(resolved.reference);
    // A reference on top of the center has no direction to derive north from.
    if core.calibration.reference() == Some(resolved.center) {
        return Err(CliError::Uncalibrated);
    }
    tracing::debug!(stage = ?core.stage(), "calibration applied");
    Ok(core)
}

fn parse_pair(arg: &'static str, raw: &str) -> Result<(f64, f64), CliError> {
    let invalid = || CliError::InvalidPoint { arg, value: raw.to_owned() };
    let (a, b) = raw.split_once(',').ok_or_else(invalid)?;
    let a = a.trim().parse::<f64>().map_err(|_| invalid())?;
    let b = b.trim().parse::<f64>().map_err(|_| invalid())?;
    if a.is_finite() && b.is_finite() { Ok((a, b)) } else { Err(invalid()) }
}

fn parse_point(arg: &'static str, raw: &str) -> Result<Point, CliError> {
    let (x, y) = parse_pair(arg, raw)?;
    Ok(Point::new(x, y))
}

fn format_layout_table(layout: &ZoneLayout) -> String {
    let mut lines = vec![
        format!("north: {:.2}°", layout.north_deg),
        format!("{:<5} {:>9} {:>9} {:>9} {:>9}", "zone", "start", "mid", "label_x", "label_y"),
    ];
    lines.extend(layout.sectors.iter().map(|s| {
        format!(
            "{:<5} {:>9.2} {:>9.2} {:>9.1} {:>9.1}",
            s.zone.name, s.start_deg, s.mid_deg, s.label.position.x, s.label.position.y
        )
    }));
    lines.join("\n")
}
