// Demo runtime against the simulated board
//
// Runs one bounded step-goal motion on the simulated base and reports the
// odometry afterwards. A real deployment would swap the simulated board for
// a hardware binding behind the same trait and keep everything above it.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use parking_lot::Mutex;
use tokio::time::interval;
use tracing::{info, warn};

use crate::base::Base;
use crate::config::MotorsConfig;
use crate::motor::sim::SimBoard;
use crate::motor::velocity::{SlewProfile, Velocity};

#[derive(Parser, Debug)]
#[command(about = "Differential base demo run on the simulated board")]
pub struct Args {
    /// Encoder steps to travel (one wheel rotation is 494)
    #[arg(long, default_value_t = 494)]
    steps: i64,

    /// Cruise velocity for the run
    #[arg(long, value_enum, default_value_t = Velocity::Slow)]
    speed: Velocity,

    /// Slew profile shaping the setpoint ramp
    #[arg(long, value_enum, default_value_t = SlewProfile::Normal)]
    profile: SlewProfile,

    /// Path to a JSON motor configuration (defaults apply otherwise)
    #[arg(long)]
    config: Option<std::path::PathBuf>,
}

fn load_config(args: &Args) -> Result<MotorsConfig, Box<dyn std::error::Error + Send + Sync>> {
    let cfg = match &args.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            let text = std::fs::read_to_string(path)?;
            serde_json::from_str(&text)?
        }
        None => MotorsConfig::default(),
    };
    cfg.validate()?;
    Ok(cfg)
}

pub async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    let cfg = load_config(&args)?;

    let board = Arc::new(Mutex::new(SimBoard::new()));
    let mut base = Base::new(&cfg, board.clone())?;

    // wheel physics at 100 Hz, independent of the control loops
    let physics_board = board.clone();
    let physics = tokio::spawn(async move {
        let dt = Duration::from_millis(10);
        let mut tick = interval(dt);
        loop {
            tick.tick().await;
            physics_board.lock().advance(dt);
        }
    });

    info!(
        "Stepping ahead {} steps at {:?} ({:?} slew)",
        args.steps, args.speed, args.profile
    );
    let (port, stbd) = base.step_ahead(args.speed, args.steps, args.profile).await?;

    info!(
        "Port: {} steps in {:.2}s (max velocity {:.1})",
        port.steps,
        port.elapsed.as_secs_f64(),
        base.motor(crate::motor::velocity::Side::Port).max_velocity()
    );
    info!(
        "Starboard: {} steps in {:.2}s (max velocity {:.1})",
        stbd.steps,
        stbd.elapsed.as_secs_f64(),
        base.motor(crate::motor::velocity::Side::Starboard).max_velocity()
    );

    physics.abort();
    if let Err(e) = base.close().await {
        warn!("Error while closing the base: {}", e);
    }
    Ok(())
}
