// src/main.rs - Robot control entry point
use std::sync::Arc;
use std::time::Duration;

use balle::config::{self, Config};
use balle::detection::feed_detection_lines;
use balle::hardware::{MotorLink, SerialMotorLink};
use balle::robot::Robot;
use balle::scheduler::{MonotonicClock, TimeInterface};
use balle::simulator::SimulatedDetector;
use balle::web::api::{self, AppState};
use clap::Parser;
use tokio::io::BufReader;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};

#[derive(Parser, Debug)]
#[command(version, about = "Track a detected object with a mecanum robot")]
struct Args {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<String>,
    /// Use the synthetic detector instead of reading frames from stdin
    #[arg(long)]
    simulate: bool,
    /// Seed for the synthetic detector
    #[arg(long, default_value_t = 1)]
    seed: u64,
    /// Run without a motor link even if one is configured
    #[arg(long)]
    no_serial: bool,
    /// Override the web API bind address
    #[arg(long)]
    bind: Option<String>,
    #[arg(short, long)]
    verbose: bool,
}

fn open_motor_link(config: &Config, disabled: bool) -> Option<Box<dyn MotorLink>> {
    if disabled || !config.serial.enabled {
        tracing::info!("Motor link disabled");
        return None;
    }
    match SerialMotorLink::open(&config.serial) {
        Ok(link) => Some(Box::new(link)),
        Err(e) => {
            tracing::warn!("Running without motor link: {}", e);
            None
        }
    }
}

fn log_server_exit(result: Result<std::io::Result<()>, tokio::task::JoinError>) {
    match result {
        Ok(Err(e)) => tracing::error!("Web server error: {}", e),
        Err(e) => tracing::error!("Web server task failed: {}", e),
        Ok(Ok(())) => tracing::info!("Web server stopped"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO })
        .init();

    tracing::info!("Starting balle {}", env!("CARGO_PKG_VERSION"));

    let mut config = match args.config.as_deref() {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path);
            config::load_config(path).map_err(|e| {
                tracing::error!("Failed to load config from '{}': {}", path, e);
                Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
            })?
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            Config::default()
        }
    };
    if let Some(bind) = args.bind {
        config.web.bind = bind;
    }
    if let Err(e) = config.validate() {
        tracing::warn!("{}", e);
    }

    tracing::info!(
        "Camera: {}x{} @ {} fps, manual timeout {}s, staleness timeout {}s",
        config.camera.width,
        config.camera.height,
        config.camera.fps,
        config.control.manual_timeout,
        config.planner.staleness_timeout
    );

    let clock: Arc<dyn TimeInterface> = Arc::new(MonotonicClock::new());
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let (detection_tx, detection_rx) = mpsc::channel(4);

    // Fail before touching the motors if the API cannot come up.
    let listener = TcpListener::bind(&config.web.bind).await.map_err(|e| {
        tracing::error!("Failed to bind web API on '{}': {}", config.web.bind, e);
        Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
    })?;

    let link = open_motor_link(&config, args.no_serial);
    let frame_period = Duration::from_secs_f64(config.camera.nominal_frame_period());
    let (width, height) = (config.camera.width as f64, config.camera.height as f64);
    let (robot, handles) = Robot::new(config, link);

    let detector = if args.simulate {
        let sim = SimulatedDetector::new(width, height, args.seed);
        tokio::spawn(sim.run(frame_period, detection_tx, shutdown_tx.subscribe()))
    } else {
        tracing::info!("Reading detector frames from stdin");
        tokio::spawn(async move {
            if let Err(e) = feed_detection_lines(BufReader::new(tokio::io::stdin()), detection_tx).await {
                tracing::error!("Detector input failed: {}", e);
            }
        })
    };

    let mut control = tokio::spawn(robot.run(detection_rx, clock.clone(), shutdown_tx.subscribe()));

    let state = AppState { robot: handles, clock };
    let mut server = tokio::spawn(api::serve(listener, state, shutdown_tx.subscribe()));

    let mut server_done = false;
    let finished = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupt received");
            None
        }
        result = &mut control => Some(result),
        result = &mut server => {
            server_done = true;
            log_server_exit(result);
            None
        }
    };

    let _ = shutdown_tx.send(());
    // stdin reads cannot be cancelled cooperatively
    detector.abort();
    let control_result = match finished {
        Some(result) => result,
        None => control.await,
    };
    match control_result {
        Ok(Err(e)) => tracing::error!("Control loop failed: {}", e),
        Err(e) => tracing::error!("Control task failed: {}", e),
        Ok(Ok(())) => {}
    }
    if !server_done {
        log_server_exit(server.await);
    }
    tracing::info!("Shutdown complete");
    Ok(())
}
