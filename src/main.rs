//! Vision node: tracks the configured face and publishes movement commands.

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use vision_node::{
    camera::CameraSource,
    cli::Args,
    config::Config,
    display::PreviewWindow,
    node::VisionNode,
    oracle::FaceLockOracle,
    transport::{MqttTransport, Topics},
};

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    info!(
        "Vision node {} ({})",
        env!("CARGO_PKG_VERSION"),
        option_env!("BUILD_TARGET").unwrap_or("unknown target")
    );

    let mut config = if let Some(config_path) = &args.config {
        info!("Loading configuration from: {}", config_path);
        match Config::from_file(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("Failed to load config file: {}. Using defaults.", e);
                Config::default()
            }
        }
    } else {
        Config::default()
    };
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!(
        "Broker {}:{}, team {}, target {}",
        config.broker.address, config.broker.port, config.broker.team_id, config.target.name
    );

    let transport = MqttTransport::connect(&config.broker).context("Failed to start MQTT client")?;
    let oracle = FaceLockOracle::new(&config).context("Failed to initialize face recognition")?;
    let camera = CameraSource::open(&config.camera).context("Failed to open camera")?;

    let mut node = VisionNode::new(camera, oracle, transport, Topics::for_team(&config.broker.team_id))
        .with_mirror(config.camera.mirror);
    if config.display.enabled {
        node = node.with_display(PreviewWindow::open(&config.display.window_name)?);
    }

    let stop = node.stop_handle();
    ctrlc::set_handler(move || {
        stop.store(true, std::sync::atomic::Ordering::SeqCst);
    })
    .context("Failed to install Ctrl-C handler")?;

    let outcome = node.run();
    node.shutdown()?;
    outcome?;

    info!("Vision node stopped");
    Ok(())
}
