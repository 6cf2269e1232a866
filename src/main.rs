use clap::Parser;
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use sunshade_controller::config::{self, Config};
use sunshade_controller::controller::{Controller, Hardware};
use sunshade_controller::error::Result;
use sunshade_controller::input::mqtt::{MqttClient, MqttIntegration, command_topic};
use sunshade_controller::instance_lock::InstanceLock;
use sunshade_controller::notify::{LogNotifier, MqttNotifier, Notifier};
use sunshade_controller::schedule::SystemClock;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

#[derive(Parser)]
#[command(name = "sunshade-controller")]
#[command(about = "Moves a sun-shade up and down based on ambient light")]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, env = "SUNSHADE_CONFIG")]
    config: Option<PathBuf>,

    /// Use simulated GPIO pins and a noisy light source
    #[arg(long, env = "SUNSHADE_SIMULATE")]
    simulate: bool,

    /// Directory for the state file and history logs
    #[arg(long)]
    state_dir: Option<PathBuf>,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() {
    // Load .env file before anything else
    config::load_dotenv();
    init_logger();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("Starting sunshade controller");

    let mut config = Config::load(cli.config.as_deref())?;
    if cli.simulate {
        config.simulation.enabled = true;
    }
    if let Some(dir) = cli.state_dir {
        config.storage.state_dir = dir;
    }
    config.validate()?;

    let _lock = InstanceLock::acquire()?;

    info!("Configuration loaded:");
    info!(
        "  Location: {:.2}, {:.2} (UTC{:+})",
        config.location.latitude, config.location.longitude, config.location.utc_offset_hours
    );
    info!(
        "  Light: pin {}, thresholds {}/{}/{}, every {}s",
        config.light.pin,
        config.light.good,
        config.light.neutral,
        config.light.bad,
        config.light.sampling_interval_secs
    );
    for shade in &config.shades {
        info!(
            "  Shade {}: pins up {} / down {}",
            shade.name, shade.pin_up, shade.pin_down
        );
    }
    info!("  State: {:?}", config.storage.state_dir);

    let hardware = if config.simulation.enabled {
        warn!("[Sim] Running with simulated GPIO pins");
        Hardware::simulated(&config)?
    } else {
        Hardware::open(&config)?
    };

    let mqtt = config.mqtt.enabled.then(|| MqttClient::new(&config.mqtt));
    let notifier: Arc<dyn Notifier> = match &mqtt {
        Some(client) => Arc::new(MqttNotifier::new(client.client(), &config.mqtt.topic_prefix)),
        None => Arc::new(LogNotifier),
    };

    let controller = Arc::new(
        Controller::new(&config, hardware, Arc::new(SystemClock), notifier)?
            .with_storage(&config.storage),
    );
    controller.start();

    let mqtt_token = CancellationToken::new();
    let mqtt_tasks = TaskTracker::new();
    if let Some(client) = mqtt {
        info!(
            "[MQTT] Connecting to {}:{}",
            config.mqtt.broker_host, config.mqtt.broker_port
        );
        for shade in &config.shades {
            info!(
                "[MQTT] Commands for {} on {}",
                shade.name,
                command_topic(&config.mqtt.topic_prefix, &shade.name)
            );
        }
        MqttIntegration::new(controller.clone(), &client, config.mqtt.topic_prefix.clone())
            .start(client, &mqtt_tasks, mqtt_token.clone());
    }

    info!("Sunshade controller is running");
    info!("  - Press Ctrl+C to exit");

    // Wait for shutdown signal
    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    // Shades go up before MQTT stops so the last notifications get out
    controller.shutdown().await;
    mqtt_token.cancel();
    mqtt_tasks.close();
    mqtt_tasks.wait().await;

    info!("Sunshade controller stopped");
    Ok(())
}
