//! Calibration aid for the light sensor.
//!
//! Usage:
//!   cargo run --bin light-calibrate -- --pin 23 --factor 26
//!
//! Samples the light pin at a fixed interval and logs the raw average and
//! the calibrated intensity, so thresholds and calibration factor can be
//! chosen for an installation.

use clap::Parser;
use log::{error, info, warn};
use std::time::Duration;
use sunshade_controller::config::{self, Config};
use sunshade_controller::gpio::{GpioPin, SimulatedPin, SysfsPin};
use sunshade_controller::light::LightSampler;

#[derive(Parser)]
#[command(name = "light-calibrate")]
#[command(about = "Log light sensor readings for calibration")]
struct Cli {
    /// Light sensor pin (defaults to the configured pin)
    #[arg(long, env = "LIGHT_PIN")]
    pin: Option<u8>,

    /// Calibration factor (defaults to the configured factor)
    #[arg(long, env = "LIGHT_CALIBRATION")]
    factor: Option<u32>,

    /// Seconds between samples
    #[arg(long, default_value_t = 5)]
    interval: u64,

    /// Stop after this many samples
    #[arg(long)]
    count: Option<u64>,

    /// Read from a simulated noisy pin instead of the hardware
    #[arg(long)]
    simulate: bool,
}

#[tokio::main]
async fn main() {
    // Load .env file before anything else
    config::load_dotenv();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let pin_number = cli.pin.unwrap_or(config.light.pin);
    let factor = cli.factor.unwrap_or(config.light.calibration_factor);

    let pin: Box<dyn GpioPin> = if cli.simulate {
        Box::new(SimulatedPin::noisy(
            pin_number,
            config.simulation.light_base,
            config.simulation.light_spread,
        ))
    } else {
        match SysfsPin::open(pin_number) {
            Ok(pin) => Box::new(pin),
            Err(e) => {
                error!("Cannot open light pin: {}", e);
                std::process::exit(1);
            }
        }
    };

    info!(
        "Probing light on pin {} every {}s (calibration factor {})",
        pin_number, cli.interval, factor
    );

    let sampler = LightSampler::new();
    let mut pin = Some(pin);
    let mut taken = 0;
    loop {
        let Some(mut owned) = pin.take() else {
            break;
        };
        let sampler = sampler.clone();
        let joined = tokio::task::spawn_blocking(move || {
            let result = sampler.sample_averaged(owned.as_mut(), factor);
            (owned, result)
        })
        .await;

        match joined {
            Ok((owned, result)) => {
                pin = Some(owned);
                match result {
                    Ok(sample) => {
                        info!(
                            "Light {} (raw average {})",
                            sample.intensity, sample.raw_average
                        );
                        if sample.is_partial() {
                            warn!("{}", sample.failure_summary());
                        }
                    }
                    Err(e) => warn!("No reading: {}", e),
                }
            }
            Err(e) => {
                error!("Sampling task failed: {}", e);
                break;
            }
        }

        taken += 1;
        if cli.count.is_some_and(|count| taken >= count) {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(cli.interval)) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    if let Some(mut pin) = pin
        && let Err(e) = pin.release()
    {
        warn!("Failed to release pin: {}", e);
    }
    info!("Probe complete.");
}
