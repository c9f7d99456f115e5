//! # VESC UART Monitor
//!
//! Polls a VESC motor controller for telemetry over UART and logs each
//! snapshot as JSON Lines.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load configuration (first argument, or built-in defaults)
//!    - Set up logging with tracing subscriber
//!    - Open the serial port and query the firmware version
//!
//! 2. **Main Loop**
//!    - Every `poll_interval_ms`: send a keep-alive (optional) and request telemetry
//!    - Log failures, append successful snapshots to the telemetry log
//!    - Handle Ctrl+C for graceful shutdown
//!
//! # Examples
//!
//! ```bash
//! cargo run --release -- config/vesc.toml
//! ```

use anyhow::{Context, Result};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{info, warn};

use vesc_uart::config::Config;
use vesc_uart::driver::{Target, VescUart};
use vesc_uart::monitor::Monitor;
use vesc_uart::telemetry::TelemetryLogger;
use vesc_uart::transport::SerialTransport;

/// Number of polls between status log messages
const LOG_INTERVAL_POLLS: u64 = 100;

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path).with_context(|| format!("loading {}", path))?,
        None => Config::default(),
    };

    // Initialize logging
    let (writer, _guard) = tracing_appender::non_blocking(std::io::stdout());
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
        )
        .init();

    info!("VESC UART monitor v{} starting...", env!("CARGO_PKG_VERSION"));

    let transport = SerialTransport::open_with_paths(&[config.serial.port.as_str()], config.serial.baud_rate)?;
    let target = Target::from(config.monitor.can_id);
    let mut driver = VescUart::with_config(transport, config.driver_config());

    match driver.get_fw_version(target) {
        Ok(()) => info!("Controller firmware {}", driver.fw_version()),
        Err(e) => warn!("Firmware version request failed: {}", e),
    }

    let logger = if config.telemetry.enabled {
        Some(TelemetryLogger::new(&config.telemetry)?)
    } else {
        None
    };
    let mut monitor = Monitor::new(driver, target, config.monitor.keepalive, logger);

    let mut poll_interval = interval(Duration::from_millis(config.monitor.poll_interval_ms));
    poll_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Polling {:?} every {} ms", target, config.monitor.poll_interval_ms);
    info!("Press Ctrl+C to exit");

    let mut last_log_polls: u64 = 0;

    loop {
        tokio::select! {
            _ = poll_interval.tick() => {
                // Driver calls block for up to the reply timeout
                if let Err(e) = tokio::task::block_in_place(|| monitor.poll_once()) {
                    warn!("Poll failed: {}", e);
                    continue;
                }

                let stats = monitor.stats();
                if stats.polls - last_log_polls >= LOG_INTERVAL_POLLS {
                    let t = monitor.driver().telemetry();
                    info!(
                        "{} polls ({} failed): {:.1} V, {:.1} A, {:.0} eRPM, {}",
                        stats.polls, stats.failures, t.input_voltage, t.avg_motor_current, t.rpm, t.fault
                    );
                    last_log_polls = stats.polls;
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    monitor.shutdown()?;
    let stats = monitor.stats();
    info!("Total polls: {} ({} ok, {} failed)", stats.polls, stats.successes, stats.failures);

    Ok(())
}
