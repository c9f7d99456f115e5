//! # Telemetry Monitor
//!
//! One poll cycle of the monitor binary: optional keep-alive, telemetry
//! request, and logging of the fresh snapshot.

use tracing::debug;

use crate::driver::{Target, VescUart};
use crate::error::Result;
use crate::telemetry::TelemetryLogger;
use crate::transport::Transport;

/// Counters kept across poll cycles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    pub polls: u64,
    pub successes: u64,
    pub failures: u64,
}

/// Periodic telemetry poller around a driver
#[derive(Debug)]
pub struct Monitor<T: Transport> {
    driver: VescUart<T>,
    target: Target,
    keepalive: bool,
    logger: Option<TelemetryLogger>,
    stats: PollStats,
}

impl<T: Transport> Monitor<T> {
    pub fn new(driver: VescUart<T>, target: Target, keepalive: bool, logger: Option<TelemetryLogger>) -> Self {
        Self {
            driver,
            target,
            keepalive,
            logger,
            stats: PollStats::default(),
        }
    }

    pub fn driver(&self) -> &VescUart<T> {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut VescUart<T> {
        &mut self.driver
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn stats(&self) -> PollStats {
        self.stats
    }

    /// Run one poll cycle
    ///
    /// A failed cycle leaves the driver's previous snapshot in place and is
    /// not logged.
    pub fn poll_once(&mut self) -> Result<()> {
        self.stats.polls += 1;

        let result = self.poll_inner();
        match result {
            Ok(()) => self.stats.successes += 1,
            Err(_) => self.stats.failures += 1,
        }
        result
    }

    fn poll_inner(&mut self) -> Result<()> {
        if self.keepalive {
            self.driver.send_keepalive(self.target)?;
        }

        self.driver.get_values(self.target)?;
        debug!(
            "Telemetry: {:.1} V, {:.2} A, {:.0} eRPM",
            self.driver.telemetry().input_voltage,
            self.driver.telemetry().avg_motor_current,
            self.driver.telemetry().rpm
        );

        if let Some(logger) = self.logger.as_mut() {
            let can_id = match self.target {
                Target::Local => None,
                Target::Can(id) => Some(id),
            };
            logger.log(self.driver.telemetry(), can_id)?;
        }
        Ok(())
    }

    /// Flush the telemetry log
    pub fn shutdown(&mut self) -> Result<()> {
        if let Some(logger) = self.logger.as_mut() {
            logger.flush()?;
        }
        Ok(())
    }
}
