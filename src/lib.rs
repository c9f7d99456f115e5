//! # VESC UART Library
//!
//! Request/response driver for VESC motor controllers over a serial link.
//!
//! This library provides the framing, checksum and payload codecs of the
//! VESC UART protocol, a blocking driver that issues commands and decodes
//! replies into typed snapshots, and a small telemetry monitor built on it.

pub mod config;
pub mod driver;
pub mod error;
pub mod monitor;
pub mod protocol;
pub mod telemetry;
pub mod transport;

pub use driver::{CommitPolicy, DriverConfig, Target, VescUart};
pub use error::{FrameError, Result, VescError};
