//! # Error Types
//!
//! Custom error types for the VESC UART driver using `thiserror`.

use thiserror::Error;

use crate::protocol::commands::CommandId;

/// Reasons a received frame is rejected by the deframer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    /// First byte is neither the short nor the long start marker
    #[error("invalid start marker: 0x{0:02X}")]
    InvalidStart(u8),

    /// Declared payload length exceeds the protocol maximum
    #[error("declared payload length {0} exceeds maximum")]
    Oversize(usize),

    /// Byte after the CRC is not the stop marker
    #[error("invalid stop marker: 0x{0:02X}")]
    InvalidStop(u8),

    /// CRC over the received payload does not match the transmitted CRC
    #[error("CRC mismatch: expected 0x{expected:04X}, got 0x{actual:04X}")]
    CrcMismatch { expected: u16, actual: u16 },

    /// Buffer ended before a complete frame was present
    #[error("incomplete frame: need {needed} bytes, have {available}")]
    Incomplete { needed: usize, available: usize },
}

/// Main error type for the VESC UART driver
#[derive(Debug, Error)]
pub enum VescError {
    /// Transport accepted fewer bytes than the frame length
    #[error("short write: {written} of {expected} bytes accepted")]
    ShortWrite { expected: usize, written: usize },

    /// No complete frame arrived before the receive deadline
    #[error("no reply within {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// Frame failed marker or CRC validation and was discarded
    #[error("frame integrity failure: {0}")]
    Integrity(#[from] FrameError),

    /// Reply payload ended before every field of the command was read
    #[error("short payload for {command:?}: expected {expected} bytes, got {actual}")]
    ShortPayload {
        command: CommandId,
        expected: usize,
        actual: usize,
    },

    /// Reply carried a different (or unknown) command id than the request
    #[error("unexpected reply: expected {expected:?}, got id {actual}")]
    UnexpectedReply { expected: CommandId, actual: u8 },

    /// Payload does not fit in a single frame
    #[error("payload of {0} bytes exceeds frame maximum")]
    PayloadTooLarge(usize),

    /// Serial port could not be opened or configured
    #[error("serial port error: {0}")]
    Serial(String),

    /// None of the candidate device paths could be opened
    #[error("no serial device found (tried: {0})")]
    SerialPortNotFound(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Telemetry record serialization errors
    #[error("telemetry serialization error: {0}")]
    Telemetry(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the VESC UART driver
pub type Result<T> = std::result::Result<T, VescError>;
