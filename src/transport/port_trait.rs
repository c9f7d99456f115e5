//! Trait abstraction for the byte transport to enable testing

use std::io;

/// Byte-oriented, non-blocking transport to the motor controller
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    /// Write bytes, returning how many were accepted
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Number of received bytes ready to read without blocking
    fn available(&mut self) -> io::Result<usize>;

    /// Read one received byte, or `None` if nothing is pending
    fn read_byte(&mut self) -> io::Result<Option<u8>>;
}
