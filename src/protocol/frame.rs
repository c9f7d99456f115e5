//! # Framer / Deframer
//!
//! Wraps payloads for transmission and extracts payloads from received bytes.
//!
//! ```text
//! +-------+----------+----------+--------+------+
//! | start | length   | payload  | CRC-16 | stop |
//! | 0x02  | 1 byte   | N ≤ 255  | 2 B BE | 0x03 |
//! | 0x03  | 2 B BE   | N ≤ 512  | 2 B BE | 0x03 |
//! +-------+----------+----------+--------+------+
//! ```

use super::commands::*;
use super::crc::crc16;
use crate::error::{FrameError, Result, VescError};

/// Encode a payload into a complete frame
///
/// # Arguments
///
/// * `payload` - Command id followed by its arguments
///
/// # Returns
///
/// * `Result<Vec<u8>>` - Frame bytes, ready for the transport
///
/// # Errors
///
/// Returns `PayloadTooLarge` if the payload exceeds 512 bytes
///
/// # Examples
///
/// ```
/// use vesc_uart::protocol::frame::encode_frame;
///
/// let frame = encode_frame(&[0x04]).unwrap();
/// assert_eq!(frame, vec![0x02, 0x01, 0x04, 0x40, 0x84, 0x03]);
/// ```
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>> {
    let len = payload.len();
    if len > MAX_PAYLOAD_SIZE {
        return Err(VescError::PayloadTooLarge(len));
    }

    let mut frame = Vec::with_capacity(3 + len + FRAME_TRAILER_SIZE);

    if len <= MAX_SHORT_PAYLOAD_SIZE {
        frame.push(START_SHORT);
        frame.push(len as u8);
    } else {
        frame.push(START_LONG);
        frame.extend_from_slice(&(len as u16).to_be_bytes());
    }

    frame.extend_from_slice(payload);
    frame.extend_from_slice(&crc16(payload).to_be_bytes());
    frame.push(STOP_BYTE);

    Ok(frame)
}

/// Decode the first frame in a byte buffer
///
/// # Returns
///
/// * `Ok((payload, consumed))` - Payload bytes and the frame length
///
/// # Errors
///
/// Returns `Incomplete` when the buffer ends before the frame does, or the
/// first validation error otherwise.
pub fn decode_frame(bytes: &[u8]) -> std::result::Result<(Vec<u8>, usize), FrameError> {
    let mut decoder = FrameDecoder::new();

    for (index, &byte) in bytes.iter().enumerate() {
        if let Some(payload) = decoder.push(byte)? {
            return Ok((payload, index + 1));
        }
    }

    Err(FrameError::Incomplete {
        needed: decoder.frame_len().unwrap_or(bytes.len() + 1),
        available: bytes.len(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    LengthHigh,
    LengthLow,
    Body,
}

/// Incremental deframer fed one byte at a time
///
/// Any validation failure discards everything buffered and returns the
/// decoder to waiting for a start marker. No resynchronization is attempted
/// within a frame.
#[derive(Debug)]
pub struct FrameDecoder {
    state: State,
    header_len: usize,
    payload_len: usize,
    body: Vec<u8>,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: State::Start,
            header_len: 0,
            payload_len: 0,
            body: Vec::with_capacity(MAX_PAYLOAD_SIZE + FRAME_TRAILER_SIZE),
        }
    }

    /// Discard any partially received frame
    pub fn reset(&mut self) {
        self.state = State::Start;
        self.header_len = 0;
        self.payload_len = 0;
        self.body.clear();
    }

    /// True when no frame is in progress
    pub fn is_idle(&self) -> bool {
        self.state == State::Start
    }

    /// Total length of the frame in progress, once its header is known
    pub fn frame_len(&self) -> Option<usize> {
        match self.state {
            State::Body => Some(self.header_len + self.payload_len + FRAME_TRAILER_SIZE),
            _ => None,
        }
    }

    /// Feed one received byte
    ///
    /// # Returns
    ///
    /// * `Ok(Some(payload))` - A complete, valid frame was received
    /// * `Ok(None)` - More bytes are needed
    /// * `Err(FrameError)` - The frame was rejected and discarded
    pub fn push(&mut self, byte: u8) -> std::result::Result<Option<Vec<u8>>, FrameError> {
        match self.state {
            State::Start => match byte {
                START_SHORT => {
                    self.header_len = 2;
                    self.state = State::LengthLow;
                }
                START_LONG => {
                    self.header_len = 3;
                    self.state = State::LengthHigh;
                }
                other => return Err(FrameError::InvalidStart(other)),
            },
            State::LengthHigh => {
                self.payload_len = (byte as usize) << 8;
                self.state = State::LengthLow;
            }
            State::LengthLow => {
                self.payload_len |= byte as usize;
                if self.payload_len > MAX_PAYLOAD_SIZE {
                    let len = self.payload_len;
                    self.reset();
                    return Err(FrameError::Oversize(len));
                }
                self.state = State::Body;
            }
            State::Body => {
                self.body.push(byte);
                if self.body.len() == self.payload_len + FRAME_TRAILER_SIZE {
                    let result = self.finish();
                    self.reset();
                    return result.map(Some);
                }
            }
        }

        Ok(None)
    }

    fn finish(&self) -> std::result::Result<Vec<u8>, FrameError> {
        let (payload, trailer) = self.body.split_at(self.payload_len);

        if trailer[2] != STOP_BYTE {
            return Err(FrameError::InvalidStop(trailer[2]));
        }

        let received = u16::from_be_bytes([trailer[0], trailer[1]]);
        let calculated = crc16(payload);
        if received != calculated {
            return Err(FrameError::CrcMismatch {
                expected: calculated,
                actual: received,
            });
        }

        Ok(payload.to_vec())
    }
}
