//! # VESC UART Protocol Module
//!
//! Wire-level implementation of the VESC UART protocol.
//!
//! This module handles:
//! - CRC-16/XMODEM checksum calculation
//! - Frame encoding (start marker, length, payload, CRC, stop marker)
//! - Incremental frame decoding and validation
//! - Big-endian, fixed-point payload encoding and decoding
//! - Declarative field tables for every reply and configuration structure

pub mod buffer;
pub mod commands;
pub mod crc;
pub mod fields;
pub mod frame;
pub mod values;
