//! # Payload Buffer Codec
//!
//! Cursor-based big-endian writer and reader for payload bytes.
//!
//! Floats travel as scaled fixed-point integers: the writer multiplies by the
//! field's scale factor and rounds to nearest, the reader divides by the same
//! factor. Configuration floats instead use the controller's 32-bit
//! auto-float format (see [`Wire::F32Auto`]). The reader never advances past
//! the end of the payload; a read that would do so returns [`ShortRead`]
//! instead.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Integer representation of a field on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wire {
    U8,
    Bool,
    I16,
    U16,
    I32,
    U32,
    /// Sign, 8-bit biased exponent, 23-bit significand; subnormals flush to zero
    F32Auto,
}

impl Wire {
    /// Encoded width in bytes
    pub const fn size(self) -> usize {
        match self {
            Wire::U8 | Wire::Bool => 1,
            Wire::I16 | Wire::U16 => 2,
            Wire::I32 | Wire::U32 | Wire::F32Auto => 4,
        }
    }

    fn bounds(self) -> (i64, i64) {
        match self {
            Wire::U8 => (0, u8::MAX as i64),
            Wire::Bool => (0, 1),
            Wire::I16 => (i16::MIN as i64, i16::MAX as i64),
            Wire::U16 => (0, u16::MAX as i64),
            Wire::I32 => (i32::MIN as i64, i32::MAX as i64),
            Wire::U32 => (0, u32::MAX as i64),
            Wire::F32Auto => (i64::MIN, i64::MAX),
        }
    }
}

/// Conversion between the wire integer and the physical value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scale {
    /// Integer is used as-is
    Raw,
    /// Physical value = integer / factor
    Factor(f64),
}

/// Wire type plus scale: everything needed to encode or decode one field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Codec {
    pub wire: Wire,
    pub scale: Scale,
}

impl Codec {
    pub const fn raw(wire: Wire) -> Self {
        Self {
            wire,
            scale: Scale::Raw,
        }
    }

    pub const fn scaled(wire: Wire, factor: f64) -> Self {
        Self {
            wire,
            scale: Scale::Factor(factor),
        }
    }

    pub const fn float32_auto() -> Self {
        Self::raw(Wire::F32Auto)
    }
}

/// Magnitudes below this encode as zero in the auto-float format
const F32_AUTO_MIN_NORMAL: f32 = 1.5e-38;

/// Encode a float in the auto-float format
///
/// Non-finite input saturates: NaN to zero, infinities to `±f32::MAX`.
pub fn float32_auto_to_bits(value: f32) -> u32 {
    let value = if value.is_nan() || value.abs() < F32_AUTO_MIN_NORMAL {
        0.0
    } else {
        value.clamp(f32::MIN, f32::MAX)
    };

    // For normal values the layout coincides with IEEE 754 single precision
    value.to_bits()
}

/// Decode a float in the auto-float format
pub fn float32_auto_from_bits(bits: u32) -> f32 {
    let exp = ((bits >> 23) & 0xFF) as i32;
    let sig_i = bits & 0x7F_FFFF;
    let negative = bits & 0x8000_0000 != 0;

    let magnitude = if exp == 0 && sig_i == 0 {
        0.0
    } else {
        let sig = sig_i as f64 / 16_777_216.0 + 0.5;
        sig * 2f64.powi(exp - 126)
    };

    let value = magnitude as f32;
    if negative {
        -value
    } else {
        value
    }
}

/// A decoded field value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Float(f32),
    Int(i64),
}

impl Value {
    pub fn as_f32(self) -> f32 {
        match self {
            Value::Float(v) => v,
            Value::Int(v) => v as f32,
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            Value::Float(v) => v.round() as i64,
            Value::Int(v) => v,
        }
    }

    pub fn as_i32(self) -> i32 {
        self.as_i64().clamp(i32::MIN as i64, i32::MAX as i64) as i32
    }

    pub fn as_u32(self) -> u32 {
        self.as_i64().clamp(0, u32::MAX as i64) as u32
    }

    pub fn as_u8(self) -> u8 {
        self.as_i64().clamp(0, u8::MAX as i64) as u8
    }

    pub fn as_bool(self) -> bool {
        self.as_i64() != 0
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Float(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
        }
    }
}

/// Read past the end of a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("read of {needed} bytes at offset {offset} exceeds payload")]
pub struct ShortRead {
    pub offset: usize,
    pub needed: usize,
}

/// Append-only payload builder
#[derive(Debug, Default)]
pub struct PayloadWriter {
    buf: BytesMut,
}

impl PayloadWriter {
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn put_bool(&mut self, value: bool) {
        self.buf.put_u8(value as u8);
    }

    pub fn put_i16(&mut self, value: i16) {
        self.buf.put_i16(value);
    }

    pub fn put_u16(&mut self, value: u16) {
        self.buf.put_u16(value);
    }

    pub fn put_i32(&mut self, value: i32) {
        self.buf.put_i32(value);
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.put_u32(value);
    }

    pub fn put_slice(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Append a float as `round(value * factor)` at a 16-bit signed width
    pub fn put_f32_as_i16(&mut self, value: f32, factor: f64) {
        self.put_value(Value::Float(value), Codec::scaled(Wire::I16, factor));
    }

    /// Append a float as `round(value * factor)` at a 32-bit signed width
    pub fn put_f32_as_i32(&mut self, value: f32, factor: f64) {
        self.put_value(Value::Float(value), Codec::scaled(Wire::I32, factor));
    }

    /// Append a float in the auto-float format
    pub fn put_f32_auto(&mut self, value: f32) {
        self.buf.put_u32(float32_auto_to_bits(value));
    }

    /// Append a value with the given codec, saturating at the wire width
    pub fn put_value(&mut self, value: Value, codec: Codec) {
        let raw = match codec.scale {
            Scale::Raw => value.as_i64(),
            Scale::Factor(factor) => {
                let scaled = (value.as_f32() as f64 * factor).round();
                // `as` saturates; NaN maps to zero
                scaled as i64
            }
        };

        let (min, max) = codec.wire.bounds();
        let raw = raw.clamp(min, max);

        match codec.wire {
            Wire::U8 | Wire::Bool => self.buf.put_u8(raw as u8),
            Wire::I16 => self.buf.put_i16(raw as i16),
            Wire::U16 => self.buf.put_u16(raw as u16),
            Wire::I32 => self.buf.put_i32(raw as i32),
            Wire::U32 => self.buf.put_u32(raw as u32),
            Wire::F32Auto => self.put_f32_auto(value.as_f32()),
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Cursor over a received payload
#[derive(Debug, Clone)]
pub struct PayloadReader<'a> {
    cursor: &'a [u8],
    len: usize,
}

impl<'a> PayloadReader<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self {
            cursor: payload,
            len: payload.len(),
        }
    }

    /// Bytes consumed so far
    pub fn position(&self) -> usize {
        self.len - self.cursor.remaining()
    }

    pub fn remaining(&self) -> usize {
        self.cursor.remaining()
    }

    fn ensure(&self, needed: usize) -> Result<(), ShortRead> {
        if self.cursor.remaining() < needed {
            return Err(ShortRead {
                offset: self.position(),
                needed,
            });
        }
        Ok(())
    }

    pub fn get_u8(&mut self) -> Result<u8, ShortRead> {
        self.ensure(1)?;
        Ok(self.cursor.get_u8())
    }

    pub fn get_bool(&mut self) -> Result<bool, ShortRead> {
        Ok(self.get_u8()? != 0)
    }

    pub fn get_i16(&mut self) -> Result<i16, ShortRead> {
        self.ensure(2)?;
        Ok(self.cursor.get_i16())
    }

    pub fn get_u16(&mut self) -> Result<u16, ShortRead> {
        self.ensure(2)?;
        Ok(self.cursor.get_u16())
    }

    pub fn get_i32(&mut self) -> Result<i32, ShortRead> {
        self.ensure(4)?;
        Ok(self.cursor.get_i32())
    }

    pub fn get_u32(&mut self) -> Result<u32, ShortRead> {
        self.ensure(4)?;
        Ok(self.cursor.get_u32())
    }

    /// Read a 16-bit signed integer and divide by `factor`
    pub fn get_f32_from_i16(&mut self, factor: f64) -> Result<f32, ShortRead> {
        Ok(self.get_value(Codec::scaled(Wire::I16, factor))?.as_f32())
    }

    /// Read a 32-bit signed integer and divide by `factor`
    pub fn get_f32_from_i32(&mut self, factor: f64) -> Result<f32, ShortRead> {
        Ok(self.get_value(Codec::scaled(Wire::I32, factor))?.as_f32())
    }

    /// Read a float in the auto-float format
    pub fn get_f32_auto(&mut self) -> Result<f32, ShortRead> {
        Ok(float32_auto_from_bits(self.get_u32()?))
    }

    /// Read one field with the given codec
    pub fn get_value(&mut self, codec: Codec) -> Result<Value, ShortRead> {
        let raw: i64 = match codec.wire {
            Wire::F32Auto => return Ok(Value::Float(self.get_f32_auto()?)),
            Wire::U8 => self.get_u8()? as i64,
            Wire::Bool => self.get_bool()? as i64,
            Wire::I16 => self.get_i16()? as i64,
            Wire::U16 => self.get_u16()? as i64,
            Wire::I32 => self.get_i32()? as i64,
            Wire::U32 => self.get_u32()? as i64,
        };

        Ok(match codec.scale {
            Scale::Raw => Value::Int(raw),
            Scale::Factor(factor) => Value::Float((raw as f64 / factor) as f32),
        })
    }

    /// Read a NUL-terminated string, consuming the terminator
    ///
    /// Returns `None` when no terminator is present; nothing is consumed then.
    pub fn get_cstr(&mut self) -> Option<String> {
        let end = self.cursor.iter().position(|&b| b == 0)?;
        let text = String::from_utf8_lossy(&self.cursor[..end]).into_owned();
        self.cursor.advance(end + 1);
        Some(text)
    }

    /// Unread tail of the payload
    pub fn rest(&self) -> &'a [u8] {
        self.cursor
    }
}
