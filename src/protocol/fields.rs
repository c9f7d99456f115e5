//! # Field Tables
//!
//! Every structure exchanged with the controller is described by an ordered
//! table of fields: name, wire codec and accessors. One generic routine walks
//! the table to encode, decode, or print a structure, so scale factors live
//! in exactly one place per field.

use std::fmt;

use super::buffer::{Codec, PayloadReader, PayloadWriter, ShortRead, Value};

/// One field of a wire structure
pub struct Field<T> {
    /// Field name, used for diagnostics
    pub name: &'static str,
    /// Wire width, signedness and scale
    pub codec: Codec,
    /// Read the physical value out of the structure
    pub get: fn(&T) -> Value,
    /// Store a decoded value into the structure
    pub set: fn(&mut T, Value),
}

/// A structure with a fixed, ordered wire layout
pub trait Layout: Sized + 'static {
    /// Fields in wire order
    const FIELDS: &'static [Field<Self>];

    /// Encoded size of all fields
    fn wire_size() -> usize {
        Self::FIELDS.iter().map(|f| f.codec.wire.size()).sum()
    }
}

/// Decode fields in order into `target`
///
/// Stops at the first field that does not fit in the remaining payload.
/// Fields before that point have already been written to `target`; later
/// fields are left untouched.
pub fn decode_fields<T: Layout>(reader: &mut PayloadReader<'_>, target: &mut T) -> Result<(), ShortRead> {
    for field in T::FIELDS {
        let value = reader.get_value(field.codec)?;
        (field.set)(target, value);
    }
    Ok(())
}

/// Encode every field of `source` in order
pub fn encode_fields<T: Layout>(writer: &mut PayloadWriter, source: &T) {
    for field in T::FIELDS {
        writer.put_value((field.get)(source), field.codec);
    }
}

/// Render one `name: value` line per field
pub fn write_report<T: Layout, W: fmt::Write>(source: &T, out: &mut W) -> fmt::Result {
    for field in T::FIELDS {
        writeln!(out, "{}: {}", field.name, (field.get)(source))?;
    }
    Ok(())
}

/// Table entry for an `f32` field carried as a scaled integer
macro_rules! scaled_field {
    ($ty:ty, $name:ident, $wire:ident, $factor:expr) => {
        $crate::protocol::fields::Field::<$ty> {
            name: stringify!($name),
            codec: $crate::protocol::buffer::Codec::scaled($crate::protocol::buffer::Wire::$wire, $factor),
            get: |t| $crate::protocol::buffer::Value::Float(t.$name),
            set: |t, v| t.$name = v.as_f32(),
        }
    };
}

/// Table entry for an `f32` field in the auto-float format
macro_rules! float_field {
    ($ty:ty, $name:ident) => {
        $crate::protocol::fields::Field::<$ty> {
            name: stringify!($name),
            codec: $crate::protocol::buffer::Codec::float32_auto(),
            get: |t| $crate::protocol::buffer::Value::Float(t.$name),
            set: |t, v| t.$name = v.as_f32(),
        }
    };
}

/// Table entry for an integer or bool field carried unscaled
macro_rules! raw_field {
    ($ty:ty, $name:ident, $wire:ident, $conv:ident) => {
        $crate::protocol::fields::Field::<$ty> {
            name: stringify!($name),
            codec: $crate::protocol::buffer::Codec::raw($crate::protocol::buffer::Wire::$wire),
            get: |t| $crate::protocol::buffer::Value::Int(t.$name as i64),
            set: |t, v| t.$name = v.$conv(),
        }
    };
}

pub(crate) use float_field;
pub(crate) use raw_field;
pub(crate) use scaled_field;
