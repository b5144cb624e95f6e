//! The multi-format numeric/text codec used inside protocol records.
//!
//! Each record carries a one-byte type descriptor: the high nibble selects
//! one of sixteen value formats, the low nibble gives the value length in
//! bytes (0 meaning the record has no value at all).

use modular_bitfield::prelude::*;
use num_enum::{FromPrimitive, IntoPrimitive};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Record value formats, as carried in the high nibble of the descriptor.
///
/// `Bp` suffixes give the binary point position: `UIntBp4` is an unsigned
/// fixed-point value with 4 fractional bits, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum TypeCode {
    UInt = 0,
    UIntBp4 = 1,
    UIntBp8 = 2,
    UIntBp12 = 3,
    UIntBp16 = 4,
    UIntBp20 = 5,
    UIntBp24 = 6,
    Chars = 7,
    SInt = 8,
    SIntBp8 = 9,
    SIntBp16 = 10,
    SIntBp24 = 11,
    Float = 15,

    /// Codes 12-14 are reserved by the protocol; a record using one aborts
    /// the rest of its message.
    #[num_enum(catch_all)]
    Reserved(u8),
}

/// The packed record descriptor byte: value length in the low nibble,
/// format code in the high nibble.
#[bitfield(bytes = 1)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypeDescriptor {
    pub length: B4,
    pub type_code: B4,
}

impl TypeDescriptor {
    /// The format code as a [`TypeCode`].
    pub fn code(&self) -> TypeCode {
        TypeCode::from_primitive(self.type_code())
    }
}

/// A decoded record value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Value {
    Unsigned(f64),
    Signed(f64),
    Float(f64),
    Text(String),
    /// Marker for the reserved type codes 12-14. Never numeric.
    Reserved,
}

impl Value {
    /// Decode a record value out of the decoder's big-endian accumulator.
    ///
    /// `length` is the value length from the descriptor; values longer than
    /// four bytes only keep their low 32 bits, matching the accumulator
    /// width.
    pub fn decode(raw: u32, code: TypeCode, length: usize) -> Value {
        let code: u8 = code.into();
        match code {
            0..=6 => Value::Unsigned(raw as f64 / f64::from(1u32 << (4 * code))),
            7 => {
                // Text is stored reversed on the wire; the accumulator is
                // big-endian, so reading it low byte first restores the
                // character order.
                let mut text = String::with_capacity(length);
                for i in 0..length.min(4) {
                    text.push(((raw >> (8 * i)) & 0xFF) as u8 as char);
                }
                Value::Text(text)
            }
            8..=11 => {
                let scale = f64::from(1u32 << (8 * (code - 8)));
                Value::Signed(signed_magnitude(raw, length) / scale)
            }
            15 => {
                let exp = match length {
                    2 => 11,
                    4 => 24,
                    _ => 53,
                };
                Value::Float(signed_magnitude(raw, length) / 2f64.powi(exp))
            }
            _ => Value::Reserved,
        }
    }

    pub fn is_reserved(&self) -> bool {
        matches!(self, Value::Reserved)
    }
}

/// Interpret `raw` as a two's-complement value over `length` bytes: negative
/// when the top bit of the field is set, decoded by bit inversion.
fn signed_magnitude(raw: u32, length: usize) -> f64 {
    let bits = (8 * length).min(32) as u32;
    if bits == 0 {
        return 0.0;
    }
    if raw & (1 << (bits - 1)) != 0 {
        let mask = if bits == 32 { u32::MAX } else { (1 << bits) - 1 };
        -(f64::from(raw ^ mask) + 1.0)
    } else {
        f64::from(raw)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unsigned(v) | Value::Signed(v) | Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "\"{s}\""),
            Value::Reserved => write!(f, "Reserved"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_nibbles() {
        let desc = TypeDescriptor::from_bytes([0x92]);
        assert_eq!(desc.length(), 2);
        assert_eq!(desc.code(), TypeCode::SIntBp8);

        let built = TypeDescriptor::new()
            .with_type_code(TypeCode::SIntBp8.into())
            .with_length(2);
        assert_eq!(built.into_bytes(), [0x92]);
    }

    #[test]
    fn unsigned_integer() {
        assert_eq!(Value::decode(0x0A, TypeCode::UInt, 1).to_string(), "10");
        // 4 fractional bits: 0x0180 / 16 = 24
        assert_eq!(Value::decode(0x0180, TypeCode::UIntBp4, 2).to_string(), "24");
        assert_eq!(Value::decode(0x18, TypeCode::UIntBp4, 1).to_string(), "1.5");
    }

    #[test]
    fn signed_integer() {
        assert_eq!(Value::decode(0xFF, TypeCode::SInt, 1).to_string(), "-1");
        assert_eq!(Value::decode(0x7F, TypeCode::SInt, 1).to_string(), "127");
        // Q8 fixed point over two bytes: 0x1020 / 256 = 16.125
        assert_eq!(
            Value::decode(0x1020, TypeCode::SIntBp8, 2),
            Value::Signed(16.125)
        );
        assert_eq!(
            Value::decode(0xFF00, TypeCode::SIntBp8, 2),
            Value::Signed(-1.0)
        );
    }

    #[test]
    fn characters_stored_reversed() {
        let raw = u32::from(b'C') << 16 | u32::from(b'B') << 8 | u32::from(b'A');
        assert_eq!(
            Value::decode(raw, TypeCode::Chars, 3),
            Value::Text("ABC".to_string())
        );
        assert_eq!(Value::decode(raw, TypeCode::Chars, 3).to_string(), "\"ABC\"");
    }

    #[test]
    fn float_scaling() {
        assert_eq!(Value::decode(0x0800, TypeCode::Float, 2), Value::Float(1.0));
        assert_eq!(
            Value::decode(0x0100_0000, TypeCode::Float, 4),
            Value::Float(1.0)
        );
        // Top bit of the two-byte field set: negative.
        assert_eq!(Value::decode(0xF800, TypeCode::Float, 2), Value::Float(-1.0));
    }

    #[test]
    fn reserved_codes_never_numeric() {
        for code in 12..=14u8 {
            let decoded = Value::decode(0x1234, TypeCode::from_primitive(code), 2);
            assert!(decoded.is_reserved(), "code {code} decoded as {decoded:?}");
        }
        assert!(!Value::decode(0, TypeCode::UInt, 1).is_reserved());
    }
}
