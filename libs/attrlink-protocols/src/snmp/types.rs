//! SNMP wire type conversion
//!
//! Translation between native attribute values and SNMP wire values lives
//! entirely in this module; supporting a new semantic type should only mean
//! adding cases here.
//!
//! `WireValue` is the normalized form a value takes between the session
//! layer and the adapter: integers, raw octets, or text. Converted write
//! values are produced at enqueue time, so every function here is
//! synchronous and infallible at poll time.

use attrlink::{AttrKind, AttrSpec, AttrValue, LinkError, Result};

/// Normalized SNMP wire value
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    Int(i64),
    Bytes(Vec<u8>),
    Text(String),
}

impl WireValue {
    fn as_int<I>(&self, spec: &AttrSpec<I>) -> Result<i64> {
        let parsed = match self {
            WireValue::Int(i) => Some(*i),
            WireValue::Text(s) => s.trim().parse().ok(),
            WireValue::Bytes(b) => std::str::from_utf8(b)
                .ok()
                .and_then(|s| s.trim().parse().ok()),
        };
        parsed.ok_or_else(|| {
            LinkError::conversion(format!(
                "{} cannot convert {self:?} to {}",
                spec.name,
                spec.kind.type_name()
            ))
        })
    }
}

/// Coerce an SNMP wire value to the attribute's native type.
pub fn wire_to_native<I>(spec: &AttrSpec<I>, value: &WireValue) -> Result<AttrValue> {
    match &spec.kind {
        AttrKind::Int => Ok(AttrValue::Int(value.as_int(spec)?)),
        AttrKind::Bool => Ok(AttrValue::Bool(value.as_int(spec)? != 0)),
        AttrKind::Float => {
            let parsed = match value {
                WireValue::Int(i) => Some(*i as f64),
                WireValue::Text(s) => s.trim().parse().ok(),
                WireValue::Bytes(b) => std::str::from_utf8(b)
                    .ok()
                    .and_then(|s| s.trim().parse().ok()),
            };
            parsed.map(AttrValue::Float).ok_or_else(|| {
                LinkError::conversion(format!(
                    "{} cannot convert {value:?} to float",
                    spec.name
                ))
            })
        }
        AttrKind::Str => Ok(AttrValue::Str(match value {
            WireValue::Text(s) => s.clone(),
            WireValue::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            WireValue::Int(i) => i.to_string(),
        })),
        // Labeled or not, enum reads pass the raw ordinal through; label
        // rendering belongs to the control plane.
        AttrKind::Enum(_) => Ok(AttrValue::Int(value.as_int(spec)?)),
        AttrKind::Bits(_) => {
            let bytes = match value {
                WireValue::Bytes(b) => b.as_slice(),
                WireValue::Text(s) => s.as_bytes(),
                WireValue::Int(_) => {
                    return Err(LinkError::conversion(format!(
                        "{} expects octets for a bits attribute",
                        spec.name
                    )))
                }
            };
            Ok(AttrValue::Bits(unpack_bits(bytes)))
        }
    }
}

/// Coerce a native value to its SNMP wire form.
///
/// Runs synchronously inside `enqueue_write`, so malformed values are
/// reported to the caller immediately.
pub fn native_to_wire<I>(spec: &AttrSpec<I>, value: &AttrValue) -> Result<WireValue> {
    match &spec.kind {
        AttrKind::Bool => {
            let on = value.as_bool().ok_or_else(|| {
                LinkError::conversion(format!(
                    "{} expects a boolean, got {}",
                    spec.name,
                    value.type_name()
                ))
            })?;
            Ok(WireValue::Int(if on { 1 } else { 0 }))
        }
        AttrKind::Int => {
            let i = value.as_i64().ok_or_else(|| {
                LinkError::conversion(format!(
                    "{} expects an integer, got {}",
                    spec.name,
                    value.type_name()
                ))
            })?;
            Ok(WireValue::Int(i))
        }
        // SNMP has no native float type; refuse rather than truncate.
        AttrKind::Float => Err(LinkError::conversion(format!(
            "{} is a float attribute and cannot be written over SNMP",
            spec.name
        ))),
        AttrKind::Str => match value {
            AttrValue::Str(s) => Ok(WireValue::Text(s.clone())),
            other => Err(LinkError::conversion(format!(
                "{} expects a string, got {}",
                spec.name,
                other.type_name()
            ))),
        },
        AttrKind::Enum(labels) => {
            let ordinal = value.as_i64().ok_or_else(|| {
                LinkError::conversion(format!(
                    "{} expects an enum ordinal, got {}",
                    spec.name,
                    value.type_name()
                ))
            })?;
            if !labels.is_writable_ordinal(ordinal) {
                return Err(LinkError::conversion(format!(
                    "enum value {ordinal} for {} is invalid",
                    spec.name
                )));
            }
            Ok(WireValue::Int(ordinal))
        }
        AttrKind::Bits(field) => {
            let positions = value.as_bits().ok_or_else(|| {
                LinkError::conversion(format!(
                    "{} expects a set of bit positions, got {}",
                    spec.name,
                    value.type_name()
                ))
            })?;
            let mut bytes = vec![0u8; field.byte_len()];
            for &bit in positions {
                if bit >= field.width() {
                    return Err(LinkError::conversion(format!(
                        "bit {bit} is outside the {}-bit field of {}",
                        field.width(),
                        spec.name
                    )));
                }
                bytes[(bit / 8) as usize] |= 0b1000_0000 >> (bit % 8);
            }
            Ok(WireValue::Bytes(bytes))
        }
    }
}

/// Expand BITS octets into set-bit positions, MSB first within each byte.
fn unpack_bits(bytes: &[u8]) -> Vec<u16> {
    let mut bits = Vec::new();
    for (index, byte) in bytes.iter().enumerate() {
        for bit in 0..8u16 {
            if byte & (0b1000_0000 >> bit) != 0 {
                bits.push(index as u16 * 8 + bit);
            }
        }
    }
    bits
}
