//! Native value model
//!
//! `AttrValue` is the value type exchanged with the control plane, and
//! `AttrKind` is the semantic type of an attribute. Adapters convert between
//! these and their wire representations; the polling engine never looks
//! inside a wire value.

use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};

/// Value type for attribute data exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Set-bit positions of a bit-set attribute
    Bits(Vec<u16>),
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<u16> for AttrValue {
    fn from(v: u16) -> Self {
        Self::Int(v as i64)
    }
}

impl From<u32> for AttrValue {
    fn from(v: u32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Vec<u16>> for AttrValue {
    fn from(v: Vec<u16>) -> Self {
        Self::Bits(v)
    }
}

impl AttrValue {
    /// Try to convert to bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(i) => Some(*i != 0),
            Self::Float(f) => Some(*f != 0.0),
            Self::Str(s) => match s.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Some(true),
                "false" | "0" | "no" | "off" => Some(false),
                _ => None,
            },
            Self::Bits(_) => None,
        }
    }

    /// Try to convert to i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) => Some(f.round() as i64),
            Self::Bool(b) => Some(if *b { 1 } else { 0 }),
            Self::Str(s) => s.parse().ok(),
            Self::Bits(_) => None,
        }
    }

    /// Try to convert to f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Str(s) => s.parse().ok(),
            Self::Bits(_) => None,
        }
    }

    /// Try to borrow the set-bit positions
    pub fn as_bits(&self) -> Option<&[u16]> {
        match self {
            Self::Bits(bits) => Some(bits),
            _ => None,
        }
    }

    /// Variant name, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Bits(_) => "bits",
        }
    }
}

/// Semantic type of an attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrKind {
    Bool,
    Int,
    Float,
    Str,
    /// Enumerated integer with a dense, gap-filled label table
    Enum(EnumLabels),
    /// Fixed-width bitmask whose value is a set of set-bit positions
    Bits(BitField),
}

/// Label table for an enumerated attribute.
///
/// Control planes generally require enum ordinals to be dense from 0, but
/// hardware enumerations often start at 1 or skip values. Gap positions are
/// kept as `None` placeholders: they make the table dense, are never shown
/// as labels, and are rejected when written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumLabels {
    labels: Vec<Option<String>>,
}

impl EnumLabels {
    /// Build a dense label table from (ordinal, label) pairs.
    pub fn from_named(named: impl IntoIterator<Item = (u32, String)>) -> Result<Self> {
        let mut pairs: Vec<(u32, String)> = named.into_iter().collect();
        if pairs.is_empty() {
            return Err(LinkError::config("enum type declares no named values"));
        }
        pairs.sort_by_key(|(ordinal, _)| *ordinal);

        let max = pairs.last().map(|(ordinal, _)| *ordinal).unwrap_or(0);
        let mut labels = vec![None; max as usize + 1];
        for (ordinal, label) in pairs {
            if labels[ordinal as usize].is_some() {
                return Err(LinkError::config(format!(
                    "duplicate enum ordinal {ordinal}"
                )));
            }
            labels[ordinal as usize] = Some(label);
        }
        Ok(Self { labels })
    }

    /// Number of ordinals, placeholders included
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label for an ordinal, if it is a real (non-placeholder) value
    pub fn label(&self, ordinal: i64) -> Option<&str> {
        usize::try_from(ordinal)
            .ok()
            .and_then(|i| self.labels.get(i))
            .and_then(|l| l.as_deref())
    }

    /// Whether the ordinal may be written to hardware
    pub fn is_writable_ordinal(&self, ordinal: i64) -> bool {
        self.label(ordinal).is_some()
    }
}

/// Shape of a bit-set attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BitField {
    width: u16,
    labels: Vec<Option<String>>,
}

impl BitField {
    /// Bit field of the given width with unlabeled positions
    pub fn new(width: u16) -> Self {
        Self {
            width,
            labels: vec![None; width as usize],
        }
    }

    /// Build from (bit position, label) pairs; width = highest position + 1
    pub fn from_named(named: impl IntoIterator<Item = (u32, String)>) -> Result<Self> {
        let pairs: Vec<(u32, String)> = named.into_iter().collect();
        if pairs.is_empty() {
            return Err(LinkError::config("bit field declares no named bits"));
        }
        let max = pairs.iter().map(|(bit, _)| *bit).max().unwrap_or(0);
        let width = u16::try_from(max + 1)
            .map_err(|_| LinkError::config(format!("bit position {max} out of range")))?;

        let mut field = Self::new(width);
        for (bit, label) in pairs {
            if field.labels[bit as usize].is_some() {
                return Err(LinkError::config(format!("duplicate bit position {bit}")));
            }
            field.labels[bit as usize] = Some(label);
        }
        Ok(field)
    }

    /// Number of bit positions
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Bytes needed to carry the field on the wire
    pub fn byte_len(&self) -> usize {
        (self.width as usize).div_ceil(8)
    }

    /// Label of a bit position, if configured
    pub fn label(&self, bit: u16) -> Option<&str> {
        self.labels.get(bit as usize).and_then(|l| l.as_deref())
    }
}

impl AttrKind {
    /// Short name, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "string",
            Self::Enum(_) => "enum",
            Self::Bits(_) => "bits",
        }
    }
}
