//! Attribute metadata and registry
//!
//! `AttrSpec` is the static descriptor of one attribute; `AttrRegistry` is
//! the per-device table built once from a device definition. The registry is
//! immutable after construction and shared by the polling engine and the
//! protocol adapter. Protocol identity is a type parameter: an OID for SNMP
//! devices, a relay address for relay boards.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};
use crate::value::AttrKind;

/// Attribute access mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    #[default]
    ReadWrite,
}

impl AccessMode {
    pub fn is_readable(&self) -> bool {
        matches!(self, AccessMode::ReadOnly | AccessMode::ReadWrite)
    }

    pub fn is_writable(&self) -> bool {
        matches!(self, AccessMode::WriteOnly | AccessMode::ReadWrite)
    }
}

impl FromStr for AccessMode {
    type Err = LinkError;

    // Device definitions are written by hand; accept the hyphen, underscore
    // and collapsed spellings.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "readonly" | "read-only" | "read_only" => Ok(AccessMode::ReadOnly),
            "writeonly" | "write-only" | "write_only" => Ok(AccessMode::WriteOnly),
            "readwrite" | "read-write" | "read_write" => Ok(AccessMode::ReadWrite),
            other => Err(LinkError::config(format!("unknown access mode {other:?}"))),
        }
    }
}

impl TryFrom<String> for AccessMode {
    type Error = LinkError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<AccessMode> for String {
    fn from(mode: AccessMode) -> Self {
        match mode {
            AccessMode::ReadOnly => "read-only",
            AccessMode::WriteOnly => "write-only",
            AccessMode::ReadWrite => "read-write",
        }
        .to_string()
    }
}

/// Static descriptor of one attribute.
///
/// Immutable after construction; the polling engine reads the name and
/// period, the adapter reads the kind and protocol identity.
#[derive(Debug, Clone)]
pub struct AttrSpec<I> {
    pub name: String,
    pub kind: AttrKind,
    pub access: AccessMode,
    /// Minimum time between successive hardware reads of this attribute.
    /// Zero means read on every poll cycle.
    pub polling_period: Duration,
    pub identity: I,
}

/// Per-device attribute table with stable iteration order
#[derive(Debug, Clone)]
pub struct AttrRegistry<I> {
    specs: Vec<AttrSpec<I>>,
    by_name: HashMap<String, usize>,
}

impl<I> AttrRegistry<I> {
    /// Build a registry, rejecting duplicate attribute names.
    pub fn new(specs: Vec<AttrSpec<I>>) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(specs.len());
        for (index, spec) in specs.iter().enumerate() {
            if by_name.insert(spec.name.clone(), index).is_some() {
                return Err(LinkError::config(format!(
                    "duplicate attribute name {:?}",
                    spec.name
                )));
            }
        }
        Ok(Self { specs, by_name })
    }

    pub fn get(&self, name: &str) -> Option<&AttrSpec<I>> {
        self.by_name.get(name).map(|&index| &self.specs[index])
    }

    /// Like [`get`](Self::get), but failing with [`LinkError::AttrNotFound`].
    pub fn lookup(&self, name: &str) -> Result<&AttrSpec<I>> {
        self.get(name)
            .ok_or_else(|| LinkError::attr_not_found(name))
    }

    /// Iterate specs in definition order.
    pub fn iter(&self) -> impl Iterator<Item = &AttrSpec<I>> {
        self.specs.iter()
    }

    /// (name, polling period) pairs in definition order, for the engine.
    pub fn schedule(&self) -> Vec<(String, Duration)> {
        self.specs
            .iter()
            .map(|spec| (spec.name.clone(), spec.polling_period))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
