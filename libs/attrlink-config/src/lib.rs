//! # attrlink-config
//!
//! Device definition structures for the attrlink device-control layer.
//!
//! A definition file describes one device: its poll rate and the attribute
//! templates to expand into the attribute registry. Protocol crates turn the
//! expanded attributes into their own `AttrSpec` tables (resolving OIDs or
//! relay addresses).

pub mod definition;
pub mod error;

pub use definition::{
    load_device_definition, AttrTemplate, DeviceDefinition, DtypeDef, ExpandedAttr, IndexSpec,
};
pub use error::{DefinitionError, Result};
