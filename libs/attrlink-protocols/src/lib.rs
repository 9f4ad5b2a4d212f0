//! # attrlink-protocols
//!
//! Protocol adapters for the attrlink device-control layer. Each adapter
//! implements `attrlink::PollAdapter` for one hardware family and is
//! feature-gated for selective compilation.
//!
//! # Features
//!
//! - `snmp` - SNMP-managed equipment (v2c community or v3 USM)
//! - `proxr` - ProXR relay boards over their TCP byte protocol
//!
//! # Architecture
//!
//! Adapters translate one batched [`PollRequest`](attrlink::PollRequest)
//! into wire operations: writes are dispatched before reads within a cycle,
//! and only values confirmed by a read make it into the poll response. The
//! polling engine in `attrlink` owns scheduling and state; device
//! definitions in `attrlink-config` provide the attribute tables.

#[cfg(feature = "proxr")]
pub mod proxr;

#[cfg(feature = "snmp")]
pub mod snmp;

// Re-export core types for convenience
pub use attrlink::{
    AttrKind, AttrRegistry, AttrSpec, AttrValue, AttributePoller, LinkError, PollAdapter,
    PollRequest, PollResponse, Result,
};
