//! # attrlink
//!
//! Core of the attrlink device-control layer: a generic attribute polling
//! engine and the protocol adapter seam it drives.
//!
//! A device is described by an [`AttrRegistry`] of static attribute
//! descriptors. An [`AttributePoller`] repeatedly batches pending writes and
//! due reads into one [`PollRequest`], hands it to a [`PollAdapter`]
//! implementation for the device's hardware family, and folds the confirmed
//! values back into the component state cache, notifying the control plane
//! through injected callbacks.
//!
//! Protocol adapters (SNMP, ProXR relay boards) live in the
//! `attrlink-protocols` crate; device definition parsing lives in
//! `attrlink-config`.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use attrlink::{AttributePoller, AttrValue};
//! use attrlink_protocols::snmp::SnmpAdapter;
//!
//! let adapter = SnmpAdapter::new(registry.clone(), session, 24);
//! let mut poller = AttributePoller::new(
//!     "switch-psu",
//!     adapter,
//!     registry.schedule(),
//!     poll_rate,
//!     comm_callback,
//!     state_callback,
//! );
//! poller.start().await?;
//! poller.enqueue_write("psuOutput", AttrValue::Int(1))?;
//! ```

pub mod attribute;
pub mod error;
pub mod polling;
pub mod state;
pub mod value;

pub use attribute::{AccessMode, AttrRegistry, AttrSpec};
pub use error::{LinkError, Result};
pub use polling::{
    AttributePoller, PendingWrites, PollAdapter, PollRequest, PollResponse, PollerCore,
};
pub use state::{
    AttrReading, CommunicationStateCallback, CommunicationStatus, ComponentStateCallback,
    ComponentUpdate, PowerState, StateCache,
};
pub use value::{AttrKind, AttrValue, BitField, EnumLabels};
