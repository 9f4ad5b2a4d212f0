//! Component state cache and control-plane callbacks
//!
//! The cache is the authoritative view of the hardware as last observed by
//! the polling loop. Only the loop writes it; the control plane reads it
//! through the engine's accessors and is notified of changes through the
//! injected callbacks.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value::AttrValue;

/// Transport-level communication status, as reported to the control plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CommunicationStatus {
    /// Polling not started (or stopped)
    #[default]
    Disabled,
    /// Polling active, no successful exchange yet (or the last one failed)
    NotEstablished,
    /// Last poll cycle succeeded
    Established,
}

impl std::fmt::Display for CommunicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommunicationStatus::Disabled => write!(f, "DISABLED"),
            CommunicationStatus::NotEstablished => write!(f, "NOT_ESTABLISHED"),
            CommunicationStatus::Established => write!(f, "ESTABLISHED"),
        }
    }
}

/// Device power state as inferred from poll outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PowerState {
    /// A poll cycle failed; the device state cannot be trusted
    #[default]
    Unknown,
    /// The device answered a poll
    On,
}

/// One cached attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttrReading {
    pub value: Option<AttrValue>,
    pub timestamp: DateTime<Utc>,
    pub valid: bool,
}

impl Default for AttrReading {
    fn default() -> Self {
        Self {
            value: None,
            timestamp: DateTime::UNIX_EPOCH,
            valid: false,
        }
    }
}

/// Change notification pushed to the control plane after each cycle
#[derive(Debug, Clone)]
pub struct ComponentUpdate {
    pub power: PowerState,
    pub changed: HashMap<String, AttrValue>,
}

/// Callback fired when the communication status flips
pub type CommunicationStateCallback = Arc<dyn Fn(CommunicationStatus) + Send + Sync>;

/// Callback fired after every completed poll cycle
pub type ComponentStateCallback = Arc<dyn Fn(&ComponentUpdate) + Send + Sync>;

/// Cached readings for every attribute of one device
#[derive(Debug, Clone, Default)]
pub struct StateCache {
    readings: HashMap<String, AttrReading>,
}

impl StateCache {
    /// Create a cache with every attribute present and invalid.
    pub fn new(names: impl IntoIterator<Item = String>) -> Self {
        Self {
            readings: names
                .into_iter()
                .map(|name| (name, AttrReading::default()))
                .collect(),
        }
    }

    /// Merge confirmed values from a successful poll.
    pub fn apply(&mut self, updates: &HashMap<String, AttrValue>, now: DateTime<Utc>) {
        for (name, value) in updates {
            let reading = self.readings.entry(name.clone()).or_default();
            reading.value = Some(value.clone());
            reading.timestamp = now;
            reading.valid = true;
        }
    }

    /// Mark every reading invalid, keeping the last known values for
    /// diagnostics.
    pub fn invalidate_all(&mut self) {
        for reading in self.readings.values_mut() {
            reading.valid = false;
        }
    }

    pub fn reading(&self, name: &str) -> Option<&AttrReading> {
        self.readings.get(name)
    }

    pub fn snapshot(&self) -> HashMap<String, AttrReading> {
        self.readings.clone()
    }
}
