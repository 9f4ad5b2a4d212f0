//! Attribute Link Error Types
//!
//! Core error types shared by the polling engine and protocol adapters.

use thiserror::Error;

/// Result type for attrlink operations
pub type Result<T> = std::result::Result<T, LinkError>;

/// Attribute polling errors
#[derive(Debug, Error, Clone)]
pub enum LinkError {
    /// Configuration errors (fatal at startup, never retried)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Native/wire value conversion errors
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Frame-level errors (bad header, length or checksum)
    #[error("Framing error: {0}")]
    Framing(String),

    /// Connection errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,

    /// IO errors
    #[error("IO error: {0}")]
    Io(String),

    /// Timeout errors
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Protocol-level errors (error indication from the remote agent)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Unknown attribute name
    #[error("Attribute not found: {0}")]
    AttrNotFound(String),
}

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        LinkError::Io(err.to_string())
    }
}

// Helper methods for creating errors
impl LinkError {
    pub fn config(msg: impl Into<String>) -> Self {
        LinkError::Config(msg.into())
    }

    pub fn conversion(msg: impl Into<String>) -> Self {
        LinkError::Conversion(msg.into())
    }

    pub fn framing(msg: impl Into<String>) -> Self {
        LinkError::Framing(msg.into())
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        LinkError::Connection(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        LinkError::Io(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        LinkError::Timeout(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        LinkError::Protocol(msg.into())
    }

    pub fn attr_not_found(name: impl Into<String>) -> Self {
        LinkError::AttrNotFound(name.into())
    }

    /// Check if this error is caller-visible at enqueue time rather than
    /// cycle-fatal inside the polling loop.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            LinkError::Config(_) | LinkError::Conversion(_) | LinkError::AttrNotFound(_)
        )
    }
}
