//! Device definition errors
//!
//! All of these are configuration errors: fatal at startup, never retried.

use attrlink::LinkError;
use thiserror::Error;

/// Result type for definition parsing and expansion
pub type Result<T> = std::result::Result<T, DefinitionError>;

/// Errors raised while parsing or expanding a device definition
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("cannot read definition file {path}: {message}")]
    Read { path: String, message: String },

    #[error("invalid definition YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("attribute name {name:?} contains no placeholders, but defines indexes")]
    IndexesWithoutPlaceholders { name: String },

    #[error("attribute name {name:?} contains placeholders, but no indexes were provided")]
    PlaceholdersWithoutIndexes { name: String },

    #[error("attribute {name:?} has {placeholders} placeholders for {indexes} indexes")]
    PlaceholderCount {
        name: String,
        placeholders: usize,
        indexes: usize,
    },

    #[error("OID for attribute {name:?} must have a suffix - use [0] for a scalar object")]
    MissingSuffix { name: String },

    #[error("invalid OID segment {segment:?} for attribute {name:?}")]
    InvalidOid { name: String, segment: String },

    #[error("invalid index range for attribute {name:?}: {message}")]
    InvalidIndexRange { name: String, message: String },

    #[error("expanded attribute name {name:?} is not a valid identifier")]
    InvalidIdentifier { name: String },

    #[error("duplicate attribute name {name:?}")]
    DuplicateName { name: String },

    #[error("invalid type for attribute {name:?}: {message}")]
    InvalidType { name: String, message: String },
}

impl From<DefinitionError> for LinkError {
    fn from(err: DefinitionError) -> Self {
        LinkError::Config(err.to_string())
    }
}
