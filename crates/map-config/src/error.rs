//! Error types for map configuration handling.

use thiserror::Error;

/// Result type alias using ConfigError.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while building or copying a map configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid projection definition: {0}")]
    InvalidProjection(String),

    #[error("unknown output format: {0}")]
    UnknownFormat(String),

    #[error("map has no output formats registered")]
    NoFormats,

    #[error("failed to copy {entity}: {source}")]
    CopyFailed {
        entity: &'static str,
        #[source]
        source: Box<ConfigError>,
    },
}

impl ConfigError {
    /// Wrap a child-copy failure with the entity that was being copied.
    pub fn while_copying(entity: &'static str, source: ConfigError) -> Self {
        ConfigError::CopyFailed {
            entity,
            source: Box::new(source),
        }
    }
}
