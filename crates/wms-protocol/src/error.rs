//! WMS protocol errors and their OGC exception codes.

use thiserror::Error;

use crate::contracts::BackendError;

/// Result type alias using WmsError.
pub type WmsResult<T> = Result<T, WmsError>;

/// Errors raised while serving a WMS request.
///
/// Every variant carries the human-readable message that ends up inside the
/// `<ServiceException>` element; [`WmsError::ogc_code`] supplies the optional
/// `code` attribute.
#[derive(Debug, Error)]
pub enum WmsError {
    #[error("{0}")]
    MissingParameter(String),

    #[error("{0}")]
    LayerNotDefined(String),

    #[error("{0}")]
    StyleNotDefined(String),

    #[error("{0}")]
    InvalidSrs(String),

    #[error("{0}")]
    InvalidFormat(String),

    #[error("{0}")]
    InvalidRule(String),

    #[error("{0}")]
    LayerNotQueryable(String),

    #[error("{0}")]
    MissingDimension(String),

    #[error("{0}")]
    InvalidDimension(String),

    #[error("{0}")]
    CurrentUpdateSequence(String),

    #[error("{0}")]
    InvalidUpdateSequence(String),

    #[error("{0}")]
    ServiceNotDefined(String),

    /// Request-shape or collaborator failure without an OGC code.
    #[error("{0}")]
    Other(String),
}

impl WmsError {
    /// The `code` attribute for the Service Exception, if the error maps to
    /// one of the published OGC codes.
    pub fn ogc_code(&self) -> Option<&'static str> {
        match self {
            WmsError::MissingParameter(_) => Some("MissingParameterValue"),
            WmsError::LayerNotDefined(_) => Some("LayerNotDefined"),
            WmsError::StyleNotDefined(_) => Some("StyleNotDefined"),
            WmsError::InvalidSrs(_) => Some("InvalidSRS"),
            WmsError::InvalidFormat(_) => Some("InvalidFormat"),
            WmsError::InvalidRule(_) => Some("InvalidRule"),
            WmsError::LayerNotQueryable(_) => Some("LayerNotQueryable"),
            WmsError::MissingDimension(_) => Some("MissingDimensionValue"),
            WmsError::InvalidDimension(_) => Some("InvalidDimensionValue"),
            WmsError::CurrentUpdateSequence(_) => Some("CurrentUpdateSequence"),
            WmsError::InvalidUpdateSequence(_) => Some("InvalidUpdateSequence"),
            WmsError::ServiceNotDefined(_) => Some("ServiceNotDefined"),
            WmsError::Other(_) => None,
        }
    }
}

impl From<BackendError> for WmsError {
    fn from(err: BackendError) -> Self {
        WmsError::Other(err.to_string())
    }
}

impl From<map_config::ConfigError> for WmsError {
    fn from(err: map_config::ConfigError) -> Self {
        WmsError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(
            WmsError::InvalidSrs("x".into()).ogc_code(),
            Some("InvalidSRS")
        );
        assert_eq!(WmsError::Other("x".into()).ogc_code(), None);
    }
}
