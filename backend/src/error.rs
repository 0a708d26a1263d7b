//! Boundary errors shared by the bridge components.
//!
//! Below-horizon fields and plans with nothing observable are normal outcomes
//! and never surface here; these variants cover input that cannot be handed
//! to the visibility filter at all, and missing operator configuration.

/// Result type for boundary validation.
pub type BridgeResult<T> = Result<T, BridgeError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BridgeError {
    /// Right ascension outside [0, 360) or declination outside [-90, 90].
    #[error("Invalid coordinate: {message}")]
    InvalidCoordinate { message: String },

    /// Latitude/longitude outside their geographic ranges.
    #[error("Invalid observer location: {0}")]
    InvalidLocation(String),

    /// No observer location could be resolved (neither configured nor reported by RTS2).
    #[error("Observer location is required but was not provided")]
    MissingLocation,

    /// No SkyPortal API token was configured.
    #[error("Cannot operate without SkyPortal API token")]
    MissingToken,

    /// Configuration file could not be read or parsed.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl BridgeError {
    pub fn invalid_coordinate(message: impl Into<String>) -> Self {
        Self::InvalidCoordinate {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_coordinate_message() {
        let err = BridgeError::invalid_coordinate("declination 91 outside [-90, 90]");
        assert_eq!(
            err.to_string(),
            "Invalid coordinate: declination 91 outside [-90, 90]"
        );
    }

    #[test]
    fn test_missing_token_message() {
        assert!(BridgeError::MissingToken.to_string().contains("token"));
    }
}
