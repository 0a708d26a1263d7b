//! Error types for plan store operations.
//!
//! Every variant carries an [`ErrorContext`] naming the operation and the
//! plan or file involved, so a failed store write in the listener loop can be
//! traced back to the SkyPortal plan that triggered it.

use std::fmt;
use std::path::{Path, PathBuf};

/// Result type for plan store operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Where a plan store error happened.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Store operation, e.g. "store_plan" or "update_fields"
    pub operation: Option<String>,
    /// "plan" or "fields"
    pub entity: Option<String>,
    pub entity_id: Option<String>,
    /// File under the storage root, for the filesystem store
    pub path: Option<PathBuf>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: Some(operation.into()),
            ..Default::default()
        }
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn with_entity_id(mut self, id: impl ToString) -> Self {
        self.entity_id = Some(id.to_string());
        self
    }

    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref op) = self.operation {
            parts.push(format!("operation={}", op));
        }
        if let Some(ref entity) = self.entity {
            parts.push(format!("entity={}", entity));
        }
        if let Some(ref id) = self.entity_id {
            parts.push(format!("id={}", id));
        }
        if let Some(ref path) = self.path {
            parts.push(format!("path={}", path.display()));
        }
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Error type for plan store operations
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Reading or writing the backing storage failed.
    #[error("Storage error: {message} {context}")]
    StorageError {
        message: String,
        context: ErrorContext,
    },

    /// A plan document or fields table could not be encoded or decoded.
    #[error("Serialization error: {message} {context}")]
    SerializationError {
        message: String,
        context: ErrorContext,
    },

    #[error("Not found: {message} {context}")]
    NotFound {
        message: String,
        context: ErrorContext,
    },

    /// The store could not be built from the configuration.
    #[error("Configuration error: {message} {context}")]
    ConfigurationError {
        message: String,
        context: ErrorContext,
    },
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::storage_with_context(message, ErrorContext::default())
    }

    pub fn storage_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::StorageError {
            message: message.into(),
            context,
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::serialization_with_context(message, ErrorContext::default())
    }

    pub fn serialization_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::SerializationError {
            message: message.into(),
            context,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::not_found_with_context(message, ErrorContext::default())
    }

    pub fn not_found_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::NotFound {
            message: message.into(),
            context,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::StorageError { context, .. }
            | Self::SerializationError { context, .. }
            | Self::NotFound { context, .. }
            | Self::ConfigurationError { context, .. } => context,
        }
    }

    /// Set the operation, keeping the rest of the context.
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        match &mut self {
            Self::StorageError { context, .. }
            | Self::SerializationError { context, .. }
            | Self::NotFound { context, .. }
            | Self::ConfigurationError { context, .. } => {
                context.operation = Some(operation.into());
            }
        }
        self
    }
}

impl From<std::io::Error> for RepositoryError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            RepositoryError::not_found(err.to_string())
        } else {
            RepositoryError::storage(format!("{} ({:?})", err, err.kind()))
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_context_display() {
        let ctx = ErrorContext::new("store_plan")
            .with_entity("plan")
            .with_entity_id(417)
            .with_path("plans/2024-03-19T12:00:00_GRANDMA.json");
        assert_eq!(
            ctx.to_string(),
            "[operation=store_plan, entity=plan, id=417, path=plans/2024-03-19T12:00:00_GRANDMA.json]"
        );
    }

    #[test]
    fn test_io_not_found_maps_to_not_found() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert!(matches!(
            RepositoryError::from(io),
            RepositoryError::NotFound { .. }
        ));

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(matches!(
            RepositoryError::from(denied),
            RepositoryError::StorageError { .. }
        ));
    }

    #[test]
    fn test_with_operation_overrides_context() {
        let err = RepositoryError::storage("write failed").with_operation("mark_expired");
        assert_eq!(err.context().operation.as_deref(), Some("mark_expired"));
        assert!(err.to_string().contains("operation=mark_expired"));
    }
}
