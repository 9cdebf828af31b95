//! Error types for authorization operations
//!
//! A denied request is not an error: `authorize` returns `Ok(false)`. These
//! errors describe requests that could not be evaluated at all.

use authz_rules::ConfigurationError;
use thiserror::Error;

/// Authorization error types.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Malformed resource/action identifier or rule declaration
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// No action given and none known from the host
    #[error("Configuration error: no action to authorize")]
    MissingAction,

    /// No resource given and none known from the host
    #[error("Configuration error: no resource to authorize")]
    MissingResource,

    /// Path could not be resolved to a resource/action pair
    #[error("Ambiguous input: cannot resolve {0:?} to a resource and action")]
    AmbiguousInput(String),

    /// Resource rules failed to load
    #[error("Failed to load rules for resource {resource}: {message}")]
    ResourceLoad {
        /// Resource being loaded
        resource: String,
        /// Loader error message
        message: String,
    },

    /// Invalid engine configuration
    #[error("Invalid configuration value for {key}: {message}")]
    Config {
        /// Configuration key
        key: String,
        /// Error message
        message: String,
    },

    /// Log file could not be opened or subscriber installed
    #[error("Logging setup failed: {0}")]
    Logging(String),
}

/// Result type for authorization operations.
pub type AuthzResult<T> = Result<T, AuthzError>;

impl AuthzError {
    /// Check if this error should be logged at error level.
    ///
    /// Unresolvable paths come from clients; everything else is a problem
    /// with the deployment.
    pub fn is_server_error(&self) -> bool {
        !matches!(self, AuthzError::AmbiguousInput(_))
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthzError::AmbiguousInput(_) => 404,

            AuthzError::Configuration(_)
            | AuthzError::MissingAction
            | AuthzError::MissingResource
            | AuthzError::ResourceLoad { .. }
            | AuthzError::Config { .. }
            | AuthzError::Logging(_) => 500,
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthzError::Configuration(e) => e.error_code(),
            AuthzError::MissingAction => "MISSING_ACTION",
            AuthzError::MissingResource => "MISSING_RESOURCE",
            AuthzError::AmbiguousInput(_) => "AMBIGUOUS_INPUT",
            AuthzError::ResourceLoad { .. } => "RESOURCE_LOAD_ERROR",
            AuthzError::Config { .. } => "CONFIG_ERROR",
            AuthzError::Logging(_) => "LOGGING_ERROR",
        }
    }
}
