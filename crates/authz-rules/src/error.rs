//! Error types for rule registration
//!
//! Everything that can go wrong while declaring or looking up rules is a
//! configuration problem: a malformed identifier, or a rule declared without
//! the roles it grants access to.

use thiserror::Error;

/// Rule configuration error types.
///
/// These errors are fatal to the registration (or lookup) call that raised
/// them and are always propagated to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// Action name is not a valid identifier
    #[error("Invalid action name: {0:?}")]
    InvalidAction(String),

    /// Resource name is not a valid identifier
    #[error("Invalid resource name: {0:?}")]
    InvalidResource(String),

    /// Action list value that is not a string
    #[error("Action should be a string -- not {0}")]
    ActionType(String),

    /// `permit` was called without specifying roles
    #[error("No roles given for actions [{0}]")]
    MissingRoles(String),

    /// A rule was built with an empty role list
    #[error("Role list must not be empty")]
    EmptyRoles,

    /// Object id key is blank
    #[error("Invalid object id key: {0:?}")]
    InvalidObjectIdKey(String),
}

/// Result type for rule configuration operations.
pub type ConfigResult<T> = Result<T, ConfigurationError>;

impl ConfigurationError {
    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            ConfigurationError::InvalidAction(_) => "INVALID_ACTION",
            ConfigurationError::InvalidResource(_) => "INVALID_RESOURCE",
            ConfigurationError::ActionType(_) => "INVALID_ACTION_TYPE",
            ConfigurationError::MissingRoles(_) => "MISSING_ROLES",
            ConfigurationError::EmptyRoles => "EMPTY_ROLES",
            ConfigurationError::InvalidObjectIdKey(_) => "INVALID_OBJECT_ID_KEY",
        }
    }
}
