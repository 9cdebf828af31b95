//! # Identifiers
//!
//! Validated names for resources and actions.
//!
//! Both types normalize their input (trimmed, leading `:` dropped, lowercase
//! ASCII) so the same action given as `"Index"`, `":index"` or `" index "`
//! is one key in the registry and matches at request time regardless of the
//! form used.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigResult, ConfigurationError};

/// Trim, drop a symbol-style leading `:` and lowercase.
pub(crate) fn normalize_name(s: &str) -> String {
    let trimmed = s.trim();
    trimmed
        .strip_prefix(':')
        .unwrap_or(trimmed)
        .to_ascii_lowercase()
}

/// Check a single identifier segment: `[a-z_][a-z0-9_]*` after lowercasing.
fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Name of an action within a resource.
///
/// The special name `all` is the wildcard action: rules registered under it
/// apply to every action of their resource.
///
/// # Example
///
/// ```
/// use authz_rules::ActionName;
///
/// let action = ActionName::parse("Edit").unwrap();
/// assert_eq!(action.as_str(), "edit");
/// assert_eq!(action, ActionName::parse("edit").unwrap());
///
/// assert!(ActionName::parse("all").unwrap().is_wildcard());
/// assert!(ActionName::parse("not an action").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ActionName(String);

impl ActionName {
    /// Name of the wildcard action.
    pub const WILDCARD: &'static str = "all";

    /// Parse and normalize an action name.
    ///
    /// # Errors
    ///
    /// `ConfigurationError::InvalidAction` if the trimmed, lowercased input
    /// is not an identifier.
    pub fn parse(s: &str) -> ConfigResult<Self> {
        let normalized = normalize_name(s);
        if !is_identifier(&normalized) {
            return Err(ConfigurationError::InvalidAction(s.to_string()));
        }
        Ok(Self(normalized))
    }

    /// The wildcard action.
    pub fn all() -> Self {
        Self(Self::WILDCARD.to_string())
    }

    /// Whether this is the wildcard action.
    pub fn is_wildcard(&self) -> bool {
        self.0 == Self::WILDCARD
    }

    /// Get the normalized string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ActionName {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ActionName {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for ActionName {
    type Error = ConfigurationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

/// Actions taken from request parameters must be strings.
impl TryFrom<&Value> for ActionName {
    type Error = ConfigurationError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(s) => Self::parse(s),
            other => Err(ConfigurationError::ActionType(json_type_name(other).to_string())),
        }
    }
}

impl From<ActionName> for String {
    fn from(action: ActionName) -> Self {
        action.0
    }
}

/// Name of a protected resource (conventionally a controller name).
///
/// Namespaced resources use `/` between segments, e.g. `admin/users`.
///
/// # Example
///
/// ```
/// use authz_rules::ResourceName;
///
/// let resource = ResourceName::parse("Admin/Users").unwrap();
/// assert_eq!(resource.as_str(), "admin/users");
/// assert!(ResourceName::parse("admin//users").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceName(String);

impl ResourceName {
    /// Conventional name of the application-wide fallback resource.
    pub const APPLICATION: &'static str = "application";

    /// Parse and normalize a resource name.
    ///
    /// # Errors
    ///
    /// `ConfigurationError::InvalidResource` if any `/`-separated segment of
    /// the trimmed, lowercased input is not an identifier.
    pub fn parse(s: &str) -> ConfigResult<Self> {
        let normalized = normalize_name(s);
        if normalized.is_empty() || !normalized.split('/').all(is_identifier) {
            return Err(ConfigurationError::InvalidResource(s.to_string()));
        }
        Ok(Self(normalized))
    }

    /// The application-wide fallback resource.
    pub fn application() -> Self {
        Self(Self::APPLICATION.to_string())
    }

    /// Get the normalized string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ResourceName {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ResourceName {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for ResourceName {
    type Error = ConfigurationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ResourceName> for String {
    fn from(resource: ResourceName) -> Self {
        resource.0
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
