//! # Rules
//!
//! A rule is a single grant: the roles it applies to, an optional runtime
//! condition, and the name of the request parameter whose value is handed to
//! that condition.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ConfigResult, ConfigurationError};
use crate::roles::{Role, Roles};

/// Identifier-like request parameters (`id`, `product_id`, ...) by name.
pub type Params = BTreeMap<String, Value>;

/// The user (or other actor) a request is made on behalf of.
pub trait Principal {
    /// Stable identifier, used in the authorization log.
    fn id(&self) -> String;

    /// Current role, if the principal has one.
    fn role(&self) -> Option<Role>;

    /// Human-readable description, used in the authorization log.
    fn description(&self) -> String;
}

type ConditionFn = dyn Fn(Option<&dyn Principal>, Option<&Value>) -> bool + Send + Sync;

/// Runtime check attached to a rule.
///
/// The callback receives the requesting principal (if any) and the raw value
/// of the rule's object id parameter (if the request carried one). Turning
/// that value into a domain object is the callback's business.
///
/// # Example
///
/// ```
/// use authz_rules::Condition;
/// use serde_json::json;
///
/// let owns_object = Condition::new(|_user, object| {
///     object.and_then(|v| v.as_str()) == Some("object_id")
/// });
/// assert!(owns_object.check(None, Some(&json!("object_id"))));
/// assert!(!owns_object.check(None, None));
/// ```
#[derive(Clone)]
pub struct Condition(Arc<ConditionFn>);

impl Condition {
    /// Wrap a callback.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Option<&dyn Principal>, Option<&Value>) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Evaluate the callback.
    pub fn check(&self, user: Option<&dyn Principal>, object_id: Option<&Value>) -> bool {
        (self.0)(user, object_id)
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Condition(..)")
    }
}

/// An authorization rule: `<roles, condition, object_id_key>`.
///
/// A rule matches when the user's role is among `roles` (or `roles` is
/// [`Roles::All`]) and, if a condition is set, the condition holds for the
/// value found under `object_id_key`.
///
/// # Example
///
/// ```
/// use authz_rules::{Params, Roles, Rule};
///
/// let rule = Rule::new(Roles::All, None, None).unwrap();
/// assert_eq!(rule.object_id_key(), "id");
/// assert!(rule.matches(None, &Params::new()));
/// ```
#[derive(Clone)]
pub struct Rule {
    id: Uuid,
    roles: Roles,
    condition: Option<Condition>,
    object_id_key: String,
}

impl Rule {
    /// Parameter consulted when no object id key is configured.
    pub const DEFAULT_OBJECT_ID_KEY: &'static str = "id";

    /// Create a rule.
    ///
    /// # Arguments
    ///
    /// * `roles` - Roles granted by this rule
    /// * `condition` - Optional runtime check
    /// * `object_id_key` - Parameter passed to the condition, `"id"` if `None`
    ///
    /// # Errors
    ///
    /// `EmptyRoles` for an empty role list, `InvalidObjectIdKey` for a blank
    /// key.
    pub fn new(
        roles: Roles,
        condition: Option<Condition>,
        object_id_key: Option<String>,
    ) -> ConfigResult<Self> {
        if roles.is_empty() {
            return Err(ConfigurationError::EmptyRoles);
        }
        let roles = roles.normalized();

        let object_id_key = match object_id_key {
            Some(key) if key.trim().is_empty() => {
                return Err(ConfigurationError::InvalidObjectIdKey(key));
            }
            Some(key) => key.trim().to_string(),
            None => Self::DEFAULT_OBJECT_ID_KEY.to_string(),
        };

        Ok(Self {
            id: Uuid::now_v7(),
            roles,
            condition,
            object_id_key,
        })
    }

    /// Identity used in log output.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Roles granted by this rule.
    pub fn roles(&self) -> &Roles {
        &self.roles
    }

    /// Whether a runtime condition is attached.
    pub fn has_condition(&self) -> bool {
        self.condition.is_some()
    }

    /// Parameter whose value is handed to the condition.
    pub fn object_id_key(&self) -> &str {
        &self.object_id_key
    }

    /// Check whether this rule grants access to `user` given the request's
    /// identifier parameters.
    ///
    /// The condition is consulted only when the role requirement holds.
    pub fn matches(&self, user: Option<&dyn Principal>, ids: &Params) -> bool {
        tracing::debug!(target: "authz", "trying {}", self);

        let role_matches = self.roles.is_all()
            || user
                .and_then(|u| u.role())
                .map_or(false, |role| self.roles.contains(&role));

        match &self.condition {
            None => role_matches,
            Some(condition) => {
                role_matches && condition.check(user, ids.get(&self.object_id_key))
            }
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule({}): allow roles [{}]", self.id, self.roles)?;
        if self.condition.is_some() {
            write!(
                f,
                " (only under condition object_id will be retrieved using '{}')",
                self.object_id_key
            )?;
        }
        Ok(())
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("roles", &self.roles)
            .field("has_condition", &self.condition.is_some())
            .field("object_id_key", &self.object_id_key)
            .finish()
    }
}
