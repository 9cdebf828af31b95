//! Request context
//!
//! [`AuthorizeOptions`] is what callers hand to the engine: everything
//! optional, raw strings. [`RequestContext`] is what the engine evaluates
//! rules against: user resolved, names validated, identifier parameters
//! collected.

use authz_rules::{ActionName, Principal, ResourceName};
use serde_json::Value;
use std::fmt;

pub use authz_rules::Params;

/// Check whether a parameter name refers to an object id (`id` or `*_id`).
///
/// # Examples
///
/// ```
/// use authz_engine::context::is_id_key;
///
/// assert!(is_id_key("id"));
/// assert!(is_id_key("product_id"));
/// assert!(!is_id_key("identity"));
/// assert!(!is_id_key("ids"));
/// ```
pub fn is_id_key(key: &str) -> bool {
    key == "id" || key.ends_with("_id")
}

/// Keep only the identifier-like entries of a parameter map.
pub fn id_params(params: &Params) -> Params {
    params
        .iter()
        .filter(|(key, _)| is_id_key(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Caller-supplied description of the operation to authorize.
///
/// Missing `user` and `resource` are taken from the [`RequestHost`]. The
/// identifier-like entries of `params` are merged into `ids`; entries already
/// in `ids` win.
///
/// [`RequestHost`]: crate::host::RequestHost
///
/// # Examples
///
/// ```
/// use authz_engine::AuthorizeOptions;
///
/// let options = AuthorizeOptions::new()
///     .resource("products")
///     .action("edit")
///     .param("product_id", "17")
///     .param("page", 2);
///
/// assert_eq!(options.action.as_deref(), Some("edit"));
/// assert_eq!(options.params.len(), 2);
/// ```
#[derive(Clone, Default)]
pub struct AuthorizeOptions<'a> {
    /// Requesting principal
    pub user: Option<&'a dyn Principal>,

    /// Resource to check
    pub resource: Option<String>,

    /// Action to check
    pub action: Option<String>,

    /// Explicit identifier parameters
    pub ids: Params,

    /// Other request parameters
    pub params: Params,
}

impl<'a> AuthorizeOptions<'a> {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the requesting principal.
    pub fn user(mut self, user: &'a dyn Principal) -> Self {
        self.user = Some(user);
        self
    }

    /// Set the resource.
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Set the action.
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Add an explicit identifier parameter.
    pub fn id(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ids.insert(key.into(), value.into());
        self
    }

    /// Add a request parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

impl fmt::Debug for AuthorizeOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizeOptions")
            .field("user", &self.user.map(|u| u.id()))
            .field("resource", &self.resource)
            .field("action", &self.action)
            .field("ids", &self.ids)
            .field("params", &self.params)
            .finish()
    }
}

/// Normalized request the rules are evaluated against.
#[derive(Clone)]
pub struct RequestContext<'a> {
    /// Requesting principal, `None` when unauthenticated
    pub user: Option<&'a dyn Principal>,

    /// Requested resource
    pub resource: ResourceName,

    /// Requested action
    pub action: ActionName,

    /// Identifier parameters
    pub ids: Params,
}

impl<'a> RequestContext<'a> {
    /// Build a context from already validated parts.
    pub fn new(
        user: Option<&'a dyn Principal>,
        resource: ResourceName,
        action: ActionName,
        ids: Params,
    ) -> Self {
        Self {
            user,
            resource,
            action,
            ids,
        }
    }

    /// Merge identifier-like entries of `params` into `ids` without
    /// overwriting existing entries.
    pub fn merge_id_params(&mut self, params: Params) {
        for (key, value) in params {
            if is_id_key(&key) {
                self.ids.entry(key).or_insert(value);
            }
        }
    }
}

impl fmt::Display for RequestContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("user ")?;
        match self.user {
            Some(user) => {
                let role = user
                    .role()
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "none".to_string());
                write!(f, "{}(id:{} role:{})", user.description(), user.id(), role)?;
            }
            None => f.write_str("none")?,
        }
        write!(
            f,
            " requested access to method {}:{} using ids:{{",
            self.resource, self.action
        )?;
        for (i, (key, value)) in self.ids.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", key, value)?;
        }
        f.write_str("}")
    }
}

impl fmt::Debug for RequestContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("user", &self.user.map(|u| u.id()))
            .field("resource", &self.resource)
            .field("action", &self.action)
            .field("ids", &self.ids)
            .finish()
    }
}
