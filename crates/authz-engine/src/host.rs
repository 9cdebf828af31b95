//! Collaborators supplied by the host application.
//!
//! The engine never talks to sessions, controllers or rule sources directly.
//! It asks the [`RequestHost`] about the current request and, optionally, a
//! [`ResourceLoader`] to bring in a resource's rules the first time that
//! resource is seen.

use authz_rules::{Params, Principal, ResourceName, ResourceRules, RuleRegistry};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{AuthzError, AuthzResult};

/// The current request, as seen by the host framework.
///
/// Every method has a default, so hosts only implement what they know.
pub trait RequestHost {
    /// Authentication status. `None` means the host has no notion of login
    /// and the check is skipped; `Some(false)` denies every request.
    fn logged_in(&self) -> Option<bool> {
        None
    }

    /// The authenticated principal, if any.
    fn current_user(&self) -> Option<&dyn Principal> {
        None
    }

    /// Name of the resource handling the request.
    fn current_resource_name(&self) -> Option<String> {
        None
    }

    /// Name of the action being dispatched.
    fn current_action_name(&self) -> Option<String> {
        None
    }

    /// Request parameters.
    fn params(&self) -> Params {
        Params::new()
    }
}

/// Host with no request information: no login check, no user, no defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct Detached;

impl RequestHost for Detached {}

/// Loads a resource's rules on first reference.
///
/// Called by the engine when a scanned resource has no registry entry.
/// Implementations must be idempotent. Errors abort the authorization call;
/// a resource that failed to load is never treated as an empty one.
pub trait ResourceLoader: Send + Sync {
    /// Make sure the rules of `resource` are in `registry`.
    fn ensure_loaded(&self, resource: &ResourceName, registry: &RuleRegistry) -> AuthzResult<()>;
}

/// Loader backed by a fixed table of [`ResourceRules`].
///
/// Resources missing from the table are left alone: no rules means deny.
///
/// ```
/// use authz_engine::StaticResourceLoader;
/// use authz_rules::{ConfigResult, Permit, ResourceRules, ResourceScope};
/// use std::sync::Arc;
///
/// struct Reports;
///
/// impl ResourceRules for Reports {
///     fn resource_name(&self) -> &str {
///         "reports"
///     }
///
///     fn permissions(&self, scope: &mut ResourceScope) -> ConfigResult<()> {
///         scope.permit(Permit::actions("index").to("all"))?;
///         Ok(())
///     }
/// }
///
/// let loader = StaticResourceLoader::new().with(Arc::new(Reports)).unwrap();
/// assert_eq!(loader.len(), 1);
/// ```
#[derive(Default)]
pub struct StaticResourceLoader {
    resources: HashMap<ResourceName, Arc<dyn ResourceRules>>,
}

impl fmt::Debug for StaticResourceLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.resources.keys().map(ResourceName::as_str).collect();
        names.sort_unstable();
        f.debug_struct("StaticResourceLoader")
            .field("resources", &names)
            .finish()
    }
}

impl StaticResourceLoader {
    /// Create an empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource's rules to the table.
    ///
    /// # Errors
    ///
    /// `AuthzError::Configuration` if the resource name is invalid.
    pub fn with(mut self, rules: Arc<dyn ResourceRules>) -> AuthzResult<Self> {
        let name = ResourceName::parse(rules.resource_name())?;
        self.resources.insert(name, rules);
        Ok(self)
    }

    /// Number of resources in the table.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl ResourceLoader for StaticResourceLoader {
    fn ensure_loaded(&self, resource: &ResourceName, registry: &RuleRegistry) -> AuthzResult<()> {
        let Some(rules) = self.resources.get(resource) else {
            return Ok(());
        };

        let installed = registry
            .install_if_absent(rules.as_ref())
            .map_err(|e| AuthzError::ResourceLoad {
                resource: resource.to_string(),
                message: e.to_string(),
            })?;
        if installed {
            tracing::debug!(target: "authz", "loaded rules for resource {}", resource);
        }
        Ok(())
    }
}
