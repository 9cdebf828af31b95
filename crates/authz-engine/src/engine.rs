//! Decision engine
//!
//! Deny by default: a request is granted only when some registered rule for
//! the requested resource (or the fallback resource) and action (or the
//! wildcard action) matches.

use authz_rules::{ActionName, ResourceName, Rule, RuleRegistry};
use std::fmt;
use std::sync::Arc;

use crate::adapter::{AuthorizationInput, ContextAdapter, RouteResolver, RouteTable};
use crate::config::AuthorizationConfig;
use crate::context::{id_params, AuthorizeOptions, RequestContext};
use crate::error::{AuthzError, AuthzResult};
use crate::host::{RequestHost, ResourceLoader};

/// Authorization decision engine.
///
/// # Example
///
/// ```
/// use authz_engine::{AuthorizationConfig, AuthorizeOptions, Authorizer, Detached};
/// use authz_rules::{Permit, RuleRegistry};
/// use std::sync::Arc;
///
/// let registry = Arc::new(RuleRegistry::new());
/// registry.permit("dummy", Permit::actions("show").to("all")).unwrap();
///
/// let authorizer = Authorizer::new(registry, &AuthorizationConfig::default()).unwrap();
///
/// let show = AuthorizeOptions::new().resource("dummy").action("show");
/// assert!(authorizer.authorize(&Detached, show).unwrap());
///
/// let edit = AuthorizeOptions::new().resource("dummy").action("edit");
/// assert!(!authorizer.authorize(&Detached, edit).unwrap());
/// ```
#[derive(Clone)]
pub struct Authorizer {
    registry: Arc<RuleRegistry>,
    fallback: ResourceName,
    adapter: ContextAdapter,
    loader: Option<Arc<dyn ResourceLoader>>,
}

impl fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authorizer")
            .field("registry", &self.registry)
            .field("fallback", &self.fallback)
            .field("adapter", &self.adapter)
            .field("loader", &self.loader.is_some())
            .finish()
    }
}

impl Authorizer {
    /// Create an engine over `registry`.
    ///
    /// Paths are resolved with an empty [`RouteTable`] until
    /// [`with_routes`](Self::with_routes) or
    /// [`with_adapter`](Self::with_adapter) is called.
    ///
    /// # Errors
    ///
    /// `AuthzError::Config` if the configuration is invalid.
    pub fn new(registry: Arc<RuleRegistry>, config: &AuthorizationConfig) -> AuthzResult<Self> {
        config.validate()?;

        Ok(Self {
            registry,
            fallback: config.fallback()?,
            adapter: ContextAdapter::from_config(config, Arc::new(RouteTable::new())),
            loader: None,
        })
    }

    /// Load resources on first reference with `loader`.
    pub fn with_loader(mut self, loader: Arc<dyn ResourceLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Resolve paths with `resolver`, keeping the relative URL root.
    pub fn with_routes(mut self, resolver: Arc<dyn RouteResolver>) -> Self {
        let adapter = ContextAdapter::new(resolver);
        self.adapter = match self.adapter.relative_url_root() {
            Some(root) => adapter.with_relative_url_root(Some(root.to_string())),
            None => adapter,
        };
        self
    }

    /// Replace the context adapter.
    pub fn with_adapter(mut self, adapter: ContextAdapter) -> Self {
        self.adapter = adapter;
        self
    }

    /// The registry rules are read from.
    pub fn registry(&self) -> &Arc<RuleRegistry> {
        &self.registry
    }

    /// The resource consulted after the requested one.
    pub fn fallback_resource(&self) -> &ResourceName {
        &self.fallback
    }

    /// Decide whether the request described by `options` is allowed.
    ///
    /// Missing user and resource are taken from `host`; the action must be
    /// given. Returns `Ok(false)` without consulting rules when the host
    /// reports the session as not logged in.
    ///
    /// # Errors
    ///
    /// - `AuthzError::MissingResource` / `AuthzError::MissingAction` if the
    ///   operation is not fully described
    /// - `AuthzError::Configuration` for malformed names
    /// - errors returned by the resource loader
    pub fn authorize<'a>(
        &self,
        host: &'a dyn RequestHost,
        options: AuthorizeOptions<'a>,
    ) -> AuthzResult<bool> {
        if host.logged_in() == Some(false) {
            tracing::info!(target: "authz", "returning false (not logged in)");
            return Ok(false);
        }

        let context = self.request_context(host, options)?;
        tracing::info!(target: "authz", "{}", context);

        let granted = self.evaluate(&context)?;
        if granted {
            tracing::info!(target: "authz", "returning true (access granted)");
        } else {
            tracing::info!(target: "authz", "returning false (access denied)");
        }
        Ok(granted)
    }

    /// Normalize `input` through the context adapter, then [`authorize`].
    ///
    /// [`authorize`]: Self::authorize
    pub fn authorize_input<'a>(
        &self,
        host: &'a dyn RequestHost,
        input: &AuthorizationInput<'a>,
    ) -> AuthzResult<bool> {
        let options = self.adapter.normalize(input)?;
        self.authorize(host, options)
    }

    /// Run `f` only if the request is allowed.
    ///
    /// `f` receives the caller's input as given (a path stays a path, e.g.
    /// for building a link) and the options it normalized to. Returns
    /// `Ok(None)` when denied.
    pub fn if_authorized<'a, T, F>(
        &self,
        host: &'a dyn RequestHost,
        input: &AuthorizationInput<'a>,
        f: F,
    ) -> AuthzResult<Option<T>>
    where
        F: FnOnce(&AuthorizationInput<'a>, &AuthorizeOptions<'a>) -> T,
    {
        let options = self.adapter.normalize(input)?;
        if self.authorize(host, options.clone())? {
            Ok(Some(f(input, &options)))
        } else {
            Ok(None)
        }
    }

    /// Check the host's current request: its resource and action, with the
    /// identifier parameters of `host.params()`.
    pub fn authorized(&self, host: &dyn RequestHost) -> AuthzResult<bool> {
        let options = AuthorizeOptions {
            user: None,
            resource: host.current_resource_name(),
            action: host.current_action_name(),
            ids: id_params(&host.params()),
            params: Default::default(),
        };
        self.authorize(host, options)
    }

    fn request_context<'a>(
        &self,
        host: &'a dyn RequestHost,
        options: AuthorizeOptions<'a>,
    ) -> AuthzResult<RequestContext<'a>> {
        let AuthorizeOptions {
            user,
            resource,
            action,
            ids,
            params,
        } = options;

        let user = user.or_else(|| host.current_user());
        let resource = resource
            .or_else(|| host.current_resource_name())
            .ok_or(AuthzError::MissingResource)?;
        let action = action.ok_or(AuthzError::MissingAction)?;

        let mut context = RequestContext::new(
            user,
            ResourceName::parse(&resource)?,
            ActionName::parse(&action)?,
            ids,
        );
        context.merge_id_params(params);
        Ok(context)
    }

    fn evaluate(&self, context: &RequestContext<'_>) -> AuthzResult<bool> {
        let mut resources = vec![&context.resource];
        if context.resource != self.fallback {
            resources.push(&self.fallback);
        }

        let mut actions = vec![ActionName::all()];
        if !context.action.is_wildcard() {
            actions.push(context.action.clone());
        }

        for resource in resources {
            tracing::debug!(target: "authz", "current resource: {}", resource);
            self.ensure_loaded(resource)?;

            for action in &actions {
                tracing::debug!(target: "authz", "current action: {}", action);
                let Some(rules) = self.registry.rules_for(resource, action) else {
                    continue;
                };
                if first_match(&rules, context).is_some() {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn ensure_loaded(&self, resource: &ResourceName) -> AuthzResult<()> {
        match &self.loader {
            Some(loader) if !self.registry.has_resource(resource) => {
                loader.ensure_loaded(resource, &self.registry)
            }
            _ => Ok(()),
        }
    }
}

fn first_match<'r>(rules: &'r [Arc<Rule>], context: &RequestContext<'_>) -> Option<&'r Rule> {
    rules
        .iter()
        .map(Arc::as_ref)
        .find(|rule| rule.matches(context.user, &context.ids))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Detached;
    use authz_rules::{Permit, Principal, Role};
    use serde_json::Value;

    struct TestUser(Option<i64>);

    impl Principal for TestUser {
        fn id(&self) -> String {
            "1".to_string()
        }

        fn role(&self) -> Option<Role> {
            self.0.map(Role::Id)
        }

        fn description(&self) -> String {
            "test user".to_string()
        }
    }

    struct LoggedOut;

    impl RequestHost for LoggedOut {
        fn logged_in(&self) -> Option<bool> {
            Some(false)
        }
    }

    fn authorizer() -> Authorizer {
        let registry = Arc::new(RuleRegistry::new());
        registry
            .permit("dummy", Permit::actions("high_security").to(3))
            .unwrap();
        registry
            .permit("dummy", Permit::actions("index").to("all"))
            .unwrap();
        registry
            .permit("admin", Permit::all_actions().to(1))
            .unwrap();
        registry
            .permit("application", Permit::actions("ping").to("all"))
            .unwrap();
        Authorizer::new(registry, &AuthorizationConfig::default()).unwrap()
    }

    #[test]
    fn test_role_requirement() {
        fn options(user: &dyn Principal) -> AuthorizeOptions<'_> {
            AuthorizeOptions::new()
                .user(user)
                .resource("dummy")
                .action("high_security")
        }

        let authorizer = authorizer();
        let (none, two, three) = (TestUser(None), TestUser(Some(2)), TestUser(Some(3)));
        assert!(!authorizer.authorize(&Detached, options(&none)).unwrap());
        assert!(!authorizer.authorize(&Detached, options(&two)).unwrap());
        assert!(authorizer.authorize(&Detached, options(&three)).unwrap());
    }

    #[test]
    fn test_logged_out_short_circuits() {
        let authorizer = authorizer();
        let options = AuthorizeOptions::new().resource("dummy").action("index");
        assert!(!authorizer.authorize(&LoggedOut, options).unwrap());

        // Missing action would otherwise be an error.
        assert!(!authorizer
            .authorize(&LoggedOut, AuthorizeOptions::new())
            .unwrap());
    }

    #[test]
    fn test_wildcard_action() {
        let authorizer = authorizer();
        let admin = TestUser(Some(1));
        for action in ["index", "destroy", "all"] {
            let options = AuthorizeOptions::new()
                .user(&admin)
                .resource("admin")
                .action(action);
            assert!(authorizer.authorize(&Detached, options).unwrap());
        }
    }

    #[test]
    fn test_fallback_resource() {
        let authorizer = authorizer();
        let options = AuthorizeOptions::new().resource("dummy").action("ping");
        assert!(authorizer.authorize(&Detached, options).unwrap());

        let options = AuthorizeOptions::new().resource("application").action("ping");
        assert!(authorizer.authorize(&Detached, options).unwrap());
    }

    #[test]
    fn test_missing_parts() {
        let authorizer = authorizer();

        let err = authorizer
            .authorize(&Detached, AuthorizeOptions::new().action("index"))
            .unwrap_err();
        assert!(matches!(err, AuthzError::MissingResource));

        let err = authorizer
            .authorize(&Detached, AuthorizeOptions::new().resource("dummy"))
            .unwrap_err();
        assert!(matches!(err, AuthzError::MissingAction));

        let err = authorizer
            .authorize(
                &Detached,
                AuthorizeOptions::new().resource("dummy").action("not valid"),
            )
            .unwrap_err();
        assert!(matches!(err, AuthzError::Configuration(_)));
    }

    #[test]
    fn test_ids_from_params() {
        let registry = Arc::new(RuleRegistry::new());
        registry
            .permit(
                "items",
                Permit::actions("edit")
                    .to("all")
                    .when(|_, id: Option<&Value>| id.and_then(Value::as_str) == Some("7")),
            )
            .unwrap();
        let authorizer = Authorizer::new(registry, &AuthorizationConfig::default()).unwrap();

        let options = AuthorizeOptions::new()
            .resource("items")
            .action("edit")
            .param("id", "7");
        assert!(authorizer.authorize(&Detached, options).unwrap());

        let options = AuthorizeOptions::new()
            .resource("items")
            .action("edit")
            .id("id", "8")
            .param("id", "7");
        assert!(!authorizer.authorize(&Detached, options).unwrap());
    }

    #[test]
    fn test_configured_fallback_and_adapter() {
        let config = AuthorizationConfig {
            fallback_resource: "Base".to_string(),
            ..Default::default()
        };
        let registry = Arc::new(RuleRegistry::new());
        let routes = RouteTable::new().route_to("/home", "pages", "home");
        let adapter = ContextAdapter::new(Arc::new(routes))
            .with_relative_url_root(Some("/app".to_string()));
        let authorizer = Authorizer::new(registry.clone(), &config)
            .unwrap()
            .with_adapter(adapter);

        assert!(Arc::ptr_eq(authorizer.registry(), &registry));
        assert_eq!(authorizer.fallback_resource().as_str(), "base");

        let home = AuthorizationInput::from("/app/home");
        assert!(!authorizer.authorize_input(&Detached, &home).unwrap());

        authorizer
            .registry()
            .permit("base", Permit::actions("home").to("all"))
            .unwrap();
        assert!(authorizer.authorize_input(&Detached, &home).unwrap());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = AuthorizationConfig {
            fallback_resource: String::new(),
            ..Default::default()
        };
        let err = Authorizer::new(Arc::new(RuleRegistry::new()), &config).unwrap_err();
        assert!(matches!(err, AuthzError::Config { .. }));
    }
}
