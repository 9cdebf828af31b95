//! End-to-end tests for authorization decisions.
//!
//! A `dummy` resource is registered the way an application would declare it,
//! and requests are authorized through a host that behaves like a logged-in
//! controller:
//! 1. very_low_security: open to everyone
//! 2. high_security: role 3 only
//! 3. low_security_with_param: open, under a condition on `id`
//! 4. low_security_with_other_param: same condition, read from `other_id`
//! 5. nothing registered: denied

use authz_engine::{
    AuthorizationConfig, AuthorizationInput, AuthorizeOptions, Authorizer, AuthzError, Detached,
    RequestHost, ResourceLoader, RouteTable, StaticResourceLoader,
};
use authz_rules::{
    ConfigResult, Params, Permit, Principal, ResourceName, ResourceRules, ResourceScope, Role,
    RuleRegistry,
};
use serde_json::{json, Value};
use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// User whose role can change between requests.
struct DummyUser {
    role: Cell<Option<i64>>,
}

impl DummyUser {
    fn new(role: Option<i64>) -> Self {
        Self {
            role: Cell::new(role),
        }
    }
}

impl Principal for DummyUser {
    fn id(&self) -> String {
        "1".to_string()
    }

    fn role(&self) -> Option<Role> {
        self.role.get().map(Role::Id)
    }

    fn description(&self) -> String {
        "dummy user".to_string()
    }
}

/// Host for a logged-in request to the `dummy` resource.
struct DummyHost {
    user: DummyUser,
    logged_in: bool,
    action: Option<String>,
    params: Params,
}

impl DummyHost {
    fn new() -> Self {
        Self {
            user: DummyUser::new(None),
            logged_in: true,
            action: None,
            params: Params::new(),
        }
    }
}

impl RequestHost for DummyHost {
    fn logged_in(&self) -> Option<bool> {
        Some(self.logged_in)
    }

    fn current_user(&self) -> Option<&dyn Principal> {
        Some(&self.user)
    }

    fn current_resource_name(&self) -> Option<String> {
        Some("dummy".to_string())
    }

    fn current_action_name(&self) -> Option<String> {
        self.action.clone()
    }

    fn params(&self) -> Params {
        self.params.clone()
    }
}

struct DummyRules;

impl ResourceRules for DummyRules {
    fn resource_name(&self) -> &str {
        "dummy"
    }

    fn permissions(&self, scope: &mut ResourceScope) -> ConfigResult<()> {
        scope
            .permit(Permit::actions("very_low_security").to("all"))?
            .permit(Permit::actions("high_security").to(3))?
            .permit(Permit::actions("medium_security").to([2, 3]))?
            .permit(
                Permit::actions("low_security_with_param")
                    .to("all")
                    .when(is_object_id),
            )?
            .permit(
                Permit::actions("low_security_with_other_param")
                    .to("all")
                    .when(is_object_id)
                    .object_id("other_id"),
            )?;
        Ok(())
    }
}

fn is_object_id(_user: Option<&dyn Principal>, id: Option<&Value>) -> bool {
    id.and_then(Value::as_str) == Some("object_id")
}

/// Test fixture holding a registry with the `dummy` rules installed.
struct TestFixture {
    authorizer: Authorizer,
}

impl TestFixture {
    fn new() -> Self {
        let registry = Arc::new(RuleRegistry::new());
        registry.install(&DummyRules).unwrap();

        let config = AuthorizationConfig {
            relative_url_root: Some("/appname".to_string()),
            ..Default::default()
        };
        let authorizer = Authorizer::new(registry, &config)
            .unwrap()
            .with_routes(Arc::new(RouteTable::conventional()));

        Self { authorizer }
    }

    fn check(&self, host: &DummyHost, options: AuthorizeOptions<'_>) -> bool {
        self.authorizer.authorize(host, options).unwrap()
    }
}

#[test]
fn test_open_action_for_any_user() {
    let fixture = TestFixture::new();
    let host = DummyHost::new();

    assert!(fixture.check(&host, AuthorizeOptions::new().action("very_low_security")));

    let options = AuthorizeOptions::new()
        .resource("dummy")
        .action("very_low_security");
    assert!(fixture.authorizer.authorize(&Detached, options).unwrap());
}

#[test]
fn test_role_restricted_action() {
    let fixture = TestFixture::new();
    let host = DummyHost::new();

    assert!(!fixture.check(&host, AuthorizeOptions::new().action("high_security")));

    host.user.role.set(Some(3));
    assert!(fixture.check(&host, AuthorizeOptions::new().action("high_security")));
}

#[test]
fn test_action_granted_to_several_roles() {
    let fixture = TestFixture::new();
    let host = DummyHost::new();

    for (role, expected) in [(None, false), (Some(1), false), (Some(2), true), (Some(3), true)] {
        host.user.role.set(role);
        let granted = fixture.check(&host, AuthorizeOptions::new().action("medium_security"));
        assert_eq!(granted, expected, "role {:?}", role);
    }
}

#[test]
fn test_condition_on_default_id() {
    let fixture = TestFixture::new();
    let host = DummyHost::new();

    assert!(!fixture.check(&host, AuthorizeOptions::new().action("low_security_with_param")));
    assert!(fixture.check(
        &host,
        AuthorizeOptions::new()
            .action("low_security_with_param")
            .id("id", "object_id")
    ));
}

#[test]
fn test_condition_on_configured_id() {
    let fixture = TestFixture::new();
    let host = DummyHost::new();

    assert!(!fixture.check(
        &host,
        AuthorizeOptions::new()
            .action("low_security_with_other_param")
            .id("id", "object_id")
    ));
    assert!(fixture.check(
        &host,
        AuthorizeOptions::new()
            .action("low_security_with_other_param")
            .id("other_id", "object_id")
    ));
}

#[test]
fn test_unregistered_action_denied() {
    let fixture = TestFixture::new();
    let host = DummyHost::new();
    host.user.role.set(Some(3));

    assert!(!fixture.check(&host, AuthorizeOptions::new().action("no_rule")));
    assert!(!fixture.check(
        &host,
        AuthorizeOptions::new().resource("unknown").action("index")
    ));
}

#[test]
fn test_not_logged_in_denied() {
    let fixture = TestFixture::new();
    let mut host = DummyHost::new();
    host.logged_in = false;

    assert!(!fixture.check(&host, AuthorizeOptions::new().action("very_low_security")));
}

#[test]
fn test_action_name_normalized() {
    let fixture = TestFixture::new();
    let host = DummyHost::new();

    assert!(fixture.check(&host, AuthorizeOptions::new().action("Very_Low_Security")));
    assert!(fixture.check(&host, AuthorizeOptions::new().action(" very_low_security ")));
}

#[test]
fn test_malformed_action_is_error() {
    let fixture = TestFixture::new();
    let host = DummyHost::new();

    let err = fixture
        .authorizer
        .authorize(&host, AuthorizeOptions::new().action("very low"))
        .unwrap_err();
    assert!(matches!(err, AuthzError::Configuration(_)));
    assert_eq!(err.error_code(), "INVALID_ACTION");
}

#[test]
fn test_repeated_grants_are_union() {
    let registry = Arc::new(RuleRegistry::new());
    registry
        .permit("reports", Permit::actions("export").to(1))
        .unwrap();
    registry
        .permit("reports", Permit::actions("export").to(2))
        .unwrap();
    let authorizer = Authorizer::new(registry, &AuthorizationConfig::default()).unwrap();

    for role in [1, 2] {
        let user = DummyUser::new(Some(role));
        let options = AuthorizeOptions::new()
            .user(&user)
            .resource("reports")
            .action("export");
        assert!(authorizer.authorize(&Detached, options).unwrap());
    }

    let user = DummyUser::new(Some(3));
    let options = AuthorizeOptions::new()
        .user(&user)
        .resource("reports")
        .action("export");
    assert!(!authorizer.authorize(&Detached, options).unwrap());
}

#[test]
fn test_application_rules_apply_everywhere() {
    let registry = Arc::new(RuleRegistry::new());
    registry
        .permit("application", Permit::all_actions().to(1))
        .unwrap();
    let authorizer = Authorizer::new(registry, &AuthorizationConfig::default()).unwrap();

    let admin = DummyUser::new(Some(1));
    let options = AuthorizeOptions::new()
        .user(&admin)
        .resource("invoices")
        .action("destroy");
    assert!(authorizer.authorize(&Detached, options).unwrap());

    let clerk = DummyUser::new(Some(2));
    let options = AuthorizeOptions::new()
        .user(&clerk)
        .resource("invoices")
        .action("destroy");
    assert!(!authorizer.authorize(&Detached, options).unwrap());
}

#[test]
fn test_path_input() {
    let fixture = TestFixture::new();
    let host = DummyHost::new();

    let input = AuthorizationInput::from("/appname/dummy/very_low_security");
    assert!(fixture.authorizer.authorize_input(&host, &input).unwrap());

    let input = AuthorizationInput::from("/appname/dummy/low_security_with_param/object_id");
    assert!(fixture.authorizer.authorize_input(&host, &input).unwrap());

    let input = AuthorizationInput::from("/appname/dummy/low_security_with_param/other");
    assert!(!fixture.authorizer.authorize_input(&host, &input).unwrap());

    let input = AuthorizationInput::from("/dummy/high_security?format=json");
    assert!(!fixture.authorizer.authorize_input(&host, &input).unwrap());
}

#[test]
fn test_unresolvable_path() {
    let fixture = TestFixture::new();
    let host = DummyHost::new();

    let input = AuthorizationInput::from("/appname/a/b/c/d");
    let err = fixture.authorizer.authorize_input(&host, &input).unwrap_err();
    assert!(matches!(err, AuthzError::AmbiguousInput(_)));
    assert_eq!(err.status_code(), 404);
}

#[test]
fn test_if_authorized() {
    let fixture = TestFixture::new();
    let host = DummyHost::new();

    let input = AuthorizationInput::from(AuthorizeOptions::new().action("very_low_security"));
    let link = fixture
        .authorizer
        .if_authorized(&host, &input, |_, options| {
            format!("<a href=\"/dummy/{}\">", options.action.as_deref().unwrap_or_default())
        })
        .unwrap();
    assert_eq!(link.as_deref(), Some("<a href=\"/dummy/very_low_security\">"));

    let input = AuthorizationInput::from("/appname/dummy/very_low_security");
    let link = fixture
        .authorizer
        .if_authorized(&host, &input, |original, options| match original {
            AuthorizationInput::Path(path) => {
                assert_eq!(options.resource.as_deref(), Some("dummy"));
                format!("<a href=\"{}\">", path)
            }
            AuthorizationInput::Options(_) => String::new(),
        })
        .unwrap();
    assert_eq!(link.as_deref(), Some("<a href=\"/appname/dummy/very_low_security\">"));

    let input = AuthorizationInput::from("/appname/dummy/high_security");
    let link = fixture
        .authorizer
        .if_authorized(&host, &input, |_, _| "never")
        .unwrap();
    assert!(link.is_none());
}

#[test]
fn test_authorized_current_request() {
    let fixture = TestFixture::new();
    let mut host = DummyHost::new();
    host.action = Some("low_security_with_param".to_string());
    host.params.insert("id".to_string(), json!("object_id"));
    host.params.insert("format".to_string(), json!("html"));

    assert!(fixture.authorizer.authorized(&host).unwrap());

    host.params.insert("id".to_string(), json!("other"));
    assert!(!fixture.authorizer.authorized(&host).unwrap());

    host.action = None;
    assert!(matches!(
        fixture.authorizer.authorized(&host),
        Err(AuthzError::MissingAction)
    ));
}

/// Loader counting how often it is asked for a resource.
struct CountingLoader {
    inner: StaticResourceLoader,
    calls: AtomicUsize,
}

impl ResourceLoader for CountingLoader {
    fn ensure_loaded(
        &self,
        resource: &ResourceName,
        registry: &RuleRegistry,
    ) -> authz_engine::AuthzResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.ensure_loaded(resource, registry)
    }
}

#[test]
fn test_lazy_loading() {
    let registry = Arc::new(RuleRegistry::new());
    let loader = Arc::new(CountingLoader {
        inner: StaticResourceLoader::new().with(Arc::new(DummyRules)).unwrap(),
        calls: AtomicUsize::new(0),
    });
    let authorizer = Authorizer::new(registry.clone(), &AuthorizationConfig::default())
        .unwrap()
        .with_loader(loader.clone());

    let options = || {
        AuthorizeOptions::new()
            .resource("dummy")
            .action("very_low_security")
    };
    assert!(authorizer.authorize(&Detached, options()).unwrap());
    assert!(registry.has_resource(&ResourceName::parse("dummy").unwrap()));

    // dummy matched, so only dummy was loaded
    assert_eq!(loader.calls.load(Ordering::SeqCst), 1);

    assert!(authorizer.authorize(&Detached, options()).unwrap());
    assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
}

struct FailingLoader;

impl ResourceLoader for FailingLoader {
    fn ensure_loaded(
        &self,
        resource: &ResourceName,
        _registry: &RuleRegistry,
    ) -> authz_engine::AuthzResult<()> {
        Err(AuthzError::ResourceLoad {
            resource: resource.to_string(),
            message: "rule file unreadable".to_string(),
        })
    }
}

#[test]
fn test_loader_errors_propagate() {
    let registry = Arc::new(RuleRegistry::new());
    let authorizer = Authorizer::new(registry, &AuthorizationConfig::default())
        .unwrap()
        .with_loader(Arc::new(FailingLoader));

    let options = AuthorizeOptions::new().resource("dummy").action("index");
    let err = authorizer.authorize(&Detached, options).unwrap_err();
    assert!(matches!(err, AuthzError::ResourceLoad { ref resource, .. } if resource == "dummy"));
}
