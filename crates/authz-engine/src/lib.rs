//! Authorization decision engine
//!
//! Answers "may this principal perform this action on this resource?" from
//! the rules held in an [`authz_rules::RuleRegistry`].
//!
//! # Features
//!
//! - **Deny by default**: only a matching rule grants access
//! - **Wildcard and fallback**: `all` action rules and the `application`
//!   resource are consulted alongside the requested ones
//! - **Context adapter**: authorize a path like `/items/edit/17`
//! - **Lazy loading**: resources can be registered on first reference
//! - **Authorization log**: one line per decision step via `tracing`
//!
//! # Example
//!
//! ```
//! use authz_engine::{AuthorizationConfig, AuthorizationInput, Authorizer, Detached, RouteTable};
//! use authz_rules::{Permit, RuleRegistry};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(RuleRegistry::new());
//! registry.permit("reports", Permit::actions(["index", "show"]).to("all")).unwrap();
//!
//! let authorizer = Authorizer::new(registry, &AuthorizationConfig::default())
//!     .unwrap()
//!     .with_routes(Arc::new(RouteTable::conventional()));
//!
//! let input = AuthorizationInput::from("/reports/show/3");
//! assert!(authorizer.authorize_input(&Detached, &input).unwrap());
//! ```

pub mod adapter;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod host;
pub mod logging;

pub use adapter::{AuthorizationInput, ContextAdapter, ResolvedRoute, RouteResolver, RouteTable};
pub use config::AuthorizationConfig;
pub use context::{AuthorizeOptions, RequestContext};
pub use engine::Authorizer;
pub use error::{AuthzError, AuthzResult};
pub use host::{Detached, RequestHost, ResourceLoader, StaticResourceLoader};
pub use logging::{auth_log_layer, init_logging, AuthLogFormat, AuthLogLayer};
