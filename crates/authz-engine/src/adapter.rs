//! Context adapter
//!
//! Callers may describe the operation to authorize either as options or as a
//! path (`/items/edit/17`). Paths are resolved to a resource, an action and
//! path parameters by a [`RouteResolver`] before the engine sees them.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::config::AuthorizationConfig;
use crate::context::{AuthorizeOptions, Params};
use crate::error::{AuthzError, AuthzResult};

/// Input accepted by [`ContextAdapter::normalize`].
#[derive(Debug, Clone)]
pub enum AuthorizationInput<'a> {
    /// Explicit options
    Options(AuthorizeOptions<'a>),

    /// A path to resolve through the route table
    Path(String),
}

impl<'a> From<AuthorizeOptions<'a>> for AuthorizationInput<'a> {
    fn from(options: AuthorizeOptions<'a>) -> Self {
        AuthorizationInput::Options(options)
    }
}

impl From<&str> for AuthorizationInput<'_> {
    fn from(path: &str) -> Self {
        AuthorizationInput::Path(path.to_string())
    }
}

impl From<String> for AuthorizationInput<'_> {
    fn from(path: String) -> Self {
        AuthorizationInput::Path(path)
    }
}

/// A path resolved to the operation it dispatches to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRoute {
    /// Resource handling the path
    pub resource: String,

    /// Action handling the path
    pub action: String,

    /// Parameters captured from the path
    pub params: Params,
}

/// Resolves paths to routes. Provided by the host framework, or use
/// [`RouteTable`].
pub trait RouteResolver: Send + Sync {
    /// Resolve a path (already stripped of the relative URL root).
    fn resolve_path(&self, path: &str) -> Option<ResolvedRoute>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

#[derive(Debug, Clone)]
struct Route {
    segments: Vec<Segment>,
    resource: Option<String>,
    action: Option<String>,
}

impl Route {
    fn parse(pattern: &str, resource: Option<&str>, action: Option<&str>) -> Self {
        let segments = path_segments(pattern)
            .map(|segment| match segment.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(segment.to_string()),
            })
            .collect();

        Self {
            segments,
            resource: resource.map(str::to_string),
            action: action.map(str::to_string),
        }
    }

    fn resolve(&self, segments: &[&str]) -> Option<ResolvedRoute> {
        if segments.len() != self.segments.len() {
            return None;
        }

        let mut resource = self.resource.clone();
        let mut action = self.action.clone();
        let mut params = Params::new();

        for (pattern, segment) in self.segments.iter().zip(segments) {
            match pattern {
                Segment::Literal(literal) if literal == segment => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) if name == RouteTable::RESOURCE => {
                    resource = Some(segment.to_string());
                }
                Segment::Param(name) if name == RouteTable::ACTION => {
                    action = Some(segment.to_string());
                }
                Segment::Param(name) => {
                    params.insert(name.clone(), Value::String(segment.to_string()));
                }
            }
        }

        Some(ResolvedRoute {
            resource: resource?,
            action: action?,
            params,
        })
    }
}

/// Non-empty `/`-separated segments of a path, query and fragment dropped.
fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    path.split('/').filter(|s| !s.is_empty())
}

/// Ordered list of path patterns; the first matching pattern wins.
///
/// Patterns are `/`-separated segments; `:name` captures a segment.
/// `:resource` and `:action` capture the operation itself, any other
/// capture becomes a parameter.
///
/// # Example
///
/// ```
/// use authz_engine::{RouteResolver, RouteTable};
/// use serde_json::json;
///
/// let routes = RouteTable::new()
///     .route_to("/items/:id/edit", "items", "edit")
///     .route("/:resource/:action/:id");
///
/// let route = routes.resolve_path("/items/17/edit").unwrap();
/// assert_eq!(route.resource, "items");
/// assert_eq!(route.action, "edit");
/// assert_eq!(route.params.get("id"), Some(&json!("17")));
///
/// let route = routes.resolve_path("/dummy/show/3?page=2").unwrap();
/// assert_eq!(route.resource, "dummy");
/// assert_eq!(route.action, "show");
/// ```
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Capture name for the resource segment.
    pub const RESOURCE: &'static str = "resource";

    /// Capture name for the action segment.
    pub const ACTION: &'static str = "action";

    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Conventional routes: `/:resource/:action/:id`, `/:resource/:action`
    /// and `/:resource` (the `index` action).
    pub fn conventional() -> Self {
        Self::new()
            .route("/:resource/:action/:id")
            .route("/:resource/:action")
            .route_with_action("/:resource", "index")
    }

    /// Add a pattern capturing both `:resource` and `:action`.
    pub fn route(mut self, pattern: &str) -> Self {
        self.routes.push(Route::parse(pattern, None, None));
        self
    }

    /// Add a pattern dispatching to a fixed resource and action.
    pub fn route_to(mut self, pattern: &str, resource: &str, action: &str) -> Self {
        self.routes
            .push(Route::parse(pattern, Some(resource), Some(action)));
        self
    }

    /// Add a pattern capturing `:resource`, with a fixed action.
    pub fn route_with_action(mut self, pattern: &str, action: &str) -> Self {
        self.routes.push(Route::parse(pattern, None, Some(action)));
        self
    }

    /// Number of routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Check if the table has no routes.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl RouteResolver for RouteTable {
    fn resolve_path(&self, path: &str) -> Option<ResolvedRoute> {
        let segments: Vec<&str> = path_segments(path).collect();
        self.routes.iter().find_map(|route| route.resolve(&segments))
    }
}

/// Turns [`AuthorizationInput`] into [`AuthorizeOptions`].
#[derive(Clone)]
pub struct ContextAdapter {
    resolver: Arc<dyn RouteResolver>,
    relative_url_root: Option<String>,
}

impl fmt::Debug for ContextAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextAdapter")
            .field("relative_url_root", &self.relative_url_root)
            .finish()
    }
}

impl ContextAdapter {
    /// Create an adapter resolving paths with `resolver`.
    pub fn new(resolver: Arc<dyn RouteResolver>) -> Self {
        Self {
            resolver,
            relative_url_root: None,
        }
    }

    /// Create an adapter using the configured relative URL root.
    pub fn from_config(config: &AuthorizationConfig, resolver: Arc<dyn RouteResolver>) -> Self {
        Self::new(resolver).with_relative_url_root(config.relative_url_root.clone())
    }

    /// Set the path prefix stripped before resolution.
    pub fn with_relative_url_root(mut self, root: Option<String>) -> Self {
        self.relative_url_root = root
            .map(|r| r.trim_end_matches('/').to_string())
            .filter(|r| !r.is_empty());
        self
    }

    /// The configured relative URL root, without trailing slash.
    pub fn relative_url_root(&self) -> Option<&str> {
        self.relative_url_root.as_deref()
    }

    /// Remove the relative URL root from the start of `path`.
    ///
    /// The root is only removed as whole leading segments: with root
    /// `/app`, `/app/items` becomes `/items` but `/apple` is unchanged.
    pub fn strip_root<'p>(&self, path: &'p str) -> &'p str {
        let Some(root) = &self.relative_url_root else {
            return path;
        };
        match path.strip_prefix(root.as_str()) {
            Some(rest) if rest.is_empty() => "/",
            Some(rest) if rest.starts_with(['/', '?', '#']) => rest,
            _ => path,
        }
    }

    /// Normalize input into options.
    ///
    /// Options are copied as they are. Paths are stripped of the relative
    /// URL root and resolved; their captured parameters become top-level
    /// parameters.
    ///
    /// # Errors
    ///
    /// `AuthzError::AmbiguousInput` if the path matches no route.
    pub fn normalize<'a>(&self, input: &AuthorizationInput<'a>) -> AuthzResult<AuthorizeOptions<'a>> {
        match input {
            AuthorizationInput::Options(options) => Ok(options.clone()),
            AuthorizationInput::Path(path) => {
                let stripped = self.strip_root(path);
                let route = self
                    .resolver
                    .resolve_path(stripped)
                    .ok_or_else(|| AuthzError::AmbiguousInput(path.clone()))?;

                tracing::debug!(
                    target: "authz",
                    "path {} resolved to {}:{}",
                    path,
                    route.resource,
                    route.action
                );

                Ok(AuthorizeOptions {
                    user: None,
                    resource: Some(route.resource),
                    action: Some(route.action),
                    ids: Params::new(),
                    params: route.params,
                })
            }
        }
    }
}
