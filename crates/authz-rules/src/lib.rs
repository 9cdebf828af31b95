//! # Authorization Rules
//!
//! Rule model and registry for role-based authorization of
//! controller/action style requests.
//!
//! ## Overview
//!
//! The authz-rules crate handles:
//! - **Identifiers**: Validated, normalized resource and action names
//! - **Roles**: Opaque role values and the `all` sentinel
//! - **Rules**: Roles + optional runtime condition + object id parameter
//! - **Registry**: Rules per resource and action, filled by `permit`
//!
//! ## Architecture
//!
//! ```text
//! Rule = Roles [+ Condition(user, params[object_id])]
//!
//! registry["products"]["all"]  -> [rule]          every action
//! registry["products"]["edit"] -> [rule, rule]    first match wins
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use authz_rules::{ActionName, Params, Permit, ResourceName, RuleRegistry};
//! use serde_json::json;
//!
//! let registry = RuleRegistry::new();
//!
//! // Everyone may look
//! registry.permit("products", Permit::actions(["index", "show"]).to("all")).unwrap();
//!
//! // Role 2 may edit, but only product 17
//! registry
//!     .permit(
//!         "products",
//!         Permit::actions("edit")
//!             .to(2)
//!             .when(|_user, id| id == Some(&json!("17"))),
//!     )
//!     .unwrap();
//!
//! let products = ResourceName::parse("products").unwrap();
//! let rules = registry
//!     .rules_for(&products, &ActionName::parse("show").unwrap())
//!     .unwrap();
//! assert!(rules[0].matches(None, &Params::new()));
//! ```
//!
//! Deciding a whole request (scanning wildcard and fallback buckets, login
//! checks, logging) is the job of the `authz-engine` crate.

pub mod error;
pub mod identifiers;
pub mod registry;
pub mod roles;
pub mod rule;

// Re-export main types for convenience
pub use error::{ConfigResult, ConfigurationError};
pub use identifiers::{ActionName, ResourceName};
pub use registry::{Actions, Permit, PermitDeclaration, ResourceRules, ResourceScope, RuleRegistry};
pub use roles::{Role, Roles};
pub use rule::{Condition, Params, Principal, Rule};
