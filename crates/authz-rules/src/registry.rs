//! # Rule Registry
//!
//! Process-wide store of rules keyed by resource and action, and the
//! `permit` DSL that fills it.
//!
//! ```text
//! registry[resource][action] = [rule, rule, ...]   (declaration order)
//! registry[resource]["all"]  = rules applying to every action
//! ```
//!
//! Registration normally happens once at startup, either directly through
//! [`RuleRegistry::permit`] or per resource through [`ResourceRules`]. The
//! registry only ever grows; nothing is removed or replaced.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{ConfigResult, ConfigurationError};
use crate::identifiers::{json_type_name, normalize_name, ActionName, ResourceName};
use crate::roles::Roles;
use crate::rule::{Condition, Principal, Rule};

/// Actions named in a `permit` declaration.
///
/// # Example
///
/// ```
/// use authz_rules::Actions;
///
/// assert_eq!(Actions::from("all"), Actions::All);
/// assert_eq!(
///     Actions::from(["edit", "update"]),
///     Actions::Named(vec!["edit".to_string(), "update".to_string()])
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actions {
    /// Every action of the resource
    All,

    /// The listed actions (normalized at registration)
    Named(Vec<String>),
}

impl Actions {
    /// Normalize into registry keys.
    fn normalize(&self) -> ConfigResult<Vec<ActionName>> {
        match self {
            Actions::All => Ok(vec![ActionName::all()]),
            Actions::Named(names) if names.is_empty() => {
                Err(ConfigurationError::InvalidAction(String::new()))
            }
            Actions::Named(names) => names.iter().map(|name| ActionName::parse(name)).collect(),
        }
    }
}

impl fmt::Display for Actions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actions::All => f.write_str(ActionName::WILDCARD),
            Actions::Named(names) => f.write_str(&names.join(",")),
        }
    }
}

impl From<&str> for Actions {
    fn from(name: &str) -> Self {
        if normalize_name(name) == ActionName::WILDCARD {
            Actions::All
        } else {
            Actions::Named(vec![name.to_string()])
        }
    }
}

impl From<String> for Actions {
    fn from(name: String) -> Self {
        Actions::from(name.as_str())
    }
}

impl From<Vec<String>> for Actions {
    fn from(names: Vec<String>) -> Self {
        Actions::Named(names)
    }
}

impl From<Vec<&str>> for Actions {
    fn from(names: Vec<&str>) -> Self {
        Actions::Named(names.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Actions {
    fn from(names: [&str; N]) -> Self {
        Actions::Named(names.iter().map(|s| s.to_string()).collect())
    }
}

/// Action lists read from declarative tables: a string or an array of
/// strings.
impl TryFrom<&Value> for Actions {
    type Error = ConfigurationError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(name) => Ok(Actions::from(name.as_str())),
            Value::Array(items) => items
                .iter()
                .map(|item| ActionName::try_from(item).map(String::from))
                .collect::<ConfigResult<Vec<_>>>()
                .map(Actions::Named),
            other => Err(ConfigurationError::ActionType(json_type_name(other).to_string())),
        }
    }
}

/// A `permit` declaration under construction.
///
/// # Example
///
/// ```
/// use authz_rules::{Permit, RuleRegistry};
///
/// let registry = RuleRegistry::new();
/// registry
///     .permit(
///         "products",
///         Permit::actions(["edit", "update"])
///             .to([2, 3])
///             .when(|user, object| user.is_some() && object.is_some())
///             .object_id("product_id"),
///     )
///     .unwrap();
///
/// assert_eq!(registry.rule_count(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Permit {
    actions: Actions,
    roles: Option<Roles>,
    condition: Option<Condition>,
    object_id: Option<String>,
    resource: Option<String>,
}

impl Permit {
    /// Start a declaration for the given actions.
    pub fn actions(actions: impl Into<Actions>) -> Self {
        Self {
            actions: actions.into(),
            roles: None,
            condition: None,
            object_id: None,
            resource: None,
        }
    }

    /// Start a declaration covering every action.
    pub fn all_actions() -> Self {
        Self::actions(Actions::All)
    }

    /// Roles granted access.
    pub fn to(mut self, roles: impl Into<Roles>) -> Self {
        self.roles = Some(roles.into());
        self
    }

    /// Runtime check receiving the user and the object id parameter.
    pub fn when<F>(self, condition: F) -> Self
    where
        F: Fn(Option<&dyn Principal>, Option<&Value>) -> bool + Send + Sync + 'static,
    {
        self.condition(Condition::new(condition))
    }

    /// Runtime check, already wrapped.
    pub fn condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Parameter passed to the condition instead of `id`.
    pub fn object_id(mut self, key: impl Into<String>) -> Self {
        self.object_id = Some(key.into());
        self
    }

    /// Register under another resource than the declaring one.
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Validate and expand into one rule per action.
    fn into_entries(self, declaring: &ResourceName) -> ConfigResult<Vec<Entry>> {
        let resource = match &self.resource {
            Some(name) => ResourceName::parse(name)?,
            None => declaring.clone(),
        };
        let actions = self.actions.normalize()?;
        let roles = self
            .roles
            .ok_or_else(|| ConfigurationError::MissingRoles(self.actions.to_string()))?;

        actions
            .into_iter()
            .map(|action| {
                let rule = Rule::new(roles.clone(), self.condition.clone(), self.object_id.clone())?;
                Ok(Entry {
                    resource: resource.clone(),
                    action,
                    rule: Arc::new(rule),
                })
            })
            .collect()
    }
}

/// Serializable form of a `permit` declaration, for rule tables kept in
/// configuration files. Conditions cannot be expressed this way.
///
/// ```
/// use authz_rules::{PermitDeclaration, RuleRegistry};
///
/// let table: Vec<PermitDeclaration> = serde_json::from_str(
///     r#"[{"actions": ["index", "show"], "to": "all"},
///         {"actions": "destroy", "to": [3]}]"#,
/// )
/// .unwrap();
///
/// let registry = RuleRegistry::new();
/// registry.load_declarations("items", table).unwrap();
/// assert_eq!(registry.rule_count(), 3);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermitDeclaration {
    /// Resource override; the declaring resource when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,

    /// Action name, list of action names, or `"all"`
    pub actions: Value,

    /// Roles granted access: `"all"`, `{"only": [..]}`, one role or a list
    pub to: Roles,

    /// Parameter passed to the condition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
}

impl TryFrom<PermitDeclaration> for Permit {
    type Error = ConfigurationError;

    fn try_from(decl: PermitDeclaration) -> Result<Self, Self::Error> {
        let mut permit = Permit::actions(Actions::try_from(&decl.actions)?).to(decl.to);
        permit.object_id = decl.object_id;
        permit.resource = decl.resource;
        Ok(permit)
    }
}

#[derive(Debug)]
struct Entry {
    resource: ResourceName,
    action: ActionName,
    rule: Arc<Rule>,
}

/// Staging area for the declarations of one resource.
///
/// Rules permitted here become visible only when the scope is committed by
/// the registry, all at once.
#[derive(Debug)]
pub struct ResourceScope {
    resource: ResourceName,
    staged: Vec<Entry>,
}

impl ResourceScope {
    /// Create an empty scope for a resource.
    pub fn new(resource: ResourceName) -> Self {
        Self {
            resource,
            staged: Vec::new(),
        }
    }

    /// The declaring resource.
    pub fn resource(&self) -> &ResourceName {
        &self.resource
    }

    /// Add a declaration. Nothing is staged if any part of it is invalid.
    pub fn permit(&mut self, permit: Permit) -> ConfigResult<&mut Self> {
        let entries = permit.into_entries(&self.resource)?;
        self.staged.extend(entries);
        Ok(self)
    }

    /// Number of staged rules.
    pub fn len(&self) -> usize {
        self.staged.len()
    }

    /// Check if nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }
}

/// Rules of one resource, declared in code.
///
/// Each protected resource implements this once; the host installs all of
/// them at startup with [`RuleRegistry::install`].
///
/// ```
/// use authz_rules::{ConfigResult, Permit, ResourceRules, ResourceScope, RuleRegistry};
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
///         scope.permit(Permit::all_actions().to(3))?;
///         Ok(())
///     }
/// }
///
/// let registry = RuleRegistry::new();
/// registry.install(&Reports).unwrap();
/// assert_eq!(registry.rule_count(), 2);
/// ```
pub trait ResourceRules: Send + Sync {
    /// Name of the declaring resource.
    fn resource_name(&self) -> &str;

    /// Declare the resource's rules.
    fn permissions(&self, scope: &mut ResourceScope) -> ConfigResult<()>;
}

type ActionRules = HashMap<ActionName, Vec<Arc<Rule>>>;

/// Shared rule store.
///
/// Reads take a shared lock only long enough to clone the `Arc`s of one
/// bucket, so rule conditions never run while the lock is held.
#[derive(Default)]
pub struct RuleRegistry {
    rules: RwLock<HashMap<ResourceName, ActionRules>>,
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rules = self.rules.read();
        f.debug_struct("RuleRegistry")
            .field("resources", &rules.len())
            .field("rules", &rules.values().flat_map(|a| a.values()).map(Vec::len).sum::<usize>())
            .finish()
    }
}

impl RuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single declaration on behalf of `resource`.
    ///
    /// # Errors
    ///
    /// `ConfigurationError` for malformed resource or action names and
    /// missing or empty roles. Nothing is registered in that case.
    pub fn permit(&self, resource: &str, permit: Permit) -> ConfigResult<()> {
        let mut scope = ResourceScope::new(ResourceName::parse(resource)?);
        scope.permit(permit)?;
        self.commit(scope);
        Ok(())
    }

    /// Register several declarations of `resource` at once.
    pub fn define<F>(&self, resource: &str, declare: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut ResourceScope) -> ConfigResult<()>,
    {
        let mut scope = ResourceScope::new(ResourceName::parse(resource)?);
        declare(&mut scope)?;
        self.commit(scope);
        Ok(())
    }

    /// Register declarations read from a rule table.
    pub fn load_declarations<I>(&self, resource: &str, declarations: I) -> ConfigResult<()>
    where
        I: IntoIterator<Item = PermitDeclaration>,
    {
        self.define(resource, |scope| {
            for declaration in declarations {
                scope.permit(Permit::try_from(declaration)?)?;
            }
            Ok(())
        })
    }

    /// Register a resource's rules.
    pub fn install(&self, rules: &dyn ResourceRules) -> ConfigResult<()> {
        let scope = Self::stage(rules)?;
        self.commit(scope);
        Ok(())
    }

    /// Register a resource's rules unless the resource already has an entry.
    ///
    /// # Returns
    ///
    /// `true` if the rules were installed by this call.
    pub fn install_if_absent(&self, rules: &dyn ResourceRules) -> ConfigResult<bool> {
        let resource = ResourceName::parse(rules.resource_name())?;
        if self.has_resource(&resource) {
            return Ok(false);
        }

        let scope = Self::stage(rules)?;
        let mut guard = self.rules.write();
        if guard.contains_key(&resource) {
            return Ok(false);
        }
        Self::insert_all(&mut guard, scope);
        // a resource declaring nothing still counts as loaded
        guard.entry(resource).or_default();
        Ok(true)
    }

    fn stage(rules: &dyn ResourceRules) -> ConfigResult<ResourceScope> {
        let mut scope = ResourceScope::new(ResourceName::parse(rules.resource_name())?);
        rules.permissions(&mut scope)?;
        Ok(scope)
    }

    fn commit(&self, scope: ResourceScope) {
        let mut guard = self.rules.write();
        Self::insert_all(&mut guard, scope);
    }

    fn insert_all(rules: &mut HashMap<ResourceName, ActionRules>, scope: ResourceScope) {
        for entry in scope.staged {
            tracing::trace!(
                target: "authz",
                resource = %entry.resource,
                action = %entry.action,
                "registered {}",
                entry.rule
            );
            rules
                .entry(entry.resource)
                .or_default()
                .entry(entry.action)
                .or_default()
                .push(entry.rule);
        }
    }

    /// Check if any rule was ever registered for a resource.
    pub fn has_resource(&self, resource: &ResourceName) -> bool {
        self.rules.read().contains_key(resource)
    }

    /// Rules of one resource/action bucket, in declaration order.
    pub fn rules_for(&self, resource: &ResourceName, action: &ActionName) -> Option<Vec<Arc<Rule>>> {
        self.rules
            .read()
            .get(resource)
            .and_then(|actions| actions.get(action))
            .cloned()
    }

    /// Actions with at least one rule on a resource, sorted.
    pub fn actions_for(&self, resource: &ResourceName) -> Vec<ActionName> {
        let mut actions: Vec<ActionName> = self
            .rules
            .read()
            .get(resource)
            .map(|actions| actions.keys().cloned().collect())
            .unwrap_or_default();
        actions.sort();
        actions
    }

    /// Resources with an entry, sorted.
    pub fn resources(&self) -> Vec<ResourceName> {
        let mut resources: Vec<ResourceName> = self.rules.read().keys().cloned().collect();
        resources.sort();
        resources
    }

    /// Total number of rules.
    pub fn rule_count(&self) -> usize {
        self.rules
            .read()
            .values()
            .flat_map(|actions| actions.values())
            .map(Vec::len)
            .sum()
    }
}
