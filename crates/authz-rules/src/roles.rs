//! Roles
//!
//! Roles are opaque to the rule engine: they are only compared for equality.
//! Applications typically use small integers (`1`, `4`, constants such as
//! `ROOT`) or names.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A principal's authorization level.
///
/// Comparison is exact: `Role::Id(3)` and `Role::Name("3")` are different
/// roles.
///
/// # Examples
///
/// ```
/// use authz_rules::Role;
///
/// assert_eq!(Role::from(3), Role::Id(3));
/// assert_eq!(Role::from("admin"), Role::Name("admin".to_string()));
/// assert_ne!(Role::from(3), Role::from("3"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Role {
    /// Numeric role
    Id(i64),

    /// Named role
    Name(String),
}

impl Role {
    /// Whether this role is the `all` marker used in role lists.
    fn is_wildcard(&self) -> bool {
        matches!(self, Role::Name(name) if name.eq_ignore_ascii_case("all"))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Id(id) => write!(f, "{}", id),
            Role::Name(name) => f.write_str(name),
        }
    }
}

impl From<i64> for Role {
    fn from(id: i64) -> Self {
        Role::Id(id)
    }
}

impl From<i32> for Role {
    fn from(id: i32) -> Self {
        Role::Id(i64::from(id))
    }
}

impl From<&str> for Role {
    fn from(name: &str) -> Self {
        Role::Name(name.to_string())
    }
}

impl From<String> for Role {
    fn from(name: String) -> Self {
        Role::Name(name)
    }
}

/// The roles a rule grants access to.
///
/// Either every role (including unauthenticated requests) or an ordered list
/// of specific roles. A list containing the `"all"` role collapses to
/// [`Roles::All`].
///
/// # Examples
///
/// ```
/// use authz_rules::{Role, Roles};
///
/// let roles = Roles::from([2, 3]);
/// assert!(roles.contains(&Role::Id(2)));
/// assert!(!roles.contains(&Role::Id(1)));
///
/// assert_eq!(Roles::from("all"), Roles::All);
/// assert!(Roles::All.contains(&Role::Id(1)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "RolesRepr")]
pub enum Roles {
    /// Any role, and no role at all
    All,

    /// Only the listed roles, in declaration order
    Only(Vec<Role>),
}

impl Roles {
    /// Build from a role list, collapsing to `All` if it holds the `all` role.
    pub fn from_list<I>(roles: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Role>,
    {
        let roles: Vec<Role> = roles.into_iter().map(Into::into).collect();
        if roles.iter().any(Role::is_wildcard) {
            Roles::All
        } else {
            Roles::Only(roles)
        }
    }

    /// Collapse a list holding the `all` role to `All`.
    pub fn normalized(self) -> Self {
        match self {
            Roles::Only(roles) => Roles::from_list(roles),
            all => all,
        }
    }

    /// Whether this is the `All` sentinel.
    pub fn is_all(&self) -> bool {
        matches!(self, Roles::All)
    }

    /// Whether no role is listed. `All` is never empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, Roles::Only(roles) if roles.is_empty())
    }

    /// Check membership, stopping at the first equal role.
    pub fn contains(&self, role: &Role) -> bool {
        match self {
            Roles::All => true,
            Roles::Only(roles) => roles.iter().any(|r| r == role),
        }
    }
}

/// Accepted serialized forms: `"all"`, `{"only": [..]}`, a single role or a
/// plain list of roles.
#[derive(Deserialize)]
#[serde(untagged)]
enum RolesRepr {
    Tagged(TaggedRoles),
    One(Role),
    Many(Vec<Role>),
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum TaggedRoles {
    All,
    Only(Vec<Role>),
}

impl From<RolesRepr> for Roles {
    fn from(repr: RolesRepr) -> Self {
        match repr {
            RolesRepr::Tagged(TaggedRoles::All) => Roles::All,
            RolesRepr::Tagged(TaggedRoles::Only(roles)) | RolesRepr::Many(roles) => {
                Roles::from_list(roles)
            }
            RolesRepr::One(role) => Roles::from_list([role]),
        }
    }
}

impl fmt::Display for Roles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Roles::All => f.write_str("all"),
            Roles::Only(roles) => {
                let list: Vec<String> = roles.iter().map(ToString::to_string).collect();
                f.write_str(&list.join(","))
            }
        }
    }
}

impl From<Role> for Roles {
    fn from(role: Role) -> Self {
        Roles::from_list([role])
    }
}

impl From<i64> for Roles {
    fn from(id: i64) -> Self {
        Roles::Only(vec![Role::Id(id)])
    }
}

impl From<i32> for Roles {
    fn from(id: i32) -> Self {
        Roles::Only(vec![Role::from(id)])
    }
}

impl From<&str> for Roles {
    fn from(name: &str) -> Self {
        Roles::from_list([name])
    }
}

impl<R: Into<Role>> From<Vec<R>> for Roles {
    fn from(roles: Vec<R>) -> Self {
        Roles::from_list(roles)
    }
}

impl<R: Into<Role>, const N: usize> From<[R; N]> for Roles {
    fn from(roles: [R; N]) -> Self {
        Roles::from_list(roles)
    }
}
