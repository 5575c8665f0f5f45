//! Caller identity and row-level permission evaluation.
//!
//! Every registry operation takes an explicit [`Caller`]. Resolving that
//! identity (tokens, sessions) happens outside this crate.
//!
//! # Example
//!
//! ```ignore
//! use mosaic_models::auth::{Caller, Permission, has_access};
//!
//! let caller = Caller::user("u1").with_groups(["eng"]);
//! if has_access(&caller, record.access_control.as_ref(), Permission::Read) {
//!     // ...
//! }
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::AccessControl;

/// Role of an authenticated caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::User => write!(f, "user"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(crate::Error::Validation(format!("unknown role: {other}"))),
        }
    }
}

/// An already-authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub groups: BTreeSet<String>,
}

impl Caller {
    /// A caller with the `user` role and no groups.
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
            groups: BTreeSet::new(),
        }
    }

    /// A caller with the `admin` role.
    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            role: Role::Admin,
            ..Self::user(id)
        }
    }

    /// Replace the caller's group memberships.
    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn owns(&self, owner_id: &str) -> bool {
        self.id == owner_id
    }
}

/// Permission kind checked against an [`AccessControl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Read,
    Write,
}

/// Decide whether `caller` holds `permission` under `access`.
///
/// `None` is open access. A missing rule for the requested permission denies.
/// Role and ownership are not considered here; callers check those first.
pub fn has_access(caller: &Caller, access: Option<&AccessControl>, permission: Permission) -> bool {
    let Some(access) = access else {
        return true;
    };

    let rule = match permission {
        Permission::Read => access.read.as_ref(),
        Permission::Write => access.write.as_ref(),
    };
    let Some(rule) = rule else {
        return false;
    };

    rule.user_ids.contains(&caller.id) || !rule.group_ids.is_disjoint(&caller.groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AccessRule;

    #[test]
    fn open_access_grants_everything() {
        let callers = [Caller::user("u1"), Caller::admin("root"), Caller::user("")];
        for caller in &callers {
            assert!(has_access(caller, None, Permission::Read));
            assert!(has_access(caller, None, Permission::Write));
        }
    }

    #[test]
    fn missing_rule_denies() {
        let access = AccessControl {
            read: Some(AccessRule::users(["u1"])),
            write: None,
        };
        let caller = Caller::user("u1");

        assert!(has_access(&caller, Some(&access), Permission::Read));
        assert!(!has_access(&caller, Some(&access), Permission::Write));
    }

    #[test]
    fn group_intersection_grants() {
        let access = AccessControl {
            read: Some(AccessRule::groups(["eng", "ops"])),
            write: None,
        };

        let member = Caller::user("u2").with_groups(["sales", "ops"]);
        let outsider = Caller::user("u3").with_groups(["sales"]);

        assert!(has_access(&member, Some(&access), Permission::Read));
        assert!(!has_access(&outsider, Some(&access), Permission::Read));
    }

    #[test]
    fn evaluator_ignores_role() {
        let access = AccessControl::default();
        let admin = Caller::admin("root");

        assert!(!has_access(&admin, Some(&access), Permission::Read));
    }

    #[test]
    fn role_parses_from_str() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert!("root".parse::<Role>().is_err());
    }
}
