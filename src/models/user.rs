// src/models/user.rs - Accounts, roles and the role policy
use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

/// Membership level, ordered from least to most privileged
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Community,
    CoreTeam,
    #[serde(rename = "GDGC_LEAD")]
    Lead,
    SuperAdmin,
}

/// Things a role may be allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Create, list, edit and delete own short links
    ShortenUrls,
    /// Browse other members and their links
    ViewUsers,
    /// Assign member-level roles to members below lead
    ManageMemberRoles,
    /// Assign any role to anyone
    ManageAllRoles,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Community, Role::CoreTeam, Role::Lead, Role::SuperAdmin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Community => "COMMUNITY",
            Role::CoreTeam => "CORE_TEAM",
            Role::Lead => "GDGC_LEAD",
            Role::SuperAdmin => "SUPER_ADMIN",
        }
    }

    /// The single authorization policy: the minimum role for each capability
    pub fn can(self, capability: Capability) -> bool {
        let minimum = match capability {
            Capability::ShortenUrls => Role::CoreTeam,
            Capability::ViewUsers | Capability::ManageMemberRoles => Role::Lead,
            Capability::ManageAllRoles => Role::SuperAdmin,
        };
        self >= minimum
    }

    /// Whether `self` may move a user currently holding `current` to `new_role`
    pub fn may_assign(self, current: Role, new_role: Role) -> bool {
        if self.can(Capability::ManageAllRoles) {
            return true;
        }
        self.can(Capability::ManageMemberRoles)
            && current < Role::Lead
            && new_role < Role::Lead
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Represents a signed-in member
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub google_id: String,
    pub email: String,
    pub name: String,
    pub picture: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: DateTime<Utc>,
}

impl User {
    pub fn can(&self, capability: Capability) -> bool {
        self.role.can(capability)
    }
}

/// Identity returned by the Google userinfo endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoogleProfile {
    #[serde(rename = "id")]
    pub google_id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub picture: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: String,
}

/// Which administration surface a request came through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminScope {
    /// `/api/v1/admin`, super admins only
    Admin,
    /// `/api/v1/leader`, leads and above, super admins hidden
    Leader,
}

impl AdminScope {
    pub fn required_capability(&self) -> Capability {
        match self {
            AdminScope::Admin => Capability::ManageAllRoles,
            AdminScope::Leader => Capability::ViewUsers,
        }
    }

    /// Role that must stay invisible through this scope
    pub fn hidden_role(&self) -> Option<Role> {
        match self {
            AdminScope::Admin => None,
            AdminScope::Leader => Some(Role::SuperAdmin),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_are_ordered() {
        assert!(Role::Community < Role::CoreTeam);
        assert!(Role::CoreTeam < Role::Lead);
        assert!(Role::Lead < Role::SuperAdmin);
    }

    #[test]
    fn test_capabilities() {
        assert!(!Role::Community.can(Capability::ShortenUrls));
        assert!(Role::CoreTeam.can(Capability::ShortenUrls));
        assert!(!Role::CoreTeam.can(Capability::ViewUsers));
        assert!(Role::Lead.can(Capability::ViewUsers));
        assert!(Role::Lead.can(Capability::ManageMemberRoles));
        assert!(!Role::Lead.can(Capability::ManageAllRoles));
        assert!(Role::SuperAdmin.can(Capability::ManageAllRoles));
    }

    #[test]
    fn test_role_assignment_policy() {
        // Super admins may do anything
        assert!(Role::SuperAdmin.may_assign(Role::Lead, Role::Community));
        assert!(Role::SuperAdmin.may_assign(Role::Community, Role::SuperAdmin));

        // Leads manage members below them, and only into member roles
        assert!(Role::Lead.may_assign(Role::Community, Role::CoreTeam));
        assert!(Role::Lead.may_assign(Role::CoreTeam, Role::Community));
        assert!(!Role::Lead.may_assign(Role::Community, Role::Lead));
        assert!(!Role::Lead.may_assign(Role::Lead, Role::Community));
        assert!(!Role::Lead.may_assign(Role::SuperAdmin, Role::Community));

        // Nobody else
        assert!(!Role::CoreTeam.may_assign(Role::Community, Role::CoreTeam));
        assert!(!Role::Community.may_assign(Role::Community, Role::Community));
    }

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_string(&Role::Lead).unwrap(), "\"GDGC_LEAD\"");
        assert_eq!(serde_json::to_string(&Role::CoreTeam).unwrap(), "\"CORE_TEAM\"");
        assert_eq!("super_admin".parse::<Role>().unwrap(), Role::SuperAdmin);
        assert!("OWNER".parse::<Role>().is_err());
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn test_google_profile_from_userinfo() {
        let profile: GoogleProfile = serde_json::from_str(
            r#"{"id":"1234","email":"a@example.com","verified_email":true,"name":"Ada"}"#,
        )
        .unwrap();
        assert_eq!(profile.google_id, "1234");
        assert_eq!(profile.picture, "");
    }
}
