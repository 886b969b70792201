use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{MembershipStatus, UserId};
use crate::errors::GymError;

/// Role carried by every account and embedded in session tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
    Trainer,
    Member,
    #[serde(other)]
    Unknown,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Trainer => "trainer",
            Role::Member => "member",
            Role::Unknown => "unknown",
        }
    }

    /// Only admins and staff may hold a dashboard session.
    pub fn can_use_dashboard(&self) -> bool {
        matches!(self, Role::Admin | Role::Staff)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Roles managed from the staff & trainers view.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaffRole {
    #[default]
    Staff,
    Trainer,
}

impl StaffRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            StaffRole::Staff => "staff",
            StaffRole::Trainer => "trainer",
        }
    }
}

impl fmt::Display for StaffRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<StaffRole> for Role {
    fn from(role: StaffRole) -> Self {
        match role {
            StaffRole::Staff => Role::Staff,
            StaffRole::Trainer => Role::Trainer,
        }
    }
}

impl TryFrom<Role> for StaffRole {
    type Error = GymError;

    fn try_from(role: Role) -> Result<Self, Self::Error> {
        match role {
            Role::Staff => Ok(StaffRole::Staff),
            Role::Trainer => Ok(StaffRole::Trainer),
            other => Err(GymError::Validation(format!(
                "Role `{other}` cannot be managed here. Only staff or trainer allowed."
            ))),
        }
    }
}

impl FromStr for StaffRole {
    type Err = GymError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "staff" => Ok(StaffRole::Staff),
            "trainer" => Ok(StaffRole::Trainer),
            _ => Err(GymError::Validation(format!(
                "Invalid role `{s}`. Only staff or trainer allowed."
            ))),
        }
    }
}

/// Staff or trainer account returned by `/admin/users`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    /// Flipped through the toggle action, never set directly.
    #[serde(default)]
    pub is_active: bool,
}

impl User {
    pub fn status(&self) -> MembershipStatus {
        if self.is_active {
            MembershipStatus::Active
        } else {
            MembershipStatus::Inactive
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_roles_deserialize() {
        let role: Role = serde_json::from_str("\"superuser\"").unwrap();
        assert_eq!(role, Role::Unknown);
        assert!(!role.can_use_dashboard());
    }

    #[test]
    fn dashboard_roles() {
        assert!(Role::Admin.can_use_dashboard());
        assert!(Role::Staff.can_use_dashboard());
        assert!(!Role::Trainer.can_use_dashboard());
        assert!(!Role::Member.can_use_dashboard());
    }

    #[test]
    fn staff_role_conversions() {
        assert_eq!("Trainer".parse::<StaffRole>().unwrap(), StaffRole::Trainer);
        assert!("admin".parse::<StaffRole>().is_err());
        assert!(StaffRole::try_from(Role::Admin).is_err());
        assert_eq!(Role::from(StaffRole::Staff), Role::Staff);
    }
}
