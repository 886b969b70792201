//! Role gating for dashboard sections.
//!
//! Every view asks [`authorize`] before it renders or fetches anything. A
//! denial is a normal outcome rendered as an "Access Denied" placeholder,
//! not an error.

use std::fmt;

use crate::structs::session::Identity;
use crate::structs::user::Role;

/// Sections of the dashboard, in sidebar order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Dashboard,
    Members,
    Packages,
    Users,
    Attendance,
}

impl Section {
    pub const ALL: [Section; 5] = [
        Section::Dashboard,
        Section::Members,
        Section::Packages,
        Section::Users,
        Section::Attendance,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Section::Dashboard => "Dashboard",
            Section::Members => "Members",
            Section::Packages => "Packages",
            Section::Users => "Staff & Trainers",
            Section::Attendance => "Attendance",
        }
    }

    fn admin_only(&self) -> bool {
        matches!(self, Section::Packages | Section::Users | Section::Attendance)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// No session, or the token did not decode.
    NotAuthenticated,
    /// The section is restricted to admins.
    AdminOnly,
    /// The role may not use the dashboard at all.
    RoleNotPermitted(Role),
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::NotAuthenticated => f.write_str("please sign in"),
            DenialReason::AdminOnly => f.write_str("admin privileges required"),
            DenialReason::RoleNotPermitted(role) => {
                write!(f, "the {role} role cannot use the dashboard")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allowed,
    Denied { reason: DenialReason },
}

impl Access {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Access::Allowed)
    }
}

/// Decides whether `identity` may open `section`.
pub fn authorize(identity: Option<&Identity>, section: Section) -> Access {
    let Some(identity) = identity else {
        return Access::Denied {
            reason: DenialReason::NotAuthenticated,
        };
    };

    match identity.role {
        Role::Admin => Access::Allowed,
        Role::Staff if !section.admin_only() => Access::Allowed,
        Role::Staff => Access::Denied {
            reason: DenialReason::AdminOnly,
        },
        role => Access::Denied {
            reason: DenialReason::RoleNotPermitted(role),
        },
    }
}

/// Sections to list in the navigation for `identity`.
pub fn visible_sections(identity: Option<&Identity>) -> Vec<Section> {
    Section::ALL
        .into_iter()
        .filter(|section| authorize(identity, *section).is_allowed())
        .collect()
}
