//! Dashboard roles derived once from a profile row.

use serde::Serialize;

use crate::domain::entities::UserProfile;
use crate::domain::types::{AdminLevel, UserRole};

/// Effective dashboard role of a signed-in user.
///
/// Unapproved profiles, and sessions without a profile, resolve to
/// [`Role::Unauthorized`] regardless of the role column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Role {
    Admin { level: AdminLevel },
    AuthorAdmin,
    Author,
    Unauthorized,
}

impl Role {
    pub fn from_profile(profile: Option<&UserProfile>) -> Self {
        let Some(profile) = profile else {
            return Role::Unauthorized;
        };
        if !profile.approved {
            return Role::Unauthorized;
        }
        match profile.role {
            UserRole::Admin => Role::Admin {
                level: profile.admin_level.unwrap_or(AdminLevel::Admin),
            },
            UserRole::AuthorAdmin => Role::AuthorAdmin,
            UserRole::Author => Role::Author,
        }
    }

    pub fn capabilities(self) -> Capabilities {
        Capabilities {
            is_admin: matches!(self, Role::Admin { .. }),
            is_root: matches!(
                self,
                Role::Admin {
                    level: AdminLevel::Root
                }
            ),
            is_author_admin: self == Role::AuthorAdmin,
            is_author: self == Role::Author,
        }
    }
}

/// The four capability flags the dashboard gates screens on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub is_admin: bool,
    pub is_root: bool,
    pub is_author_admin: bool,
    pub is_author: bool,
}

impl Capabilities {
    pub fn has_dashboard_access(self) -> bool {
        self.is_admin || self.is_author_admin || self.is_author
    }
}
