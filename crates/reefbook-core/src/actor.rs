//! Authenticated actors and their roles.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role assigned to an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A paying customer. May only touch their own records.
    Customer,
    /// Operational staff: records fulfillment progress, runs experiences.
    Business,
    /// Full administrative access.
    Admin,
}

impl Role {
    /// Parse a role from its wire representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "customer" => Some(Role::Customer),
            "business" => Some(Role::Business),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Wire representation of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Business => "business",
            Role::Admin => "admin",
        }
    }
}

/// An authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// The user behind this actor.
    pub user_id: Uuid,
    /// The role the actor authenticated with.
    pub role: Role,
}

impl Actor {
    /// Construct an actor.
    #[must_use]
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    /// True for administrators.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// True for staff (business or admin).
    #[must_use]
    pub fn is_staff(&self) -> bool {
        matches!(self.role, Role::Business | Role::Admin)
    }
}
