//! Recipient directory port.
//!
//! Notification delivery, broadcasts, and scheduled sweeps need to
//! resolve a user id to contact details and to enumerate users by role.
//! Account management itself lives outside this system, so the directory
//! is a read-only port implemented against whatever user store the
//! deployment has.

use async_trait::async_trait;
use uuid::Uuid;

use crate::actor::Role;
use crate::error::DomainError;

/// Contact details for one user.
#[derive(Debug, Clone)]
pub struct Contact {
    /// The user.
    pub user_id: Uuid,
    /// Display name.
    pub name: String,
    /// Email address, when the user has one on file.
    pub email: Option<String>,
}

/// Read-only access to user contact details.
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    /// Look up contact details for a user.
    async fn find_contact(&self, user_id: Uuid) -> Result<Option<Contact>, DomainError>;

    /// All user ids holding `role`, for broadcasts and platform alerts.
    async fn ids_with_role(&self, role: Role) -> Result<Vec<Uuid>, DomainError>;
}
