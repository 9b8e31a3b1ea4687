//! Deployment user roster.
//!
//! Account management lives in the identity provider, so the server
//! ships a directory seeded from configuration: it can enumerate staff
//! for role broadcasts and platform alerts, and it has no contact
//! details to offer. Deployments with a user store plug their own
//! [`RecipientDirectory`] in here instead.

use async_trait::async_trait;
use uuid::Uuid;

use reefbook_core::actor::Role;
use reefbook_core::directory::{Contact, RecipientDirectory};
use reefbook_core::error::DomainError;

/// Role roster seeded from `ADMIN_USER_IDS` and `BUSINESS_USER_IDS`.
#[derive(Debug, Clone, Default)]
pub struct RosterDirectory {
    admins: Vec<Uuid>,
    business: Vec<Uuid>,
}

impl RosterDirectory {
    /// A roster with the given administrator and staff ids.
    #[must_use]
    pub fn new(admins: Vec<Uuid>, business: Vec<Uuid>) -> Self {
        Self { admins, business }
    }
}

#[async_trait]
impl RecipientDirectory for RosterDirectory {
    async fn find_contact(&self, _user_id: Uuid) -> Result<Option<Contact>, DomainError> {
        Ok(None)
    }

    async fn ids_with_role(&self, role: Role) -> Result<Vec<Uuid>, DomainError> {
        let ids = match role {
            Role::Admin => self.admins.clone(),
            Role::Business => self.business.clone(),
            Role::Customer => Vec::new(),
        };
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roster_enumerates_staff_roles_only() {
        // Arrange
        let admin = Uuid::new_v4();
        let staff = Uuid::new_v4();
        let roster = RosterDirectory::new(vec![admin], vec![staff]);

        // Act & Assert
        assert_eq!(roster.ids_with_role(Role::Admin).await.unwrap(), vec![admin]);
        assert_eq!(
            roster.ids_with_role(Role::Business).await.unwrap(),
            vec![staff]
        );
        assert!(roster.ids_with_role(Role::Customer).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_roster_has_no_contact_details() {
        // Arrange
        let roster = RosterDirectory::default();

        // Act & Assert
        assert!(roster.find_contact(Uuid::new_v4()).await.unwrap().is_none());
    }
}
