//! Test directories — mock `RecipientDirectory` implementations for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use reefbook_core::actor::Role;
use reefbook_core::directory::{Contact, RecipientDirectory};
use reefbook_core::error::DomainError;
use uuid::Uuid;

/// A directory backed by a fixed user map.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    contacts: Mutex<HashMap<Uuid, Contact>>,
    roles: Mutex<Vec<(Uuid, Role)>>,
}

impl StaticDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user with a role and contact details, returning the
    /// directory for chaining.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn with_user(self, user_id: Uuid, role: Role, name: &str, email: Option<&str>) -> Self {
        self.contacts.lock().unwrap().insert(
            user_id,
            Contact {
                user_id,
                name: name.to_owned(),
                email: email.map(str::to_owned),
            },
        );
        self.roles.lock().unwrap().push((user_id, role));
        self
    }

    /// Register an administrator with a generated contact, returning the
    /// directory for chaining.
    #[must_use]
    pub fn with_admin(self, user_id: Uuid) -> Self {
        self.with_user(user_id, Role::Admin, "Admin", None)
    }
}

#[async_trait]
impl RecipientDirectory for StaticDirectory {
    async fn find_contact(&self, user_id: Uuid) -> Result<Option<Contact>, DomainError> {
        Ok(self.contacts.lock().unwrap().get(&user_id).cloned())
    }

    async fn ids_with_role(&self, role: Role) -> Result<Vec<Uuid>, DomainError> {
        Ok(self
            .roles
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, r)| *r == role)
            .map(|(id, _)| *id)
            .collect())
    }
}

/// A directory that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingDirectory;

#[async_trait]
impl RecipientDirectory for FailingDirectory {
    async fn find_contact(&self, _user_id: Uuid) -> Result<Option<Contact>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn ids_with_role(&self, _role: Role) -> Result<Vec<Uuid>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}
