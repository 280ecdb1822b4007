//! Identity Provider
//!
//! Account storage and password verification are an external capability.
//! [`IdentityProvider`] is the seam; [`InMemoryIdentityProvider`] is a
//! development and test implementation using salted SHA-256. It is not a
//! production password hashing scheme.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tasktrack_core::Identity;
use thiserror::Error;
use uuid::Uuid;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserAccount {
    pub id: Identity,
    pub user_name: String,
    pub email: String,
}

/// Identity provider failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccountError {
    #[error("User name '{0}' is already taken")]
    DuplicateUserName(String),

    #[error("User {0} not found")]
    UnknownUser(Identity),

    #[error("Current password is not correct")]
    WrongPassword,

    #[error("Identity provider failure: {0}")]
    Provider(String),
}

/// Account registration, credential verification and profile updates.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an account. User names are unique, compared case-insensitively.
    async fn register(
        &self,
        user_name: &str,
        email: &str,
        password: &str,
    ) -> Result<UserAccount, AccountError>;

    /// The account for `user_name` if `password` matches, else `None`.
    async fn verify(&self, user_name: &str, password: &str) -> Result<Option<UserAccount>, AccountError>;

    async fn find_by_id(&self, id: &Identity) -> Result<Option<UserAccount>, AccountError>;

    /// Rename the account. The new name is subject to the same uniqueness
    /// rule as registration; renaming to a different casing of the current
    /// name is allowed.
    async fn set_user_name(&self, id: &Identity, user_name: &str) -> Result<UserAccount, AccountError>;

    async fn set_email(&self, id: &Identity, email: &str) -> Result<UserAccount, AccountError>;

    /// Replace the password if `current` matches the stored one.
    async fn change_password(&self, id: &Identity, current: &str, new: &str) -> Result<(), AccountError>;
}

// ============================================================================
// IN-MEMORY PROVIDER
// ============================================================================

#[derive(Debug, Clone)]
struct StoredUser {
    account: UserAccount,
    salt: String,
    password_hash: Vec<u8>,
}

impl StoredUser {
    fn password_matches(&self, password: &str) -> bool {
        let candidate = hash_password(&self.salt, password);
        bool::from(candidate.as_slice().ct_eq(self.password_hash.as_slice()))
    }

    fn set_password(&mut self, password: &str) {
        self.salt = hex::encode(rand::random::<[u8; 16]>());
        self.password_hash = hash_password(&self.salt, password);
    }
}

fn hash_password(salt: &str, password: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}

fn normalize(user_name: &str) -> String {
    user_name.trim().to_lowercase()
}

/// Process-local identity provider.
///
/// Accounts are keyed by id; `names` indexes normalized user names. Writers
/// lock `names` before `users`, never the other way round.
#[derive(Debug, Default)]
pub struct InMemoryIdentityProvider {
    users: DashMap<Identity, StoredUser>,
    names: DashMap<String, Identity>,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    fn id_for_name(&self, user_name: &str) -> Option<Identity> {
        self.names.get(&normalize(user_name)).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn register(
        &self,
        user_name: &str,
        email: &str,
        password: &str,
    ) -> Result<UserAccount, AccountError> {
        let id = Identity::parse(Uuid::new_v4().to_string())
            .ok_or_else(|| AccountError::Provider("generated an empty user id".to_string()))?;

        match self.names.entry(normalize(user_name)) {
            Entry::Occupied(_) => Err(AccountError::DuplicateUserName(user_name.trim().to_string())),
            Entry::Vacant(slot) => {
                let account = UserAccount {
                    id: id.clone(),
                    user_name: user_name.trim().to_string(),
                    email: email.trim().to_string(),
                };
                let mut stored = StoredUser {
                    account: account.clone(),
                    salt: String::new(),
                    password_hash: Vec::new(),
                };
                stored.set_password(password);
                self.users.insert(id.clone(), stored);
                slot.insert(id);
                Ok(account)
            }
        }
    }

    async fn verify(&self, user_name: &str, password: &str) -> Result<Option<UserAccount>, AccountError> {
        let Some(id) = self.id_for_name(user_name) else {
            return Ok(None);
        };
        Ok(self
            .users
            .get(&id)
            .filter(|user| user.password_matches(password))
            .map(|user| user.account.clone()))
    }

    async fn find_by_id(&self, id: &Identity) -> Result<Option<UserAccount>, AccountError> {
        Ok(self.users.get(id).map(|user| user.account.clone()))
    }

    async fn set_user_name(&self, id: &Identity, user_name: &str) -> Result<UserAccount, AccountError> {
        let current = self
            .users
            .get(id)
            .map(|user| normalize(&user.account.user_name))
            .ok_or_else(|| AccountError::UnknownUser(id.clone()))?;

        let wanted = normalize(user_name);
        if wanted != current {
            match self.names.entry(wanted) {
                Entry::Occupied(_) => {
                    return Err(AccountError::DuplicateUserName(user_name.trim().to_string()));
                }
                Entry::Vacant(slot) => {
                    slot.insert(id.clone());
                }
            }
            self.names.remove_if(&current, |_, owner| owner == id);
        }

        let mut user = self
            .users
            .get_mut(id)
            .ok_or_else(|| AccountError::UnknownUser(id.clone()))?;
        user.account.user_name = user_name.trim().to_string();
        Ok(user.account.clone())
    }

    async fn set_email(&self, id: &Identity, email: &str) -> Result<UserAccount, AccountError> {
        let mut user = self
            .users
            .get_mut(id)
            .ok_or_else(|| AccountError::UnknownUser(id.clone()))?;
        user.account.email = email.trim().to_string();
        Ok(user.account.clone())
    }

    async fn change_password(&self, id: &Identity, current: &str, new: &str) -> Result<(), AccountError> {
        let mut user = self
            .users
            .get_mut(id)
            .ok_or_else(|| AccountError::UnknownUser(id.clone()))?;
        if !user.password_matches(current) {
            return Err(AccountError::WrongPassword);
        }
        user.set_password(new);
        Ok(())
    }
}
