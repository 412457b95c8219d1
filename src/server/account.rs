//! Accounts allowed to bind.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Deserialize;

/// Client credentials.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Account {
    /// Name presented as `system_id` in the bind request
    pub user_name: String,
    pub password: String,
}

impl Account {
    /// Create new credentials.
    pub fn new(user_name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            password: password.into(),
        }
    }
}

/// Why a credential check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    UnknownUser,
    WrongPassword,
}

/// Account map shared between the server and its connection tasks.
///
/// Guarded by a lock so accounts may be added while sessions are binding.
#[derive(Debug, Default)]
pub struct AccountStore {
    accounts: RwLock<HashMap<String, Arc<Account>>>,
}

impl AccountStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the account with the same user name.
    pub fn add(&self, account: Account) {
        let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
        accounts.insert(account.user_name.clone(), Arc::new(account));
    }

    /// Look up an account by user name.
    pub fn get(&self, user_name: &str) -> Option<Arc<Account>> {
        let accounts = self.accounts.read().unwrap_or_else(PoisonError::into_inner);
        accounts.get(user_name).cloned()
    }

    /// Check a user name and password pair.
    pub fn authenticate(&self, user_name: &str, password: &str) -> Result<Arc<Account>, AuthFailure> {
        let account = self.get(user_name).ok_or(AuthFailure::UnknownUser)?;
        if account.password == password {
            Ok(account)
        } else {
            Err(AuthFailure::WrongPassword)
        }
    }

    pub fn len(&self) -> usize {
        self.accounts.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authenticate() {
        let store = AccountStore::new();
        store.add(Account::new("client", "pw"));

        assert!(store.authenticate("client", "pw").is_ok());
        assert_eq!(
            store.authenticate("client", "wrong").unwrap_err(),
            AuthFailure::WrongPassword
        );
        assert_eq!(
            store.authenticate("unknown", "pw").unwrap_err(),
            AuthFailure::UnknownUser
        );
    }

    #[test]
    fn test_add_overwrites() {
        let store = AccountStore::new();
        store.add(Account::new("client", "old"));
        store.add(Account::new("client", "new"));

        assert_eq!(store.len(), 1);
        assert!(store.authenticate("client", "old").is_err());
        assert!(store.authenticate("client", "new").is_ok());
    }
}
