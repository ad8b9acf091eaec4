//! Secure key-value storage for the cached token.

use keyring::Entry;
use thiserror::Error;

pub const SERVICE_NAME: &str = "claudewatch";

pub const ACCESS_TOKEN_KEY: &str = "access-token";
pub const REFRESH_TOKEN_KEY: &str = "refresh-token";
pub const EXPIRES_AT_KEY: &str = "expires-at";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Minimal get/set/delete store. Deleting a missing key is not an error.
pub trait SecretStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// OS keyring (Keychain, Credential Manager, kernel keyutils).
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StoreError> {
        Ok(Entry::new(&self.service, key)?)
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretStore for KeyringStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entry(key)?.set_password(value)?;
        tracing::debug!(key, "Stored secret");
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) => {
                tracing::debug!(key, "Deleted secret");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_and_keys_are_stable() {
        assert_eq!(SERVICE_NAME, "claudewatch");
        assert_eq!(ACCESS_TOKEN_KEY, "access-token");
        assert_eq!(REFRESH_TOKEN_KEY, "refresh-token");
        assert_eq!(EXPIRES_AT_KEY, "expires-at");
    }

    #[test]
    fn keyring_roundtrip_when_available() {
        let store = KeyringStore::with_service("claudewatch-test");
        let key = "roundtrip";
        let _ = store.delete(key);

        // Headless CI machines often have no usable keyring backend.
        if store.set(key, "secret-value").is_err() {
            return;
        }
        match store.get(key) {
            Ok(Some(value)) => assert_eq!(value, "secret-value"),
            _ => return,
        }
        assert!(store.delete(key).is_ok());
        assert!(!matches!(store.get(key), Ok(Some(_))));
    }

    #[test]
    fn memory_store_delete_missing_is_ok() {
        let store = memory::MemoryStore::default();
        assert!(store.delete("missing").is_ok());
        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
    }
}
