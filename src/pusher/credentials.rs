use super::errors::CredentialError;
use keyring::Entry;
use log::{debug, warn};
use std::fmt;

pub const ACCOUNT: &str = "git-auto-pusher";
const USERNAME_SERVICE: &str = "github-username";
const TOKEN_SERVICE: &str = "github-token";

const SELF_TEST_SERVICE: &str = "test";
const SELF_TEST_ACCOUNT: &str = "git-auto-pusher-test";
const SELF_TEST_VALUE: &str = "test-value";

type StoreResult<T> = std::result::Result<T, CredentialError>;

/// Key/value access to an OS secret store, keyed by (service, account).
pub trait SecretStore {
    fn get(&self, service: &str, account: &str) -> StoreResult<Option<String>>;
    fn set(&self, service: &str, account: &str, value: &str) -> StoreResult<()>;
    /// Deleting an entry that does not exist succeeds.
    fn delete(&self, service: &str, account: &str) -> StoreResult<()>;
}

/// The platform keychain (macOS Keychain, Windows Credential Manager, Linux
/// kernel keyring) via the `keyring` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct Keychain;

impl SecretStore for Keychain {
    fn get(&self, service: &str, account: &str) -> StoreResult<Option<String>> {
        let entry = Entry::new(service, account).map_err(unavailable)?;
        match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(unavailable(error)),
        }
    }

    fn set(&self, service: &str, account: &str, value: &str) -> StoreResult<()> {
        Entry::new(service, account)
            .and_then(|entry| entry.set_password(value))
            .map_err(unavailable)
    }

    fn delete(&self, service: &str, account: &str) -> StoreResult<()> {
        let entry = Entry::new(service, account).map_err(unavailable)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(unavailable(error)),
        }
    }
}

fn unavailable(error: keyring::Error) -> CredentialError {
    CredentialError::Unavailable(error.to_string())
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub token: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// The username/token pair kept as two independent secret store entries.
pub struct CredentialStore<S = Keychain> {
    store: S,
}

impl CredentialStore<Keychain> {
    pub fn keychain() -> Self {
        Self::new(Keychain)
    }
}

impl<S: SecretStore> CredentialStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// `Ok(None)` when either half is missing or empty; `Err` only when the
    /// store itself could not be read.
    pub fn get(&self) -> StoreResult<Option<Credentials>> {
        let username = self
            .store
            .get(USERNAME_SERVICE, ACCOUNT)
            .inspect_err(|error| warn!("Error retrieving credentials: {error}"))?;
        let token = self
            .store
            .get(TOKEN_SERVICE, ACCOUNT)
            .inspect_err(|error| warn!("Error retrieving credentials: {error}"))?;

        match (username, token) {
            (Some(username), Some(token)) if !username.is_empty() && !token.is_empty() => {
                Ok(Some(Credentials { username, token }))
            }
            _ => Ok(None),
        }
    }

    pub fn set(&self, credentials: &Credentials) -> StoreResult<()> {
        self.store
            .set(USERNAME_SERVICE, ACCOUNT, &credentials.username)
            .and_then(|()| self.store.set(TOKEN_SERVICE, ACCOUNT, &credentials.token))
            .inspect_err(|error| warn!("Error storing credentials: {error}"))
    }

    /// Removes both entries. Both deletions are attempted even if the first
    /// one fails; the first failure is returned.
    pub fn clear(&self) -> StoreResult<()> {
        let username = self.store.delete(USERNAME_SERVICE, ACCOUNT);
        let token = self.store.delete(TOKEN_SERVICE, ACCOUNT);
        username
            .and(token)
            .inspect_err(|error| warn!("Error clearing credentials: {error}"))
    }

    /// Round-trips a throwaway value to check that the store is usable. The
    /// throwaway entry is removed whatever the outcome.
    pub fn self_test(&self) -> StoreResult<()> {
        let round_trip = self
            .store
            .set(SELF_TEST_SERVICE, SELF_TEST_ACCOUNT, SELF_TEST_VALUE)
            .and_then(|()| self.store.get(SELF_TEST_SERVICE, SELF_TEST_ACCOUNT));
        let cleanup = self.store.delete(SELF_TEST_SERVICE, SELF_TEST_ACCOUNT);

        let outcome = match round_trip {
            Ok(Some(value)) if value == SELF_TEST_VALUE => cleanup,
            Ok(_) => Err(CredentialError::Mismatch),
            Err(error) => Err(error),
        };
        match &outcome {
            Ok(()) => debug!("Keychain self-test passed"),
            Err(error) => warn!("Keychain test failed: {error}"),
        }
        outcome
    }
}
