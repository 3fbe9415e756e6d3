use anyhow::{Context, Result};
use keyring::Entry;

/// Keychain service under which sign-in passwords are filed.
const SERVICE_NAME: &str = "cashtrack";

/// Remembered sign-in passwords, kept in the OS keychain keyed by email.
pub struct CredentialStore;

impl CredentialStore {
    fn entry(email: &str) -> Result<Entry> {
        Entry::new(SERVICE_NAME, email.trim()).context("Failed to open keychain entry")
    }

    /// Remember the password for `email`, replacing any previous one.
    pub fn remember(email: &str, password: &str) -> Result<()> {
        Self::entry(email)?
            .set_password(password)
            .context("Failed to save password to keychain")
    }

    /// The remembered password for `email`, `None` if there is none.
    pub fn recall(email: &str) -> Result<Option<String>> {
        match Self::entry(email)?.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to read password from keychain"),
        }
    }

    /// Forget the password for `email`. Forgetting nothing is not an error.
    pub fn forget(email: &str) -> Result<()> {
        match Self::entry(email)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to remove password from keychain"),
        }
    }
}
