use keyring::Entry;
use thiserror::Error;

const KEYRING_SERVICE: &str = "chatline";

/// Describes failures when attempting to access the system keyring.
///
/// Recoverable errors indicate that the credential backend was temporarily
/// unavailable (a locked keychain, no secret service running). Permanent
/// errors surface the underlying cause directly.
#[derive(Debug, Error)]
pub enum KeyringAccessError {
    #[error("keyring temporarily unavailable: {0}")]
    Recoverable(keyring::Error),
    #[error("{0}")]
    Permanent(keyring::Error),
}

impl KeyringAccessError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, KeyringAccessError::Recoverable(_))
    }
}

impl From<keyring::Error> for KeyringAccessError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::PlatformFailure(_) | keyring::Error::NoStorageAccess(_) => {
                KeyringAccessError::Recoverable(err)
            }
            other => KeyringAccessError::Permanent(other),
        }
    }
}

/// Bearer tokens are stored per backend, keyed by the normalized base URL.
pub fn load_token(account: &str) -> Result<Option<String>, KeyringAccessError> {
    let entry = Entry::new(KEYRING_SERVICE, account)?;
    match entry.get_password() {
        Ok(token) => Ok(Some(token)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

pub fn store_token(account: &str, token: &str) -> Result<(), KeyringAccessError> {
    let entry = Entry::new(KEYRING_SERVICE, account)?;
    entry.set_password(token)?;
    Ok(())
}

pub fn delete_token(account: &str) -> Result<(), KeyringAccessError> {
    let entry = Entry::new(KEYRING_SERVICE, account)?;
    match entry.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(err) => Err(err.into()),
    }
}
