//! Where the bearer token comes from.
//!
//! The streaming client only needs a synchronous "give me the current token,
//! if any" getter. Sources here can be combined with [`ChainedCredentials`].

use std::error::Error;
use std::fmt;

use keyring::Entry;
use tracing::{debug, warn};

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const KEYRING_SERVICE: &str = "ponder";
pub const KEYRING_ACCOUNT: &str = "openai";

pub trait CredentialSource: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

fn non_blank(token: String) -> Option<String> {
    let trimmed = token.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Reads the token from an environment variable on every call.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    var: String,
}

impl EnvCredentials {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvCredentials {
    fn default() -> Self {
        Self::new(API_KEY_ENV)
    }
}

impl CredentialSource for EnvCredentials {
    fn bearer_token(&self) -> Option<String> {
        std::env::var(&self.var).ok().and_then(non_blank)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticCredentials(Option<String>);

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl CredentialSource for StaticCredentials {
    fn bearer_token(&self) -> Option<String> {
        self.0.clone().and_then(non_blank)
    }
}

/// Describes failures when attempting to access the system keyring.
///
/// Recoverable errors indicate that the credential backend was
/// temporarily unavailable (for example when the keychain service is
/// locked or inaccessible). Permanent errors surface the underlying
/// cause directly so callers can report them to the user.
#[derive(Debug)]
pub enum KeyringAccessError {
    Recoverable(keyring::Error),
    Permanent(keyring::Error),
}

impl KeyringAccessError {
    fn inner(&self) -> &keyring::Error {
        match self {
            KeyringAccessError::Recoverable(err) | KeyringAccessError::Permanent(err) => err,
        }
    }

    /// Returns true when the error represents a temporary outage of the
    /// platform keyring backend.
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

impl fmt::Display for KeyringAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner())
    }
}

impl Error for KeyringAccessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.inner())
    }
}

/// Token kept in the platform keyring.
#[derive(Debug, Clone)]
pub struct KeyringCredentials {
    service: String,
    account: String,
}

impl Default for KeyringCredentials {
    fn default() -> Self {
        Self::new(KEYRING_SERVICE, KEYRING_ACCOUNT)
    }
}

impl KeyringCredentials {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<Entry, KeyringAccessError> {
        Ok(Entry::new(&self.service, &self.account)?)
    }

    pub fn load(&self) -> Result<Option<String>, KeyringAccessError> {
        match self.entry()?.get_password() {
            Ok(token) => Ok(non_blank(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn store(&self, token: &str) -> Result<(), KeyringAccessError> {
        self.entry()?.set_password(token.trim())?;
        debug!(service = %self.service, account = %self.account, "Stored API key in keyring");
        Ok(())
    }

    /// Returns `false` if there was nothing to remove.
    pub fn remove(&self) -> Result<bool, KeyringAccessError> {
        match self.entry()?.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

impl CredentialSource for KeyringCredentials {
    fn bearer_token(&self) -> Option<String> {
        match self.load() {
            Ok(token) => token,
            Err(err) => {
                warn!(
                    recoverable = err.is_recoverable(),
                    error = %err,
                    "Keyring lookup failed"
                );
                None
            }
        }
    }
}

/// Tries each source in order and returns the first token found.
#[derive(Default)]
pub struct ChainedCredentials {
    sources: Vec<Box<dyn CredentialSource>>,
}

impl ChainedCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: impl CredentialSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Environment first, then the keyring.
    pub fn standard() -> Self {
        Self::new()
            .with(EnvCredentials::default())
            .with(KeyringCredentials::default())
    }
}

impl CredentialSource for ChainedCredentials {
    fn bearer_token(&self) -> Option<String> {
        self.sources.iter().find_map(|source| source.bearer_token())
    }
}
