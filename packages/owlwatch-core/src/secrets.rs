//! Device credential sourcing.
//!
//! The OWL fleet shares one Basic Auth credential pair. How that pair is
//! stored (encrypted keychain, secret manager, plain env) is outside the
//! engine's scope; services only see the [`CredentialProvider`] seam.

use std::env;

use serde::Deserialize;
use thiserror::Error;

/// Environment variable holding the fleet username.
pub const USERNAME_ENV: &str = "OWLWATCH_USERNAME";
/// Environment variable holding the fleet password.
pub const PASSWORD_ENV: &str = "OWLWATCH_PASSWORD";

/// Basic Auth credentials for the device fleet.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Errors from credential resolution.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// A required secret is missing from the provider's backing store.
    #[error("missing credential: {0}")]
    Missing(String),

    /// The stored credential is present but unusable.
    #[error("invalid credential: {0}")]
    Invalid(String),
}

/// External secret-provider seam.
///
/// Implementations resolve the fleet credentials at bootstrap time; the
/// engine never caches or re-resolves them mid-run.
pub trait CredentialProvider: Send + Sync {
    /// Resolves the fleet credentials.
    fn get_credentials(&self) -> Result<Credentials, CredentialError>;
}

/// Provider backed by `OWLWATCH_USERNAME` / `OWLWATCH_PASSWORD`.
#[derive(Debug, Default)]
pub struct EnvCredentialProvider;

impl CredentialProvider for EnvCredentialProvider {
    fn get_credentials(&self) -> Result<Credentials, CredentialError> {
        let username =
            env::var(USERNAME_ENV).map_err(|_| CredentialError::Missing(USERNAME_ENV.into()))?;
        let password =
            env::var(PASSWORD_ENV).map_err(|_| CredentialError::Missing(PASSWORD_ENV.into()))?;

        let credentials = Credentials { username, password };
        validate(&credentials)?;
        Ok(credentials)
    }
}

/// Provider holding credentials resolved elsewhere (config file, test setup).
#[derive(Debug, Clone)]
pub struct StaticCredentialProvider {
    credentials: Credentials,
}

impl StaticCredentialProvider {
    /// Wraps already-resolved credentials.
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

impl CredentialProvider for StaticCredentialProvider {
    fn get_credentials(&self) -> Result<Credentials, CredentialError> {
        validate(&self.credentials)?;
        Ok(self.credentials.clone())
    }
}

fn validate(credentials: &Credentials) -> Result<(), CredentialError> {
    if credentials.username.is_empty() {
        return Err(CredentialError::Invalid("username is empty".into()));
    }
    Ok(())
}
