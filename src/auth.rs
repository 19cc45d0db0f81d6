//! Credential acquisition
//!
//! Logging in and refreshing tokens is the identity provider's business. The
//! sender only needs a bearer token on demand, so the provider is a trait seam
//! and any failure to produce a token surfaces as [`Error::Credential`].

use crate::error::{Error, Result};
use async_trait::async_trait;

/// Source of bearer tokens for the send request
///
/// # Examples
///
/// ```
/// use bulk_mailer::auth::{StaticTokenProvider, TokenProvider};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let provider = StaticTokenProvider::new("eyJ0eXAi...");
/// let token = provider.access_token().await?;
/// assert_eq!(token, "eyJ0eXAi...");
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Acquire an access token, silently if possible
    ///
    /// # Errors
    ///
    /// Returns [`Error::Credential`] if no token can be produced (no signed-in
    /// account, consent required, refresh failed, ...).
    async fn access_token(&self) -> Result<String>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Provider returning a fixed token
#[derive(Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    /// Wrap an already acquired token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Read the token from an environment variable
    pub fn from_env(var: &str) -> Result<Self> {
        let token = std::env::var(var)
            .map_err(|_| Error::Credential(format!("environment variable {var} is not set")))?;
        Ok(Self::new(token))
    }
}

impl std::fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenProvider")
            .field("token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String> {
        if self.token.trim().is_empty() {
            return Err(Error::Credential("access token is empty".into()));
        }
        Ok(self.token.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Provider used when nobody is signed in
///
/// Every request fails with [`Error::Credential`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SignedOutProvider;

#[async_trait]
impl TokenProvider for SignedOutProvider {
    async fn access_token(&self) -> Result<String> {
        Err(Error::Credential(
            "no signed-in account; log in before sending".into(),
        ))
    }

    fn name(&self) -> &'static str {
        "signed-out"
    }
}
