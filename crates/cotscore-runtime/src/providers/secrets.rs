//! Secure credential handling for remote providers.
//!
//! Credentials are wrapped in [`secrecy::SecretString`] as soon as they are
//! loaded. They never appear in `Debug` or `Display` output and must be
//! exposed explicitly at the point of use.
//!
//! ## Usage
//!
//! ```ignore
//! let token = ApiCredential::from_value_or_env(config.nli.api_token.as_deref(), HF_TOKEN_ENV, "NLI API token");
//!
//! if let Some(token) = &token {
//!     request = request.bearer_auth(token.expose());
//! }
//! ```

use secrecy::{ExposeSecret, SecretString};
use std::fmt;

/// Environment variable holding the Hugging Face inference token.
pub const HF_TOKEN_ENV: &str = "HF_TOKEN";

/// Where a credential was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Configuration file
    Config,
    /// Environment variable
    Environment,
    /// Provided programmatically
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Config => write!(f, "config"),
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A securely-stored API credential.
///
/// `Debug` shows `[REDACTED]`; the value is only reachable via
/// [`ApiCredential::expose`].
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Load an optional credential: the configured value if present and
    /// non-empty, else `env_var` if set and non-empty.
    pub fn from_value_or_env(
        configured: Option<&str>,
        env_var: &str,
        name: &'static str,
    ) -> Option<Self> {
        if let Some(value) = configured.filter(|v| !v.trim().is_empty()) {
            return Some(Self::new(value, CredentialSource::Config, name));
        }

        std::env::var(env_var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| Self::new(v, CredentialSource::Environment, name))
    }

    /// Expose the credential value. Only call this where it is sent.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Clone for ApiCredential {
    fn clone(&self) -> Self {
        Self::new(self.expose(), self.source, self.name)
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}
