//! Server configuration.
//!
//! Operational settings arrive as flags; the client secret comes from
//! the environment so it never shows up in process listings.

use subgate_types::Environment;

/// Runtime configuration shared by all handlers.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The billing environment this deployment accepts proofs for.
    pub environment: Environment,
    /// Shared client secret; `None` disables the check (dev mode).
    pub client_secret: Option<String>,
}

impl ServerConfig {
    /// Reads the client secret from `SUBGATE_CLIENT_SECRET`.
    ///
    /// An unset or empty variable disables the check.
    #[must_use]
    pub fn client_secret_from_env() -> Option<String> {
        std::env::var("SUBGATE_CLIENT_SECRET")
            .ok()
            .filter(|secret| !secret.is_empty())
    }
}
