//! Billing environment tags.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The billing environment a proof was issued in.
///
/// Sandbox proofs must never mutate production records and vice versa;
/// the claim strings are matched case-sensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Environment {
    Sandbox,
    Production,
}

impl Environment {
    /// Returns the wire representation used in proof claims.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sandbox => "Sandbox",
            Self::Production => "Production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing an environment tag.
#[derive(Debug, Error)]
#[error("unrecognized environment: {0}")]
pub struct ParseEnvironmentError(String);

impl FromStr for Environment {
    type Err = ParseEnvironmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Sandbox" => Ok(Self::Sandbox),
            "Production" => Ok(Self::Production),
            other => Err(ParseEnvironmentError(other.to_string())),
        }
    }
}
