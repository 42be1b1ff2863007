//! Error types for proof verification and decoding.

use thiserror::Error;

/// Result type for proof operations.
pub type ProofResult<T> = Result<T, ProofError>;

/// Why a proof was rejected.
#[derive(Debug, Error)]
pub enum ProofError {
    /// The token is structurally invalid (segment count, base64, JSON).
    #[error("malformed proof token: {0}")]
    Malformed(String),

    /// The certificate chain does not terminate at a pinned trust anchor.
    #[error("certificate chain does not terminate at a pinned trust anchor")]
    Untrusted,

    /// A chain certificate's validity window does not cover the current time.
    #[error("certificate validity window does not cover the current time")]
    ExpiredCert,

    /// The signature does not verify under the leaf certificate's key.
    #[error("proof signature does not verify")]
    SignatureMismatch,

    /// The token announces a signing algorithm other than ES256.
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The token verified but its claims do not match the expected shape.
    #[error("claims do not match the expected shape: {0}")]
    InvalidClaims(String),
}

impl ProofError {
    /// Stable reason code reported to API callers.
    #[must_use]
    pub const fn reason_code(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "proof_malformed",
            Self::Untrusted => "proof_untrusted",
            Self::ExpiredCert => "proof_expired_cert",
            Self::SignatureMismatch => "proof_signature_mismatch",
            Self::UnsupportedAlgorithm(_) => "proof_unsupported_algorithm",
            Self::InvalidClaims(_) => "malformed_proof",
        }
    }
}
