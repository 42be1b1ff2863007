//! JWS verification against pinned trust anchors.
//!
//! The verification pipeline:
//!
//! 1. Split the token into header, payload, and signature segments.
//! 2. Decode the header; require `alg == "ES256"` and a non-empty `x5c`
//!    certificate chain.
//! 3. Walk the chain: each certificate's issuer must be the next
//!    certificate's subject, and its signature must verify under the
//!    next certificate's key.
//! 4. The terminal certificate must either be one of the pinned anchors
//!    or be directly issued by one (chains may or may not embed the
//!    root).
//! 5. Every chain certificate's validity window must cover now.
//! 6. Verify the ES256 signature over `header.payload` with the leaf key.
//!
//! Anchors are loaded once at startup and never refreshed or fetched
//! over the network.

use crate::error::{ProofError, ProofResult};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use ring::signature::{UnparsedPublicKey, ECDSA_P256_SHA256_FIXED};
use serde::Deserialize;
use std::fmt;
use x509_parser::prelude::*;

/// The verified, still-untyped payload of a proof token.
pub type Claims = serde_json::Map<String, serde_json::Value>;

/// The set of pinned root certificates, fixed for the process lifetime.
#[derive(Clone)]
pub struct TrustAnchors {
    roots: Vec<Vec<u8>>,
}

impl TrustAnchors {
    /// Loads anchors from a PEM bundle.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundle contains no certificate or any
    /// entry fails to parse as X.509 DER.
    pub fn from_pem(pem: &[u8]) -> ProofResult<Self> {
        let mut reader = std::io::BufReader::new(pem);
        let roots = rustls_pemfile::certs(&mut reader)
            .map(|cert| cert.map(|der| der.as_ref().to_vec()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ProofError::Malformed(format!("invalid trust anchor PEM: {e}")))?;
        Self::from_der(roots)
    }

    /// Builds the anchor set from raw DER certificates.
    ///
    /// # Errors
    ///
    /// Returns an error if the set is empty or any certificate fails to
    /// parse.
    pub fn from_der(roots: Vec<Vec<u8>>) -> ProofResult<Self> {
        if roots.is_empty() {
            return Err(ProofError::Malformed(
                "trust anchor set is empty".to_string(),
            ));
        }
        for der in &roots {
            parse_certificate(der)?;
        }
        Ok(Self { roots })
    }

    /// Number of pinned anchors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Returns true if no anchors are pinned (never true for a
    /// constructed set).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

impl fmt::Debug for TrustAnchors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustAnchors")
            .field("roots", &self.roots.len())
            .finish()
    }
}

#[derive(Deserialize)]
struct ProtectedHeader {
    alg: String,
    #[serde(default)]
    x5c: Vec<String>,
}

/// Verifies compact JWS proof tokens against the pinned trust anchors.
///
/// Stateless apart from the anchor set; one instance is shared across
/// all requests and invoked freely in parallel.
#[derive(Debug, Clone)]
pub struct ProofVerifier {
    anchors: TrustAnchors,
}

impl ProofVerifier {
    #[must_use]
    pub fn new(anchors: TrustAnchors) -> Self {
        Self { anchors }
    }

    /// Verifies `token` and returns its decoded payload claims.
    ///
    /// # Errors
    ///
    /// [`ProofError::Malformed`] for structural problems,
    /// [`ProofError::UnsupportedAlgorithm`] for anything but ES256,
    /// [`ProofError::Untrusted`] if the chain does not link or terminate
    /// at a pinned anchor, [`ProofError::ExpiredCert`] if a certificate
    /// is outside its validity window, and
    /// [`ProofError::SignatureMismatch`] if the signature fails.
    pub fn verify(&self, token: &str) -> ProofResult<Claims> {
        let token = token.trim();
        let mut segments = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(ProofError::Malformed(
                "expected header.payload.signature".to_string(),
            ));
        };

        let header_bytes = decode_segment(header_b64, "header")?;
        let header: ProtectedHeader = serde_json::from_slice(&header_bytes)
            .map_err(|e| ProofError::Malformed(format!("invalid header JSON: {e}")))?;
        if header.alg != "ES256" {
            return Err(ProofError::UnsupportedAlgorithm(header.alg));
        }
        if header.x5c.is_empty() {
            return Err(ProofError::Malformed(
                "missing x5c certificate chain".to_string(),
            ));
        }

        let chain_der = header
            .x5c
            .iter()
            .map(|cert| STANDARD.decode(cert))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ProofError::Malformed(format!("invalid x5c base64: {e}")))?;
        let chain = chain_der
            .iter()
            .map(|der| parse_certificate(der))
            .collect::<ProofResult<Vec<_>>>()?;

        for pair in chain.windows(2) {
            verify_link(&pair[0], &pair[1])?;
        }
        let terminal_index = chain.len() - 1;
        self.verify_anchored(&chain[terminal_index], &chain_der[terminal_index])?;

        if chain.iter().any(|cert| !cert.validity().is_valid()) {
            return Err(ProofError::ExpiredCert);
        }

        let signature = decode_segment(signature_b64, "signature")?;
        let signing_input = format!("{header_b64}.{payload_b64}");
        let leaf_key = chain[0].public_key().subject_public_key.data.as_ref();
        UnparsedPublicKey::new(&ECDSA_P256_SHA256_FIXED, leaf_key)
            .verify(signing_input.as_bytes(), &signature)
            .map_err(|_| ProofError::SignatureMismatch)?;

        let payload_bytes = decode_segment(payload_b64, "payload")?;
        match serde_json::from_slice(&payload_bytes) {
            Ok(serde_json::Value::Object(claims)) => Ok(claims),
            Ok(_) => Err(ProofError::Malformed(
                "payload is not a JSON object".to_string(),
            )),
            Err(e) => Err(ProofError::Malformed(format!("invalid payload JSON: {e}"))),
        }
    }

    /// Checks that the terminal chain certificate is trusted: either a
    /// pinned anchor itself, or issued and signed by one.
    fn verify_anchored(
        &self,
        terminal: &X509Certificate<'_>,
        terminal_der: &[u8],
    ) -> ProofResult<()> {
        for root_der in &self.anchors.roots {
            if root_der.as_slice() == terminal_der {
                return Ok(());
            }
            let Ok(root) = parse_certificate(root_der) else {
                continue;
            };
            if terminal.issuer().as_raw() == root.subject().as_raw()
                && terminal.verify_signature(Some(root.public_key())).is_ok()
            {
                return Ok(());
            }
        }
        Err(ProofError::Untrusted)
    }
}

fn decode_segment(segment: &str, what: &str) -> ProofResult<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| ProofError::Malformed(format!("invalid {what} base64: {e}")))
}

fn parse_certificate(der: &[u8]) -> ProofResult<X509Certificate<'_>> {
    let (rest, cert) = X509Certificate::from_der(der)
        .map_err(|e| ProofError::Malformed(format!("cannot parse chain certificate: {e}")))?;
    if !rest.is_empty() {
        return Err(ProofError::Malformed(
            "trailing bytes after certificate".to_string(),
        ));
    }
    Ok(cert)
}

/// Checks that `child` is issued and signed by `issuer`.
fn verify_link(child: &X509Certificate<'_>, issuer: &X509Certificate<'_>) -> ProofResult<()> {
    if child.issuer().as_raw() != issuer.subject().as_raw() {
        return Err(ProofError::Untrusted);
    }
    child
        .verify_signature(Some(issuer.public_key()))
        .map_err(|_| ProofError::Untrusted)
}
