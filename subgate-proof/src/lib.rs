//! Signed-proof verification and decoding for Subgate.
//!
//! Proofs arrive as compact JWS tokens: three dot-separated base64url
//! segments (header, payload, signature), with the signer's certificate
//! chain embedded in the `x5c` header field and the payload signed with
//! ES256. Nothing inside a token is trusted until the chain verifies
//! against the pinned trust anchors and the signature verifies under the
//! leaf key.
//!
//! Lifecycle notifications wrap a second signed transaction token in
//! their payload; the decoder runs the inner token back through the same
//! verifier, so both envelopes are validated against the same anchors.
//!
//! # Token Format
//!
//! `base64url(header).base64url(payload).base64url(signature)`
//!
//! The header carries `alg` (must be `ES256`) and `x5c` (leaf first,
//! ordered toward the root). The signature is the raw 64-byte `R || S`
//! ECDSA form over `header.payload`.

mod decoder;
mod error;
mod verifier;

pub use decoder::{decode_notification, decode_transaction};
pub use error::{ProofError, ProofResult};
pub use verifier::{Claims, ProofVerifier, TrustAnchors};
