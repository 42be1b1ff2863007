//! Shared test helpers: mint certificate chains and sign proof tokens.

#![allow(dead_code)]

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, ECDSA_P256_SHA256_FIXED_SIGNING};
use serde_json::json;

/// A complete signing identity: pinned root, intermediate, leaf, and the
/// leaf's private key.
pub struct TestAuthority {
    /// DER of the root certificate (the anchor to pin).
    pub root_der: Vec<u8>,
    /// x5c chain, leaf first then intermediate (root not embedded).
    pub chain: Vec<Vec<u8>>,
    /// PKCS#8 of the leaf signing key.
    pub leaf_key_pkcs8: Vec<u8>,
}

/// Mints a root -> intermediate -> leaf chain with default validity.
pub fn test_authority() -> TestAuthority {
    build_authority(|_| {})
}

/// Mints a chain whose leaf certificate's validity window is in the past.
pub fn expired_leaf_authority() -> TestAuthority {
    build_authority(|params| {
        params.not_before = rcgen::date_time_ymd(2020, 1, 1);
        params.not_after = rcgen::date_time_ymd(2021, 1, 1);
    })
}

fn build_authority(customize_leaf: impl FnOnce(&mut CertificateParams)) -> TestAuthority {
    let root_key = KeyPair::generate().expect("root key");
    let mut root_params = CertificateParams::default();
    root_params
        .distinguished_name
        .push(DnType::CommonName, "Subgate Test Root CA");
    root_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let root_cert = root_params.self_signed(&root_key).expect("root cert");

    let inter_key = KeyPair::generate().expect("intermediate key");
    let mut inter_params = CertificateParams::default();
    inter_params
        .distinguished_name
        .push(DnType::CommonName, "Subgate Test Issuing CA");
    inter_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let inter_cert = inter_params
        .signed_by(&inter_key, &root_cert, &root_key)
        .expect("intermediate cert");

    let leaf_key = KeyPair::generate().expect("leaf key");
    let mut leaf_params = CertificateParams::default();
    leaf_params
        .distinguished_name
        .push(DnType::CommonName, "Subgate Test Signer");
    customize_leaf(&mut leaf_params);
    let leaf_cert = leaf_params
        .signed_by(&leaf_key, &inter_cert, &inter_key)
        .expect("leaf cert");

    TestAuthority {
        root_der: root_cert.der().as_ref().to_vec(),
        chain: vec![
            leaf_cert.der().as_ref().to_vec(),
            inter_cert.der().as_ref().to_vec(),
        ],
        leaf_key_pkcs8: leaf_key.serialize_der(),
    }
}

/// Signs a token over `payload_json` with the authority's leaf key and
/// its default chain.
pub fn sign_token(authority: &TestAuthority, payload_json: &str) -> String {
    sign_token_with_chain(authority, payload_json, &authority.chain)
}

/// Signs a token with an explicit x5c chain.
pub fn sign_token_with_chain(
    authority: &TestAuthority,
    payload_json: &str,
    chain: &[Vec<u8>],
) -> String {
    let x5c: Vec<String> = chain.iter().map(|der| STANDARD.encode(der)).collect();
    let header = json!({ "alg": "ES256", "x5c": x5c }).to_string();
    sign_with_header(&authority.leaf_key_pkcs8, &header, payload_json)
}

/// Signs a token with an arbitrary protected header.
pub fn sign_with_header(leaf_key_pkcs8: &[u8], header_json: &str, payload_json: &str) -> String {
    let header_b64 = URL_SAFE_NO_PAD.encode(header_json);
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload_json);
    let signing_input = format!("{header_b64}.{payload_b64}");
    let rng = SystemRandom::new();
    let key = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, leaf_key_pkcs8, &rng)
        .expect("leaf key pkcs8");
    let signature = key.sign(&rng, signing_input.as_bytes()).expect("sign");
    format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature.as_ref()))
}

/// Wraps DER certificate bytes in a PEM block.
pub fn der_to_pem(der: &[u8]) -> String {
    let b64 = STANDARD.encode(der);
    let mut pem = String::from("-----BEGIN CERTIFICATE-----\n");
    for chunk in b64.as_bytes().chunks(64) {
        pem.push_str(std::str::from_utf8(chunk).expect("base64 is ascii"));
        pem.push('\n');
    }
    pem.push_str("-----END CERTIFICATE-----\n");
    pem
}

/// Claim set for a plain subscription transaction.
pub fn transaction_claims(otid: &str, expires_ms: i64, signed_ms: i64) -> serde_json::Value {
    json!({
        "originalTransactionId": otid,
        "expiresDate": expires_ms,
        "signedDate": signed_ms,
        "environment": "Production",
    })
}

/// Claim set for a lifecycle notification wrapping `inner_token`.
pub fn notification_claims(
    notification_type: &str,
    subtype: Option<&str>,
    signed_ms: i64,
    inner_token: &str,
) -> serde_json::Value {
    let mut claims = json!({
        "notificationType": notification_type,
        "signedDate": signed_ms,
        "data": {
            "environment": "Production",
            "signedTransactionInfo": inner_token,
        },
    });
    if let Some(subtype) = subtype {
        claims["subtype"] = json!(subtype);
    }
    claims
}
