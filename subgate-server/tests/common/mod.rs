//! Shared test helpers: a signing authority, token builders, and a
//! server spawned on an OS-assigned port.

#![allow(dead_code)]

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, ECDSA_P256_SHA256_FIXED_SIGNING};
use serde_json::json;
use std::sync::Arc;
use subgate_entitlement::{EntitlementStore, LifecycleReconciler, MemoryStore};
use subgate_proof::{ProofVerifier, TrustAnchors};
use subgate_server::{build_router, AppState, ServerConfig};
use subgate_types::Environment;

pub struct TestAuthority {
    pub root_der: Vec<u8>,
    pub chain: Vec<Vec<u8>>,
    pub leaf_key_pkcs8: Vec<u8>,
}

pub fn test_authority() -> TestAuthority {
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

pub fn sign_token(authority: &TestAuthority, payload_json: &str) -> String {
    let x5c: Vec<String> = authority
        .chain
        .iter()
        .map(|der| STANDARD.encode(der))
        .collect();
    let header = json!({ "alg": "ES256", "x5c": x5c }).to_string();
    let header_b64 = URL_SAFE_NO_PAD.encode(header);
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload_json);
    let signing_input = format!("{header_b64}.{payload_b64}");
    let rng = SystemRandom::new();
    let key = EcdsaKeyPair::from_pkcs8(
        &ECDSA_P256_SHA256_FIXED_SIGNING,
        &authority.leaf_key_pkcs8,
        &rng,
    )
    .expect("leaf key pkcs8");
    let signature = key.sign(&rng, signing_input.as_bytes()).expect("sign");
    format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature.as_ref()))
}

pub fn transaction_token(
    authority: &TestAuthority,
    otid: &str,
    account_token: Option<&str>,
    expires_ms: i64,
    signed_ms: i64,
) -> String {
    let mut claims = json!({
        "originalTransactionId": otid,
        "expiresDate": expires_ms,
        "signedDate": signed_ms,
        "environment": "Production",
    });
    if let Some(token) = account_token {
        claims["appAccountToken"] = json!(token);
    }
    sign_token(authority, &claims.to_string())
}

pub fn notification_token(
    authority: &TestAuthority,
    notification_type: &str,
    subtype: Option<&str>,
    signed_ms: i64,
    inner_token: &str,
) -> String {
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
    sign_token(authority, &claims.to_string())
}

/// A running server plus handles for direct store assertions.
pub struct TestServer {
    pub base_url: String,
    pub store: Arc<MemoryStore>,
}

/// Spins up the full router on an OS-assigned port.
pub async fn spawn_server(authority: &TestAuthority, client_secret: Option<&str>) -> TestServer {
    let store = Arc::new(MemoryStore::new());
    let anchors = TrustAnchors::from_der(vec![authority.root_der.clone()]).expect("anchors");
    let state = AppState {
        verifier: Arc::new(ProofVerifier::new(anchors)),
        reconciler: Arc::new(LifecycleReconciler::new(
            store.clone() as Arc<dyn EntitlementStore>
        )),
        store: store.clone(),
        config: Arc::new(ServerConfig {
            environment: Environment::Production,
            client_secret: client_secret.map(str::to_string),
        }),
    };
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestServer {
        base_url: format!("http://127.0.0.1:{port}"),
        store,
    }
}

pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;
