//! Route handlers: activation, lifecycle webhook, entitlement lookup,
//! and liveness.

use crate::config::ServerConfig;
use crate::error::ApiError;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use subgate_entitlement::{
    EntitlementStatus, EntitlementStore, LifecycleReconciler, ReconcileOutcome,
};
use subgate_proof::{decode_notification, decode_transaction, ProofVerifier};
use subgate_types::{EntitlementEvent, EntitlementKey, Environment, EpochMillis};
use tracing::{info, warn};

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<ProofVerifier>,
    pub reconciler: Arc<LifecycleReconciler>,
    pub store: Arc<dyn EntitlementStore>,
    pub config: Arc<ServerConfig>,
}

/// Builds the HTTP router over the given state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/subscription/activate", post(activate))
        .route("/api/v1/notifications", post(notifications))
        .route(
            "/api/v1/entitlements/{original_transaction_id}",
            get(lookup),
        )
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: "subgate is running",
    })
}

#[derive(Deserialize)]
pub struct ActivateRequest {
    /// Account token the app holds; cross-checked against the proof's
    /// `appAccountToken` when present.
    #[serde(default)]
    pub account_token: Option<String>,
    pub jws_transaction: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActivateResponse {
    pub status: EntitlementStatus,
    pub active_until_ms: i64,
    pub original_transaction_id: String,
    pub environment: Environment,
}

async fn activate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ActivateRequest>,
) -> Result<Json<ActivateResponse>, ApiError> {
    check_secret(&state, &headers)?;

    let claims = state.verifier.verify(&request.jws_transaction)?;
    let event = decode_transaction(&claims, EpochMillis::now())?;

    if let Some(expected) = &request.account_token {
        let matches = event
            .key
            .account_token
            .as_deref()
            .is_some_and(|token| token.eq_ignore_ascii_case(expected));
        if !matches {
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                "account_token_mismatch",
                "appAccountToken in the proof does not match the provided account token",
            ));
        }
    }
    check_environment(&state, event.environment)?;

    let record = commit(&state, event).await?.into_record();
    info!(key = %record.key, status = %record.status, "activation processed");
    Ok(Json(ActivateResponse {
        status: record.status,
        active_until_ms: record.active_until.as_millis(),
        original_transaction_id: record.key.original_transaction_id.clone(),
        environment: record.environment,
    }))
}

#[derive(Deserialize)]
pub struct NotificationRequest {
    #[serde(rename = "signedPayload")]
    pub signed_payload: String,
}

#[derive(Serialize)]
struct ProcessedResponse {
    status: &'static str,
}

/// Lifecycle notification webhook.
///
/// Any successfully decoded event returns success — including
/// ordering-guard no-ops — because the response code only exists to
/// suppress redelivery, not to report business outcome. Envelope
/// verification failures return an error so legitimate redelivery
/// survives a transient trust-anchor misconfiguration.
async fn notifications(
    State(state): State<AppState>,
    Json(request): Json<NotificationRequest>,
) -> Result<Json<ProcessedResponse>, ApiError> {
    let claims = state.verifier.verify(&request.signed_payload)?;
    let Some(event) = decode_notification(&claims, &state.verifier, EpochMillis::now())? else {
        info!("notification acknowledged without entitlement consequence");
        return Ok(Json(ProcessedResponse {
            status: "processed",
        }));
    };

    let kind = event.kind;
    if event.environment != state.config.environment {
        // Authentic, but for the other deployment; redelivery cannot
        // change that, so it counts as processed here.
        warn!(key = %event.key, ?kind, environment = %event.environment, "notification for mismatched environment acknowledged");
        return Ok(Json(ProcessedResponse {
            status: "processed",
        }));
    }
    match commit(&state, event).await {
        Ok(ReconcileOutcome::Applied(record)) => {
            info!(key = %record.key, ?kind, status = %record.status, "notification applied");
        }
        Ok(ReconcileOutcome::Stale(record)) => {
            info!(key = %record.key, ?kind, "stale notification acknowledged");
        }
        // A stored record can disagree with the configured environment
        // if the database was carried over from a differently-configured
        // deployment; redelivery cannot resolve that either.
        Err(err) if err.code() == "environment_mismatch" => {
            warn!(?kind, "notification for mismatched record environment acknowledged");
        }
        Err(err) => return Err(err),
    }
    Ok(Json(ProcessedResponse {
        status: "processed",
    }))
}

#[derive(Deserialize)]
pub struct LookupQuery {
    #[serde(default)]
    pub account_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EntitlementResponse {
    pub original_transaction_id: String,
    pub account_token: Option<String>,
    pub status: EntitlementStatus,
    pub active_until_ms: i64,
    pub environment: Environment,
    pub access_granted: bool,
    pub updated_at_ms: i64,
}

/// Read surface for the access-control collaborator: the record as
/// stored, plus whether it grants access right now. This engine never
/// enforces access itself.
async fn lookup(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(original_transaction_id): Path<String>,
    Query(query): Query<LookupQuery>,
) -> Result<Json<EntitlementResponse>, ApiError> {
    check_secret(&state, &headers)?;
    let key = EntitlementKey {
        original_transaction_id,
        account_token: query.account_token,
    };
    let record = state.store.get(&key)?.ok_or_else(|| {
        ApiError::new(
            StatusCode::NOT_FOUND,
            "not_found",
            "no entitlement for this key",
        )
    })?;
    let access_granted = record.grants_access(EpochMillis::now());
    Ok(Json(EntitlementResponse {
        original_transaction_id: record.key.original_transaction_id,
        account_token: record.key.account_token,
        status: record.status,
        active_until_ms: record.active_until.as_millis(),
        environment: record.environment,
        access_granted,
        updated_at_ms: record.updated_at.as_millis(),
    }))
}

/// Runs the reconcile-and-commit step to completion even when the caller
/// disconnects: redelivery suppression depends on the committed state
/// matching the response the sender eventually observes, so a partially
/// applied update is never acceptable.
async fn commit(state: &AppState, event: EntitlementEvent) -> Result<ReconcileOutcome, ApiError> {
    let reconciler = Arc::clone(&state.reconciler);
    let outcome = tokio::task::spawn_blocking(move || reconciler.apply(&event))
        .await
        .map_err(|err| {
            warn!("reconcile task failed: {err}");
            ApiError::service_unavailable()
        })??;
    Ok(outcome)
}

fn check_secret(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(secret) = &state.config.client_secret else {
        return Ok(());
    };
    let presented = headers
        .get("x-subgate-secret")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if presented != secret {
        return Err(ApiError::unauthorized());
    }
    Ok(())
}

fn check_environment(state: &AppState, environment: Environment) -> Result<(), ApiError> {
    if environment != state.config.environment {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "environment_mismatch",
            format!(
                "{environment} proofs are not accepted by this {} deployment",
                state.config.environment
            ),
        ));
    }
    Ok(())
}
