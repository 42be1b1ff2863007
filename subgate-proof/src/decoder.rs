//! Claim decoding: verified claim sets into canonical entitlement events.
//!
//! Two shapes exist on the wire. A transaction proof carries the
//! subscription claims directly. A lifecycle notification describes what
//! happened (`notificationType` + `subtype`) and wraps a second signed
//! transaction token in `data.signedTransactionInfo`; that inner token
//! goes back through the verifier with the same pinned anchors before
//! any of its claims are read.

use crate::error::{ProofError, ProofResult};
use crate::verifier::{Claims, ProofVerifier};
use subgate_types::{EntitlementEvent, EntitlementKey, Environment, EpochMillis, EventKind};

/// Claims shared by both the direct and the nested transaction shape.
struct TransactionClaims {
    key: EntitlementKey,
    environment: Environment,
    expires_at: EpochMillis,
    signed_at: Option<EpochMillis>,
}

/// Decodes a verified transaction claim set into an activation event.
///
/// `verified_at` substitutes for a missing `signedDate` claim so every
/// event carries an ordering key.
///
/// # Errors
///
/// [`ProofError::InvalidClaims`] if required fields are absent or
/// mistyped.
pub fn decode_transaction(claims: &Claims, verified_at: EpochMillis) -> ProofResult<EntitlementEvent> {
    let tx = extract_transaction(claims)?;
    Ok(EntitlementEvent {
        key: tx.key,
        kind: EventKind::Activated,
        environment: tx.environment,
        ordering_key: tx.signed_at.unwrap_or(verified_at),
        expires_at: Some(tx.expires_at),
    })
}

/// Decodes a verified notification claim set into an entitlement event.
///
/// The ordering key is the outer notification's `signedDate`; expiry and
/// the entitlement key come from the nested transaction, which is
/// verified through `verifier` first. Returns `Ok(None)` for recognized
/// notification types that carry no entitlement consequence, so callers
/// can acknowledge them without touching storage.
///
/// # Errors
///
/// [`ProofError::InvalidClaims`] for missing/mistyped fields,
/// unrecognized notification types, or an inner token that fails
/// verification.
pub fn decode_notification(
    claims: &Claims,
    verifier: &ProofVerifier,
    verified_at: EpochMillis,
) -> ProofResult<Option<EntitlementEvent>> {
    let notification_type = require_str(claims, "notificationType")?;
    let subtype = opt_str(claims, "subtype")?;
    let Some(kind) = map_notification(notification_type, subtype)? else {
        return Ok(None);
    };
    let ordering_key = opt_i64(claims, "signedDate")?
        .map(EpochMillis::from_millis)
        .unwrap_or(verified_at);

    let data = claims
        .get("data")
        .and_then(serde_json::Value::as_object)
        .ok_or_else(|| ProofError::InvalidClaims("missing data object".to_string()))?;
    let inner_token = require_str(data, "signedTransactionInfo")?;
    let inner_claims = verifier
        .verify(inner_token)
        .map_err(|e| ProofError::InvalidClaims(format!("inner transaction rejected: {e}")))?;
    let tx = extract_transaction(&inner_claims)?;

    if let Some(outer_env) = opt_str(data, "environment")? {
        let outer_env: Environment = outer_env
            .parse()
            .map_err(|e| ProofError::InvalidClaims(format!("{e}")))?;
        if outer_env != tx.environment {
            return Err(ProofError::InvalidClaims(
                "notification and transaction environments disagree".to_string(),
            ));
        }
    }

    // Only events that establish a new period carry an expiry forward;
    // terminal and lapse events take their time from the ordering key.
    let expires_at =
        matches!(kind, EventKind::Activated | EventKind::Renewed).then_some(tx.expires_at);

    Ok(Some(EntitlementEvent {
        key: tx.key,
        kind,
        environment: tx.environment,
        ordering_key,
        expires_at,
    }))
}

/// Maps a notification `(type, subtype)` pair onto an event kind.
///
/// `Ok(None)` marks types that are acknowledged but carry no
/// entitlement consequence.
fn map_notification(
    notification_type: &str,
    subtype: Option<&str>,
) -> ProofResult<Option<EventKind>> {
    let kind = match notification_type {
        "SUBSCRIBED" => EventKind::Activated,
        "DID_RENEW" => EventKind::Renewed,
        "DID_FAIL_TO_RENEW" => {
            if subtype == Some("GRACE_PERIOD") {
                EventKind::FailedRenewGrace
            } else {
                EventKind::Expired
            }
        }
        "GRACE_PERIOD_EXPIRED" => EventKind::GraceExpired,
        "EXPIRED" => EventKind::Expired,
        "REFUND" => EventKind::Refunded,
        "REVOKE" => EventKind::Revoked,
        "DID_CHANGE_RENEWAL_PREF" | "DID_CHANGE_RENEWAL_STATUS" | "OFFER_REDEEMED"
        | "PRICE_INCREASE" | "RENEWAL_EXTENDED" | "TEST" => return Ok(None),
        other => {
            return Err(ProofError::InvalidClaims(format!(
                "unrecognized notification type: {other}"
            )));
        }
    };
    Ok(Some(kind))
}

fn extract_transaction(claims: &Claims) -> ProofResult<TransactionClaims> {
    let original_transaction_id = require_str(claims, "originalTransactionId")?.to_string();
    let expires_at = EpochMillis::from_millis(require_i64(claims, "expiresDate")?);
    let signed_at = opt_i64(claims, "signedDate")?.map(EpochMillis::from_millis);
    let environment: Environment = require_str(claims, "environment")?
        .parse()
        .map_err(|e| ProofError::InvalidClaims(format!("{e}")))?;
    let account_token = opt_str(claims, "appAccountToken")?.map(str::to_string);
    Ok(TransactionClaims {
        key: EntitlementKey {
            original_transaction_id,
            account_token,
        },
        environment,
        expires_at,
        signed_at,
    })
}

fn require_str<'a>(claims: &'a Claims, name: &str) -> ProofResult<&'a str> {
    opt_str(claims, name)?
        .ok_or_else(|| ProofError::InvalidClaims(format!("missing claim: {name}")))
}

fn opt_str<'a>(claims: &'a Claims, name: &str) -> ProofResult<Option<&'a str>> {
    match claims.get(name) {
        None => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(ProofError::InvalidClaims(format!(
            "claim {name} is not a string"
        ))),
    }
}

fn require_i64(claims: &Claims, name: &str) -> ProofResult<i64> {
    opt_i64(claims, name)?
        .ok_or_else(|| ProofError::InvalidClaims(format!("missing claim: {name}")))
}

fn opt_i64(claims: &Claims, name: &str) -> ProofResult<Option<i64>> {
    match claims.get(name) {
        None => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or_else(|| ProofError::InvalidClaims(format!("claim {name} is not an integer"))),
    }
}
