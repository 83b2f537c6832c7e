//! Identity-provider webhook handler.
//!
//! Verifies delivery signatures and mirrors user lifecycle events into
//! the user store: `user.created` inserts, `user.updated` patches, and
//! `user.deleted` removes. Unrecognized event types are acknowledged
//! without touching the store, so new provider events never turn into
//! redelivery storms.
//!
//! Each delivery is independent; there is no persisted state machine.
//! Concurrent deliveries for the same id race at the store with
//! last-write-wins semantics.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use usersync_core::{CoreError, User, UserId, UserUpdate};

use crate::{crypto::VerifyError, server::AppState};

/// Inbound delivery envelope: an event type tag plus event-specific data.
#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Provider user payload.
///
/// Every field is optional on purpose: the provider's payload shape is
/// not guaranteed stable, so presence is checked before use instead of
/// assumed at deserialization.
#[derive(Debug, Default, Deserialize)]
struct UserEventData {
    id: Option<String>,
    #[serde(default)]
    email_addresses: Vec<EmailAddress>,
    first_name: Option<String>,
    last_name: Option<String>,
    image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmailAddress {
    email_address: Option<String>,
}

/// Failure acknowledgement returned to the provider.
#[derive(Debug, Serialize)]
struct FailureResponse {
    success: bool,
    message: String,
}

/// Failures surfaced by the webhook handler.
#[derive(Debug, Error)]
enum WebhookError {
    /// The delivery could not be authenticated.
    #[error("verification failed: {0}")]
    Verification(#[from] VerifyError),

    /// The payload did not carry the expected shape.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The user store rejected or timed out on the mutation.
    #[error("store failure: {0}")]
    Store(#[from] CoreError),
}

impl WebhookError {
    /// Verification and payload failures can never succeed on redelivery
    /// of the same bytes; store failures are transient, and a 5xx lets
    /// the provider's own redelivery act as the retry policy.
    fn status(&self) -> StatusCode {
        match self {
            Self::Verification(_) | Self::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Verification(_) => "verification",
            Self::MalformedPayload(_) => "payload",
            Self::Store(_) => "store",
        }
    }
}

/// Outcome of a processed delivery.
enum Ack {
    /// A store mutation was applied.
    Applied { kind: String },
    /// The event type is not one we sync; acknowledged without action.
    Ignored { kind: String },
}

/// Handles an identity-provider webhook delivery.
///
/// Verifies the signature against the raw body, then applies exactly one
/// store mutation (or none, for unrecognized event types). All failures
/// are converted to structured responses here; nothing escapes as an
/// unhandled fault.
#[instrument(name = "handle_webhook", skip(state, headers, body), fields(payload_size = body.len()))]
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match process(&state, &headers, &body).await {
        Ok(Ack::Applied { kind }) => {
            info!(event = %kind, "webhook applied");
            ack_response()
        },
        Ok(Ack::Ignored { kind }) => {
            debug!(event = %kind, "unrecognized event type acknowledged");
            ack_response()
        },
        Err(err) => {
            warn!(error = %err, "webhook rejected");
            state.monitor.report(err.kind(), err.to_string());
            failure_response(&err)
        },
    }
}

/// Verifies, parses, and dispatches a single delivery.
async fn process(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Ack, WebhookError> {
    state.verifier.verify(headers, body)?;

    let envelope: WebhookEnvelope = serde_json::from_slice(body)
        .map_err(|e| WebhookError::MalformedPayload(format!("invalid JSON envelope: {e}")))?;

    let WebhookEnvelope { kind, data } = envelope;
    let applied = match kind.as_str() {
        "user.created" => {
            let user = parse_created(data)?;
            state.store.upsert(&user).await?;
            true
        },
        "user.updated" => {
            let data = parse_user_data(data)?;
            let id = require_id(&data)?;
            let changes = UserUpdate {
                email: primary_email(&data),
                name: display_name(&data),
                image: data.image_url,
            };
            state.store.update(&id, &changes).await?;
            true
        },
        "user.deleted" => {
            let data = parse_user_data(data)?;
            let id = require_id(&data)?;
            state.store.delete(&id).await?;
            true
        },
        _ => false,
    };

    if applied {
        Ok(Ack::Applied { kind })
    } else {
        Ok(Ack::Ignored { kind })
    }
}

/// Builds the full record inserted for a `user.created` event.
///
/// Requires an id and at least one email address; name and avatar fall
/// back to empty strings when absent. `resume` always starts empty.
fn parse_created(data: serde_json::Value) -> Result<User, WebhookError> {
    let data = parse_user_data(data)?;
    let id = require_id(&data)?;

    let email = primary_email(&data).ok_or_else(|| {
        WebhookError::MalformedPayload("user.created without an email address".to_string())
    })?;

    Ok(User {
        id,
        email,
        name: display_name(&data).unwrap_or_default(),
        image: data.image_url.unwrap_or_default(),
        resume: String::new(),
    })
}

fn parse_user_data(data: serde_json::Value) -> Result<UserEventData, WebhookError> {
    serde_json::from_value(data)
        .map_err(|e| WebhookError::MalformedPayload(format!("unexpected event data shape: {e}")))
}

fn require_id(data: &UserEventData) -> Result<UserId, WebhookError> {
    data.id
        .clone()
        .map(UserId::from)
        .ok_or_else(|| WebhookError::MalformedPayload("event data missing user id".to_string()))
}

/// First listed email address, if any.
fn primary_email(data: &UserEventData) -> Option<String> {
    data.email_addresses.iter().find_map(|entry| entry.email_address.clone())
}

/// Given name and family name joined by a single space.
///
/// Returns `None` only when both parts are absent, so an update without
/// name fields leaves the stored name untouched.
fn display_name(data: &UserEventData) -> Option<String> {
    if data.first_name.is_none() && data.last_name.is_none() {
        return None;
    }

    let joined = format!(
        "{} {}",
        data.first_name.as_deref().unwrap_or(""),
        data.last_name.as_deref().unwrap_or("")
    );
    Some(joined.trim().to_string())
}

/// Empty success acknowledgement.
fn ack_response() -> Response {
    (StatusCode::OK, Json(serde_json::json!({}))).into_response()
}

fn failure_response(err: &WebhookError) -> Response {
    let body = FailureResponse { success: false, message: err.to_string() };
    (err.status(), Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn created_event_builds_full_record() {
        let data = json!({
            "id": "u1",
            "email_addresses": [{"email_address": "a@b.com"}, {"email_address": "c@d.com"}],
            "first_name": "A",
            "last_name": "B",
            "image_url": "http://x/img",
        });

        let user = parse_created(data).unwrap();

        assert_eq!(user.id, UserId::from("u1"));
        assert_eq!(user.email, "a@b.com");
        assert_eq!(user.name, "A B");
        assert_eq!(user.image, "http://x/img");
        assert_eq!(user.resume, "");
    }

    #[test]
    fn created_event_without_email_is_malformed() {
        let data = json!({"id": "u1", "email_addresses": []});

        let err = parse_created(data).unwrap_err();
        assert!(matches!(err, WebhookError::MalformedPayload(_)));
    }

    #[test]
    fn created_event_without_id_is_malformed() {
        let data = json!({"email_addresses": [{"email_address": "a@b.com"}]});

        let err = parse_created(data).unwrap_err();
        assert!(matches!(err, WebhookError::MalformedPayload(_)));
    }

    #[test]
    fn non_object_data_is_malformed() {
        let err = parse_created(json!("not an object")).unwrap_err();
        assert!(matches!(err, WebhookError::MalformedPayload(_)));
    }

    #[test]
    fn email_entries_without_address_are_skipped() {
        let data = json!({
            "id": "u1",
            "email_addresses": [{}, {"email_address": "second@b.com"}],
        });

        let user = parse_created(data).unwrap();
        assert_eq!(user.email, "second@b.com");
    }

    #[test]
    fn display_name_handles_partial_names() {
        let both = UserEventData {
            first_name: Some("A".into()),
            last_name: Some("B".into()),
            ..Default::default()
        };
        assert_eq!(display_name(&both).as_deref(), Some("A B"));

        let only_first =
            UserEventData { first_name: Some("A".into()), ..Default::default() };
        assert_eq!(display_name(&only_first).as_deref(), Some("A"));

        let neither = UserEventData::default();
        assert_eq!(display_name(&neither), None);
    }

    #[test]
    fn unknown_provider_fields_are_ignored() {
        let data = json!({
            "id": "u1",
            "email_addresses": [{"email_address": "a@b.com", "verification": {"status": "verified"}}],
            "public_metadata": {"role": "admin"},
        });

        let user = parse_created(data).unwrap();
        assert_eq!(user.id, UserId::from("u1"));
    }
}
