//! Webhook endpoint handlers.
//!
//! Signature verification runs against the raw body before anything is
//! parsed, which is why the handlers take `Bytes` instead of typed
//! extractors. After verification, every branch converges on a fast 2xx:
//! an unparseable or unroutable event is logged and acknowledged so the
//! platform never enters a retry storm over our internal failures.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use percent_encoding::percent_decode_str;

use super::error::ApiError;
use super::signature::{self, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use super::AppState;
use crate::relay::attachments::Attachment;
use crate::relay::{RouteOutcome, SignedRequest};

/// Fixed liveness document; also the target of peer reachability probes.
pub(super) async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "hostname": state.hostname,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /actions`: block-action button clicks, delivered url-encoded with
/// a JSON `payload` field.
pub(super) async fn actions(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    verify(&state, &headers, &body)?;
    let signed = signed_request("/actions", &headers, &body);

    let Some(payload_json) = form_field(&body, "payload") else {
        tracing::warn!("action request without a payload field");
        return Ok(ack());
    };
    let Ok(payload) = serde_json::from_str::<serde_json::Value>(&payload_json) else {
        tracing::warn!("action payload is not valid JSON");
        return Ok(ack());
    };
    let Some(value) = payload["actions"][0]["value"].as_str() else {
        tracing::warn!("action payload carries no button value");
        return Ok(ack());
    };

    let outcome = state.router.route_action(value, &signed).await;
    tracing::info!(?outcome, "action routed");
    Ok(respond(outcome))
}

/// `POST /events`: JSON event deliveries, covering the one-time
/// URL-verification handshake and message events in threads we started.
pub(super) async fn events(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    verify(&state, &headers, &body)?;
    let signed = signed_request("/events", &headers, &body);

    let Ok(event) = serde_json::from_slice::<serde_json::Value>(&body) else {
        tracing::warn!("event body is not valid JSON");
        return Ok(ack());
    };

    match event["type"].as_str() {
        Some("url_verification") => {
            // Echo the challenge back unmodified.
            let challenge = event["challenge"].as_str().unwrap_or_default().to_string();
            return Ok(challenge.into_response());
        }
        Some("event_callback") => {}
        other => {
            tracing::debug!(event_type = ?other, "ignoring event");
            return Ok(ack());
        }
    }

    let message = &event["event"];
    if message["type"].as_str() != Some("message") || message.get("bot_id").is_some() {
        return Ok(ack());
    }
    let Some(thread_id) = message["thread_ts"].as_str() else {
        // Top-level traffic, not a reply in one of our threads.
        return Ok(ack());
    };

    let text = message["text"].as_str().unwrap_or_default();
    let attachments = parse_attachments(message);
    let outcome = state
        .router
        .route_thread_reply(thread_id, text, &attachments, &signed)
        .await;
    tracing::info!(thread_id, ?outcome, "thread reply routed");
    Ok(ack())
}

fn parse_attachments(message: &serde_json::Value) -> Vec<Attachment> {
    message["files"]
        .as_array()
        .map(|files| {
            files
                .iter()
                .filter_map(|f| {
                    Some(Attachment {
                        name: f["name"].as_str().unwrap_or("attachment").to_string(),
                        url: f["url_private"].as_str()?.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Verify the request signature against the raw body. Skipped, loudly,
/// when no secret is configured for this host.
fn verify(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<(), ApiError> {
    let Some(secret) = state.signing_secret.as_deref() else {
        tracing::warn!("no signing secret configured; skipping webhook signature verification");
        return Ok(());
    };

    let timestamp = header_str(headers, TIMESTAMP_HEADER).ok_or(ApiError::SignatureMissing)?;
    let sig = header_str(headers, SIGNATURE_HEADER).ok_or(ApiError::SignatureMissing)?;
    let ts: i64 = timestamp.parse().map_err(|_| ApiError::SignatureInvalid)?;

    if signature::verify(secret, ts, sig, body) {
        Ok(())
    } else {
        Err(ApiError::SignatureInvalid)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Capture the inbound request exactly as delivered, for verbatim replay
/// against a peer.
fn signed_request(path: &'static str, headers: &HeaderMap, body: &Bytes) -> SignedRequest {
    SignedRequest {
        path,
        content_type: header_str(headers, "content-type")
            .unwrap_or("application/octet-stream")
            .to_string(),
        timestamp: header_str(headers, TIMESTAMP_HEADER)
            .unwrap_or_default()
            .to_string(),
        signature: header_str(headers, SIGNATURE_HEADER)
            .unwrap_or_default()
            .to_string(),
        body: body.clone(),
    }
}

fn ack() -> Response {
    ().into_response()
}

/// Capability-gap notices surface as ephemeral messages; everything else is
/// a bare acknowledgment.
fn respond(outcome: RouteOutcome) -> Response {
    match outcome {
        RouteOutcome::Notice(text) => Json(serde_json::json!({
            "response_type": "ephemeral",
            "text": text,
        }))
        .into_response(),
        _ => ack(),
    }
}

/// Pull one field out of an `application/x-www-form-urlencoded` body.
fn form_field(body: &[u8], name: &str) -> Option<String> {
    let body = std::str::from_utf8(body).ok()?;
    body.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key != name {
            return None;
        }
        let value = value.replace('+', " ");
        percent_decode_str(&value)
            .decode_utf8()
            .ok()
            .map(|v| v.into_owned())
    })
}
