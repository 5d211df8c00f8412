//! Signed-request forwarding.
//!
//! When a webhook addresses a terminal that lives behind a peer relay, the
//! original request is forwarded verbatim: same path, same raw body, same
//! timestamp and signature headers, so the peer can run the exact same
//! verification against the shared signing secret. Nothing is re-signed and
//! nothing is rewritten.

use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;

use crate::webhook::signature::{SIGNATURE_HEADER, TIMESTAMP_HEADER};

/// Overall budget for one proxy attempt.
pub const PROXY_TIMEOUT: Duration = Duration::from_secs(10);

/// The parts of an inbound webhook needed to replay it against a peer.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    /// Request path on this relay, reused on the peer (`/actions`, `/events`).
    pub path: &'static str,
    pub content_type: String,
    pub timestamp: String,
    pub signature: String,
    pub body: Bytes,
}

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("peer unreachable: {0}")]
    Network(#[from] reqwest::Error),

    #[error("peer answered {0}")]
    Status(reqwest::StatusCode),
}

/// Replay `req` against `{control_url}{req.path}`. Success means the peer
/// acknowledged with a 2xx; anything else is a failure the caller turns into
/// local fallback.
pub async fn forward(
    client: &reqwest::Client,
    control_url: &str,
    req: &SignedRequest,
) -> Result<(), ProxyError> {
    let url = format!("{}{}", control_url.trim_end_matches('/'), req.path);
    let mut builder = client
        .post(&url)
        .timeout(PROXY_TIMEOUT)
        .header("content-type", &req.content_type)
        .body(req.body.clone());
    if !req.timestamp.is_empty() {
        builder = builder
            .header(TIMESTAMP_HEADER, &req.timestamp)
            .header(SIGNATURE_HEADER, &req.signature);
    }

    let resp = builder.send().await?;
    if resp.status().is_success() {
        Ok(())
    } else {
        Err(ProxyError::Status(resp.status()))
    }
}
