//! Peer reachability probe.
//!
//! One bounded GET against the peer's health endpoint. Results are never
//! cached: every routing decision re-probes, trading a little latency for
//! freshness. Retry policy belongs to the router, which never retries the
//! probe either; an unreachable peer simply means local handling.

use std::time::Duration;

/// Overall budget for a single probe, connect included.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// `true` only for a 2xx answer within [`PROBE_TIMEOUT`]. Any network
/// error, timeout or non-2xx status is `false`.
pub async fn probe(client: &reqwest::Client, control_url: &str) -> bool {
    let url = format!("{}/health", control_url.trim_end_matches('/'));
    match client.get(&url).timeout(PROBE_TIMEOUT).send().await {
        Ok(resp) => {
            let reachable = resp.status().is_success();
            if !reachable {
                tracing::debug!(%url, status = %resp.status(), "peer probe refused");
            }
            reachable
        }
        Err(e) => {
            tracing::debug!(%url, error = %e, "peer probe failed");
            false
        }
    }
}
