//! Integration tests for the proxy-or-local routing decision:
//! - foreign addresses forwarded verbatim to a reachable peer
//! - probe/proxy failure falling back to local handling exactly once
//! - capability gaps answered with an ephemeral notice
//! - legacy session-id payload resolution

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use tokio::net::TcpListener;

use focusd::action::ActionToken;
use focusd::address::FocusAddress;
use focusd::dispatch::{DispatchError, DispatchTarget, InputDispatcher, NoActivator};
use focusd::payload;
use focusd::relay::{RelayRouter, RouterOptions};
use focusd::store::records::{LinkRecord, LinkStore, SessionRecord, SessionStore, ThreadStore};
use focusd::store::MemDocumentStore;
use focusd::webhook::signature::{sign, unix_now, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use focusd::webhook::{router, AppState};

const SECRET: &str = "test-signing-secret";

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<(DispatchTarget, String)>>,
}

#[async_trait]
impl InputDispatcher for Recorder {
    async fn dispatch(&self, target: &DispatchTarget, text: &str) -> Result<(), DispatchError> {
        self.calls.lock().push((target.clone(), text.to_string()));
        Ok(())
    }
}

struct TestRelay {
    addr: SocketAddr,
    relay: Arc<RelayRouter>,
    dispatcher: Arc<Recorder>,
}

async fn start_relay(options: RouterOptions) -> TestRelay {
    let store = Arc::new(MemDocumentStore::new());
    let dispatcher = Arc::new(Recorder::default());
    let relay = Arc::new(RelayRouter::new(
        SessionStore::new(store.clone()),
        LinkStore::new(store.clone()),
        ThreadStore::new(store),
        dispatcher.clone(),
        Arc::new(NoActivator),
        options,
    ));
    let state = AppState {
        router: relay.clone(),
        signing_secret: Some(SECRET.to_string()),
        hostname: "test-host".to_string(),
    };
    let app = router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestRelay {
        addr,
        relay,
        dispatcher,
    }
}

/// What a fake peer relay observed.
#[derive(Default)]
struct PeerSeen {
    actions_hits: AtomicUsize,
    last_body: Mutex<String>,
    last_signature: Mutex<String>,
}

/// Spawn a fake peer. `healthy` controls `/health`; `accepts` controls
/// whether `/actions` acknowledges or errors.
async fn start_peer(seen: Arc<PeerSeen>, healthy: bool, accepts: bool) -> String {
    use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::get, routing::post, Router};

    let app = Router::new()
        .route(
            "/health",
            get(move || async move {
                if healthy {
                    (StatusCode::OK, "ok")
                } else {
                    (StatusCode::SERVICE_UNAVAILABLE, "down")
                }
            }),
        )
        .route(
            "/actions",
            post(
                move |State(seen): State<Arc<PeerSeen>>, headers: HeaderMap, body: String| async move {
                    seen.actions_hits.fetch_add(1, Ordering::SeqCst);
                    *seen.last_body.lock() = body;
                    *seen.last_signature.lock() = headers
                        .get(SIGNATURE_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    if accepts {
                        StatusCode::OK
                    } else {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                },
            ),
        )
        .with_state(seen);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// A control URL where nothing listens, for connection-refused probes.
async fn dead_peer_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

fn actions_body(value: &str) -> String {
    let payload = serde_json::json!({
        "type": "block_actions",
        "actions": [{ "value": value }],
    })
    .to_string();
    format!(
        "payload={}",
        utf8_percent_encode(&payload, NON_ALPHANUMERIC)
    )
}

async fn post_actions(addr: SocketAddr, body: String) -> reqwest::Response {
    let ts = unix_now();
    let sig = sign(SECRET, ts, body.as_bytes());
    reqwest::Client::new()
        .post(format!("http://{addr}/actions"))
        .header("content-type", "application/x-www-form-urlencoded")
        .header(TIMESTAMP_HEADER, ts.to_string())
        .header(SIGNATURE_HEADER, sig)
        .body(body)
        .send()
        .await
        .unwrap()
}

fn ssh_link_addr() -> FocusAddress {
    FocusAddress::SshLink {
        link_id: "buildbox".into(),
        host: "build.example.com".into(),
        user: "ci".into(),
        port: 22,
        pane: "agents:2.1".into(),
    }
}

fn link_record(peer_control_url: &str) -> LinkRecord {
    LinkRecord {
        link_id: "buildbox".into(),
        display_name: "build box".into(),
        variant_type: "ssh-link".into(),
        target_descriptor: "ci@build.example.com:agents:2.1".into(),
        focus_address: FocusAddress::Tmux {
            pane: "local:0.1".into(),
        }
        .encode()
        .unwrap(),
        peer_control_url: peer_control_url.to_string(),
        created_at: unix_now(),
    }
}

// ── Test 1: reachable peer receives the original signed request ───

#[tokio::test]
async fn foreign_link_proxies_verbatim_to_reachable_peer() {
    let seen = Arc::new(PeerSeen::default());
    let peer_url = start_peer(seen.clone(), true, true).await;

    let relay = start_relay(RouterOptions::default()).await;
    relay.relay.links().put(&link_record(&peer_url)).unwrap();

    let body = actions_body(&payload::build(&ssh_link_addr(), ActionToken::Continue).unwrap());
    let resp = post_actions(relay.addr, body.clone()).await;
    assert_eq!(resp.status(), 200);

    assert_eq!(seen.actions_hits.load(Ordering::SeqCst), 1);
    assert_eq!(*seen.last_body.lock(), body, "body forwarded unchanged");
    assert!(
        seen.last_signature.lock().starts_with("v0="),
        "signature header forwarded"
    );
    assert!(
        relay.dispatcher.calls.lock().is_empty(),
        "no local dispatch after a successful proxy"
    );
}

// ── Test 2: unreachable peer falls back to local dispatch ─────────

#[tokio::test]
async fn unreachable_peer_falls_back_to_local_dispatch() {
    let peer_url = dead_peer_url().await;

    let relay = start_relay(RouterOptions::default()).await;
    relay.relay.links().put(&link_record(&peer_url)).unwrap();

    let body = actions_body(&payload::build(&ssh_link_addr(), ActionToken::Continue).unwrap());
    let resp = post_actions(relay.addr, body).await;
    assert_eq!(resp.status(), 200, "fallback still acknowledges");

    let calls = relay.dispatcher.calls.lock();
    assert_eq!(calls.len(), 1, "exactly one local dispatch");
    assert_eq!(
        calls[0],
        (
            DispatchTarget::Local {
                pane: "local:0.1".into()
            },
            "continue".into()
        )
    );
}

// ── Test 3: a failing proxy is attempted exactly once ─────────────

#[tokio::test]
async fn failing_proxy_attempted_once_then_local() {
    // Peer probes healthy but rejects the forwarded request.
    let seen = Arc::new(PeerSeen::default());
    let peer_url = start_peer(seen.clone(), true, false).await;

    let relay = start_relay(RouterOptions::default()).await;
    relay.relay.links().put(&link_record(&peer_url)).unwrap();

    let body = actions_body(&payload::build(&ssh_link_addr(), ActionToken::Push).unwrap());
    let resp = post_actions(relay.addr, body).await;
    assert_eq!(resp.status(), 200);

    assert_eq!(
        seen.actions_hits.load(Ordering::SeqCst),
        1,
        "never a second proxy attempt"
    );
    let calls = relay.dispatcher.calls.lock();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, "push");
}

// ── Test 4: unhealthy peer skips the proxy entirely ───────────────

#[tokio::test]
async fn unhealthy_peer_skips_proxy_and_dispatches_locally() {
    let seen = Arc::new(PeerSeen::default());
    let peer_url = start_peer(seen.clone(), false, true).await;

    let relay = start_relay(RouterOptions::default()).await;
    relay.relay.links().put(&link_record(&peer_url)).unwrap();

    let body = actions_body(&payload::build(&ssh_link_addr(), ActionToken::Reply1).unwrap());
    let resp = post_actions(relay.addr, body).await;
    assert_eq!(resp.status(), 200);

    assert_eq!(
        seen.actions_hits.load(Ordering::SeqCst),
        0,
        "a failed probe means no forward at all"
    );
    assert_eq!(relay.dispatcher.calls.lock()[0].1, "1");
}

// ── Test 5: focus on a headless host yields an ephemeral notice ───

#[tokio::test]
async fn focus_on_headless_host_returns_ephemeral_notice() {
    let relay = start_relay(RouterOptions::default()).await;

    let tmux = FocusAddress::Tmux {
        pane: "main:0.0".into(),
    };
    let body = actions_body(&payload::build(&tmux, ActionToken::Focus).unwrap());
    let resp = post_actions(relay.addr, body).await;
    assert_eq!(resp.status(), 200);

    let notice: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(notice["response_type"], "ephemeral");
    assert!(notice["text"]
        .as_str()
        .is_some_and(|t| t.contains("cannot focus")));
    assert!(relay.dispatcher.calls.lock().is_empty());
}

// ── Test 6: GUI-bound work on a headless host goes to the peer ────

#[tokio::test]
async fn gui_variant_on_headless_host_proxies_to_configured_peer() {
    let seen = Arc::new(PeerSeen::default());
    let peer_url = start_peer(seen.clone(), true, true).await;

    let relay = start_relay(RouterOptions {
        peer_control_url: Some(peer_url),
        ..Default::default()
    })
    .await;

    let gui = FocusAddress::Gui { pid: 4242 };
    let body = actions_body(&payload::build(&gui, ActionToken::Focus).unwrap());
    let resp = post_actions(relay.addr, body).await;
    assert_eq!(resp.status(), 200);

    assert_eq!(seen.actions_hits.load(Ordering::SeqCst), 1);
    assert!(relay.dispatcher.calls.lock().is_empty());
}

// ── Test 7: legacy session ids resolve through the registry ───────

#[tokio::test]
async fn legacy_session_id_routes_through_registry() {
    let relay = start_relay(RouterOptions::default()).await;
    let record = SessionRecord::new(
        "claude",
        &FocusAddress::Tmux {
            pane: "work:1.0".into(),
        },
        "test-host",
        unix_now(),
    )
    .unwrap();
    relay.relay.sessions().put(&record).unwrap();

    let body = actions_body(&payload::build_legacy(&record.id, ActionToken::Reply2).unwrap());
    let resp = post_actions(relay.addr, body).await;
    assert_eq!(resp.status(), 200);

    let calls = relay.dispatcher.calls.lock();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0],
        (
            DispatchTarget::Local {
                pane: "work:1.0".into()
            },
            "2".into()
        )
    );
}

// ── Test 8: unknown legacy ids are dropped with a fast 200 ────────

#[tokio::test]
async fn unknown_session_id_acknowledged_without_dispatch() {
    let relay = start_relay(RouterOptions::default()).await;

    let body = actions_body("sess-nobody-home|push");
    let resp = post_actions(relay.addr, body).await;
    assert_eq!(resp.status(), 200);
    assert!(relay.dispatcher.calls.lock().is_empty());
}
