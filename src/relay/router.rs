//! Relay routing.
//!
//! Every inbound webhook runs the same short pipeline:
//! verify (done by the HTTP layer) → classify → probe → proxy-or-local →
//! acknowledge. The pipeline is sequential with early returns; a proxy
//! failure falls through to local handling exactly once and there is never a
//! second proxy attempt. Every branch ends in an acknowledgment upstream;
//! the platform only sees a non-2xx for a signature rejection.

use std::path::PathBuf;
use std::sync::Arc;

use crate::action::ActionToken;
use crate::address::FocusAddress;
use crate::dispatch::{
    DispatchError, DispatchTarget, InputDispatcher, TerminalActivator,
};
use crate::payload::{self, PayloadTarget};
use crate::relay::attachments::{augment_with_attachments, Attachment};
use crate::relay::probe::probe;
use crate::relay::proxy::{forward, SignedRequest};
use crate::store::records::{LinkStore, SessionStore, ThreadStore};
use crate::webhook::signature::unix_now;

/// How one webhook ended, for logging and the platform-visible response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The original signed request was forwarded and the peer acknowledged.
    Proxied { peer: String },
    /// Literal input reached a pane.
    Dispatched,
    /// The target window was brought to the foreground.
    Focused,
    /// A user-visible, non-fatal notice (capability gap).
    Notice(String),
    /// Dropped with a log line; still acknowledged upstream.
    Dropped(&'static str),
}

/// Host capabilities and credentials the router needs beyond its stores.
pub struct RouterOptions {
    /// Whether this host can bring terminal windows to the foreground.
    pub can_focus: bool,
    /// Control endpoint of the desktop peer, for GUI-bound work arriving at
    /// a headless host.
    pub peer_control_url: Option<String>,
    /// Bot credential for authenticated attachment downloads.
    pub bot_token: Option<String>,
    /// Where downloaded attachments land.
    pub attachment_dir: PathBuf,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            can_focus: false,
            peer_control_url: None,
            bot_token: None,
            attachment_dir: std::env::temp_dir().join("focusd-attachments"),
        }
    }
}

pub struct RelayRouter {
    sessions: SessionStore,
    links: LinkStore,
    threads: ThreadStore,
    dispatcher: Arc<dyn InputDispatcher>,
    activator: Arc<dyn TerminalActivator>,
    client: reqwest::Client,
    options: RouterOptions,
}

impl RelayRouter {
    pub fn new(
        sessions: SessionStore,
        links: LinkStore,
        threads: ThreadStore,
        dispatcher: Arc<dyn InputDispatcher>,
        activator: Arc<dyn TerminalActivator>,
        options: RouterOptions,
    ) -> Self {
        Self {
            sessions,
            links,
            threads,
            dispatcher,
            activator,
            client: reqwest::Client::new(),
            options,
        }
    }

    pub fn threads(&self) -> &ThreadStore {
        &self.threads
    }

    pub fn links(&self) -> &LinkStore {
        &self.links
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Route one button click. `signed` is the inbound request as received,
    /// replayed verbatim if the target belongs to a peer.
    pub async fn route_action(&self, button_value: &str, signed: &SignedRequest) -> RouteOutcome {
        let Some(parsed) = payload::parse(button_value) else {
            tracing::warn!(value = button_value, "unparseable button payload");
            return RouteOutcome::Dropped("unparseable payload");
        };

        let addr = match parsed.target {
            PayloadTarget::Address(addr) => addr,
            PayloadTarget::SessionId(id) => match self.sessions.resolve(&id) {
                Some(addr) => addr,
                None => {
                    tracing::warn!(session_id = %id, "unknown session id in button payload");
                    return RouteOutcome::Dropped("unknown session id");
                }
            },
        };

        self.route(&addr, parsed.action, signed).await
    }

    /// Route one threaded reply. Same pipeline as a button click, keyed by
    /// the Thread Record instead of a Button Payload; the reply text goes to
    /// the pane as-is, with attachment paths appended.
    pub async fn route_thread_reply(
        &self,
        thread_id: &str,
        text: &str,
        attachments: &[Attachment],
        signed: &SignedRequest,
    ) -> RouteOutcome {
        let record = match self.threads.get(thread_id) {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::info!(thread_id, "reply in a thread we did not start");
                return RouteOutcome::Dropped("unknown thread");
            }
            Err(e) => {
                tracing::warn!(thread_id, error = %e, "thread store read failed");
                return RouteOutcome::Dropped("thread store unavailable");
            }
        };

        let Some(addr) = FocusAddress::decode(&record.focus_address) else {
            tracing::warn!(thread_id, address = %record.focus_address, "thread record holds a bad address");
            return RouteOutcome::Dropped("bad thread address");
        };

        if let Some(outcome) = self.try_proxy(&addr, signed).await {
            return outcome;
        }

        let text = augment_with_attachments(
            &self.client,
            self.options.bot_token.as_deref(),
            text,
            attachments,
            &self.options.attachment_dir,
        )
        .await;
        if text.is_empty() {
            tracing::info!(thread_id, "empty reply, nothing to dispatch");
            return RouteOutcome::Dropped("empty reply");
        }
        self.dispatch_text(&addr, &text).await
    }

    async fn route(
        &self,
        addr: &FocusAddress,
        action: ActionToken,
        signed: &SignedRequest,
    ) -> RouteOutcome {
        if let Some(outcome) = self.try_proxy(addr, signed).await {
            return outcome;
        }

        match action.literal_input() {
            None => self.focus(addr).await,
            Some(text) => self.dispatch_text(addr, text).await,
        }
    }

    /// Classify and, when the address belongs to a peer, attempt the single
    /// proxy. `None` means "handle locally": either the address is local or
    /// the peer could not take it.
    async fn try_proxy(&self, addr: &FocusAddress, signed: &SignedRequest) -> Option<RouteOutcome> {
        let peer = self.proxy_candidate(addr)?;

        if !probe(&self.client, &peer).await {
            tracing::info!(%peer, "peer unreachable, handling locally");
            return None;
        }

        match forward(&self.client, &peer, signed).await {
            Ok(()) => {
                tracing::info!(%peer, "request proxied to peer");
                Some(RouteOutcome::Proxied { peer })
            }
            Err(e) => {
                // One attempt only; fall through to local handling.
                tracing::warn!(%peer, error = %e, "proxy failed, handling locally");
                None
            }
        }
    }

    /// The peer control URL that should handle this address instead of us,
    /// if any.
    fn proxy_candidate(&self, addr: &FocusAddress) -> Option<String> {
        match addr {
            // Desktop-bound variants belong to the GUI peer when this
            // process cannot focus anything itself.
            FocusAddress::Gui { .. }
            | FocusAddress::GuiTmux { .. }
            | FocusAddress::Tty { .. } => {
                if self.options.can_focus {
                    None
                } else {
                    self.options.peer_control_url.clone()
                }
            }
            // Link-carrying variants: the cached peer owns the real pane.
            FocusAddress::SshLink { link_id, .. } | FocusAddress::Web { link_id, .. } => self
                .link_record(link_id)
                .map(|record| record.peer_control_url),
            // Plain multiplexer and direct-SSH targets are always ours.
            FocusAddress::Tmux { .. } | FocusAddress::Ssh { .. } => None,
        }
    }

    fn link_record(&self, link_id: &str) -> Option<crate::store::records::LinkRecord> {
        match self.links.get(link_id, unix_now()) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(link_id, error = %e, "link store read failed");
                None
            }
        }
    }

    async fn focus(&self, addr: &FocusAddress) -> RouteOutcome {
        if !self.options.can_focus {
            return RouteOutcome::Notice(
                "This host cannot focus a terminal window. Switch to it on the desktop instead."
                    .to_string(),
            );
        }
        match self.activator.activate(addr).await {
            Ok(()) => RouteOutcome::Focused,
            Err(e) => {
                tracing::warn!(error = %e, "terminal activation failed");
                RouteOutcome::Notice(format!("Could not focus the terminal: {e}"))
            }
        }
    }

    async fn dispatch_text(&self, addr: &FocusAddress, text: &str) -> RouteOutcome {
        let Some(target) = self.dispatch_target(addr) else {
            tracing::warn!(variant = addr.variant_name(), "address has no input pane");
            return RouteOutcome::Dropped("no input pane for this target");
        };

        match self.dispatcher.dispatch(&target, text).await {
            Ok(()) => RouteOutcome::Dispatched,
            Err(DispatchError::PaneNotFound(pane)) => {
                tracing::warn!(%pane, "pane vanished before dispatch");
                RouteOutcome::Dropped("pane not found")
            }
            Err(e) => {
                tracing::error!(error = %e, "dispatch failed");
                RouteOutcome::Dropped("dispatch failed")
            }
        }
    }

    /// Resolve the pane the literal input should land in.
    fn dispatch_target(&self, addr: &FocusAddress) -> Option<DispatchTarget> {
        match addr {
            FocusAddress::Gui { .. } | FocusAddress::Tty { .. } => None,
            FocusAddress::GuiTmux { pane, .. } | FocusAddress::Tmux { pane } => {
                Some(DispatchTarget::Local { pane: pane.clone() })
            }
            FocusAddress::SshLink {
                link_id,
                host,
                user,
                port,
                pane,
            } => {
                // With a link record, fall back into the local pane that
                // renders the linked terminal; without one, go straight over
                // SSH using the coordinates carried in the address.
                if let Some(local) = self.linked_local_target(link_id) {
                    return Some(local);
                }
                Some(DispatchTarget::Ssh {
                    host: host.clone(),
                    user: user.clone(),
                    port: *port,
                    pane: pane.clone(),
                })
            }
            FocusAddress::Ssh {
                host,
                user,
                port,
                pane,
            } => Some(DispatchTarget::Ssh {
                host: host.clone(),
                user: user.clone(),
                port: *port,
                pane: pane.clone(),
            }),
            FocusAddress::Web { link_id, pane } => Some(
                self.linked_local_target(link_id)
                    .unwrap_or(DispatchTarget::Local { pane: pane.clone() }),
            ),
        }
    }

    fn linked_local_target(&self, link_id: &str) -> Option<DispatchTarget> {
        let record = self.link_record(link_id)?;
        match FocusAddress::decode(&record.focus_address)? {
            FocusAddress::Tmux { pane } | FocusAddress::GuiTmux { pane, .. } => {
                Some(DispatchTarget::Local { pane })
            }
            other => {
                tracing::warn!(
                    link_id,
                    variant = other.variant_name(),
                    "link record names a non-pane local address"
                );
                None
            }
        }
    }
}
