//! focusd - terminal focus relay
//!
//! Receives chat-platform webhooks (button clicks and threaded replies) and
//! delivers them as input to terminal sessions: locally via the multiplexer,
//! over SSH, or by proxying the signed request to a cooperating peer relay.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser as ClapParser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use focusd::config::{resolve_hostname, RelayConfig};
use focusd::dispatch::{CommandActivator, NoActivator, TerminalActivator, TmuxDispatcher};
use focusd::relay::{RelayRouter, RouterOptions};
use focusd::store::records::{LinkStore, SessionStore, ThreadStore};
use focusd::store::{DocumentStore, FsDocumentStore};
use focusd::webhook::{self, AppState};

/// focusd - terminal focus relay
///
/// Routes chat-platform button clicks and threaded replies to terminal
/// sessions across heterogeneous hosts.
#[derive(ClapParser, Debug)]
#[command(name = "focusd", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the relay daemon.
    Serve {
        /// Address to bind the webhook HTTP server
        #[arg(long, default_value = "127.0.0.1:8787")]
        bind: SocketAddr,

        /// Path to the TOML config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Webhook signing secret (overrides config)
        #[arg(long, env = "FOCUSD_SIGNING_SECRET")]
        signing_secret: Option<String>,

        /// Bot credential for attachment downloads (overrides config)
        #[arg(long, env = "FOCUSD_BOT_TOKEN")]
        bot_token: Option<String>,

        /// Record store directory (overrides config)
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Treat this host as headless even if a display is detected
        #[arg(long)]
        headless: bool,
    },

    /// Validate the config file and print the resolved settings.
    CheckConfig {
        /// Path to the TOML config file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing();

    match cli.command {
        Some(Commands::Serve {
            bind,
            config,
            signing_secret,
            bot_token,
            data_dir,
            headless,
        }) => {
            run_serve(bind, config, signing_secret, bot_token, data_dir, headless).await
        }
        Some(Commands::CheckConfig { config }) => run_check_config(config),
        None => {
            run_serve(
                "127.0.0.1:8787".parse().expect("static default address"),
                None,
                None,
                None,
                None,
                false,
            )
            .await
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "focusd=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

// ── Serve mode ─────────────────────────────────────────────────────

async fn run_serve(
    bind: SocketAddr,
    config_path: Option<PathBuf>,
    signing_secret: Option<String>,
    bot_token: Option<String>,
    data_dir: Option<PathBuf>,
    headless: bool,
) -> anyhow::Result<()> {
    tracing::info!("focusd relay starting");

    let config = load_config(config_path)?;
    let hostname = resolve_hostname(config.server.as_ref());

    let signing_secret = signing_secret.or_else(|| config.signing_secret.clone());
    if signing_secret.is_none() {
        tracing::warn!("no signing secret configured; webhook requests will not be authenticated");
    }
    let bot_token = bot_token.or_else(|| config.bot_token.clone());

    let data_dir = data_dir.unwrap_or_else(|| config.resolve_data_dir());
    tracing::info!(data_dir = %data_dir.display(), "record stores");

    let can_focus = !headless && config.resolve_gui();
    let activator: Arc<dyn TerminalActivator> = match &config.activate_command {
        Some(program) if can_focus => Arc::new(CommandActivator::new(program)),
        _ => Arc::new(NoActivator),
    };

    let router = RelayRouter::new(
        SessionStore::new(store_for(&data_dir, "sessions")),
        LinkStore::new(store_for(&data_dir, "links")),
        ThreadStore::new(store_for(&data_dir, "threads")),
        Arc::new(TmuxDispatcher),
        activator,
        RouterOptions {
            can_focus,
            peer_control_url: config.peer_control_url.clone(),
            bot_token,
            attachment_dir: data_dir.join("attachments"),
        },
    );

    let state = AppState {
        router: Arc::new(router),
        signing_secret,
        hostname: hostname.clone(),
    };

    let app = webhook::router(state);
    tracing::info!(addr = %bind, %hostname, gui = can_focus, "webhook server listening");

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
        })
        .await
        .context("webhook server failed")?;

    Ok(())
}

fn store_for(data_dir: &std::path::Path, kind: &str) -> Arc<dyn DocumentStore> {
    Arc::new(FsDocumentStore::new(data_dir.join(kind)))
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<RelayConfig> {
    let path = path.unwrap_or_else(RelayConfig::default_path);
    let config = RelayConfig::load(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    match config {
        Some(config) => {
            tracing::info!(path = %path.display(), "config loaded");
            Ok(config)
        }
        None => {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            Ok(RelayConfig::default())
        }
    }
}

// ── Config check mode ──────────────────────────────────────────────

fn run_check_config(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let hostname = resolve_hostname(config.server.as_ref());

    println!("hostname:          {hostname}");
    println!(
        "signing secret:    {}",
        if config.signing_secret.is_some() { "configured" } else { "NOT configured" }
    );
    println!(
        "bot token:         {}",
        if config.bot_token.is_some() { "configured" } else { "not configured" }
    );
    println!(
        "peer control url:  {}",
        config.peer_control_url.as_deref().unwrap_or("none")
    );
    println!("data dir:          {}", config.resolve_data_dir().display());
    println!("gui capability:    {}", config.resolve_gui());
    Ok(())
}
