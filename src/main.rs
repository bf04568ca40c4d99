#![forbid(unsafe_code)]

//! `worker-bridge`: headless host for the panel/worker bridge.
//!
//! Speaks the panel protocol as NDJSON on stdin/stdout, edits an optional
//! document file, persists the conversation per workspace, and supervises
//! the worker process until stdin closes or a shutdown signal arrives.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use worker_bridge::conversation::ConversationLog;
use worker_bridge::host::file_editor::FileEditor;
use worker_bridge::host::log_notifier::LogNotifier;
use worker_bridge::host::stdio::{run_panel_reader, run_panel_writer, StdioPanel};
use worker_bridge::host::{Editor, Host, Notifier};
use worker_bridge::persistence::state_repo::StateRepo;
use worker_bridge::persistence::{db, StateStore};
use worker_bridge::router::{Router, RouterOptions};
use worker_bridge::supervisor::Supervisor;
use worker_bridge::worker::spawner::SpawnConfig;
use worker_bridge::{AppError, BridgeConfig, Result};

/// Capacity of the worker event channel.
const EVENT_QUEUE: usize = 256;

/// Capacity of the panel request channel.
const PANEL_QUEUE: usize = 64;

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "worker-bridge", about = "Panel to worker process bridge", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file; built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the workspace root.
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// Document file that code insertions are typed into.
    #[arg(long)]
    document: Option<PathBuf>,

    /// Answer "yes" to code-insertion confirmations.
    #[arg(long)]
    assume_yes: bool,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("worker-bridge bootstrap");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?;
    let result = runtime.block_on(run(args));
    // Stdin reads park a blocking thread; do not wait on it forever.
    runtime.shutdown_timeout(Duration::from_secs(1));
    result
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let config = BridgeConfig::load(args.config.as_deref(), args.workspace.as_deref())?;
    info!(workspace = %config.workspace_root.display(), "configuration loaded");

    // ── Open persisted conversation ─────────────────────
    let db = Arc::new(db::connect(&config.state_db_path()).await?);
    let store: Arc<dyn StateStore> = Arc::new(StateRepo::new(db, config.workspace_scope()));
    let log = Arc::new(ConversationLog::open(store, config.conversation.state_key.clone()).await?);
    info!("conversation store opened");

    // ── Build host collaborators ────────────────────────
    let (panel, panel_rx) = StdioPanel::new();
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier::new(args.assume_yes));
    let editor: Arc<dyn Editor> = match args.document {
        Some(path) => Arc::new(FileEditor::open(path).await?),
        None => Arc::new(FileEditor::detached()),
    };
    let host = Host {
        panel: Arc::new(panel),
        notifier: Arc::clone(&notifier),
        editor,
    };

    // ── Wire supervisor and router ──────────────────────
    let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE);
    let supervisor = Arc::new(Supervisor::new(
        SpawnConfig::from(&config),
        event_tx,
        notifier,
    ));
    let router = Arc::new(Router::new(
        Arc::clone(&supervisor),
        log,
        host,
        RouterOptions {
            pacing: config.pacing(),
            honor_worker_edits: config.editor.honor_worker_edits,
        },
    ));

    let ct = CancellationToken::new();
    let writer_handle = tokio::spawn(run_panel_writer(tokio::io::stdout(), panel_rx, ct.clone()));
    let router_handle = tokio::spawn(Arc::clone(&router).run(event_rx, ct.clone()));

    router.attach_panel().await;

    if supervisor.start().await.is_err() {
        warn!("worker not started; the next startListening request retries");
    }

    let (panel_tx, mut panel_requests) = mpsc::channel(PANEL_QUEUE);
    let reader_handle = tokio::spawn(run_panel_reader(tokio::io::stdin(), panel_tx, ct.clone()));

    info!("bridge ready");

    // ── Serve panel requests until shutdown ─────────────
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
            request = panel_requests.recv() => match request {
                Some(message) => router.handle_panel(message).await,
                None => {
                    info!("panel input closed");
                    break;
                }
            },
        }
    }

    router.shutdown().await;
    ct.cancel();

    let (writer_result, _, _) = tokio::join!(writer_handle, router_handle, reader_handle);
    if let Ok(Err(err)) = writer_result {
        warn!(%err, "panel writer failed");
    }
    info!("worker-bridge shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
