use std::sync::Arc;

use agentsync::adapters::HttpThreadFetcher;
use agentsync::cli::{parse_args, CliCommand, RunOptions, USAGE, VERSION};
use agentsync::config::SyncConfig;
use agentsync::connection::{ConnectionAdapter, ConnectionConfig};
use agentsync::loading::LoadingState;
use agentsync::logging::{init_logging, LogFormat};
use agentsync::runtime::{ChatRuntime, RuntimeCommand};
use agentsync::traits::StaticAuth;

use color_eyre::Result;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Identity reported to the auth check
const ENV_USER_ID: &str = "AGENTSYNC_USER_ID";
/// Bearer token for the thread fetch API
const ENV_API_TOKEN: &str = "AGENTSYNC_API_TOKEN";

fn main() -> Result<()> {
    let options = match parse_args(std::env::args()) {
        CliCommand::Version => {
            println!("agentsync {}", VERSION);
            return Ok(());
        }
        CliCommand::Help => {
            println!("{}", USAGE);
            return Ok(());
        }
        CliCommand::Invalid(message) => {
            eprintln!("Error: {}\n{}", message, USAGE);
            std::process::exit(2);
        }
        CliCommand::Run(options) => options,
    };

    color_eyre::install()?;
    init_logging(LogFormat::from_env())?;

    let mut config = SyncConfig::from_env()?;
    if let Some(url) = options.url.clone() {
        config = config.with_ws_url(url);
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_headless(config, options));
    Ok(())
}

async fn run_headless(config: SyncConfig, options: RunOptions) {
    info!(url = %config.ws_url, api_base = %config.api_base, "Starting agentsync {}", VERSION);

    let transport = Arc::new(ConnectionAdapter::connect(ConnectionConfig::from(&config)));
    let mut fetcher = HttpThreadFetcher::from_config(&config);
    if let Ok(token) = std::env::var(ENV_API_TOKEN) {
        fetcher = fetcher.with_auth(token);
    }
    let user_id = std::env::var(ENV_USER_ID).unwrap_or_else(|_| "headless".to_string());
    let auth = StaticAuth::authenticated(user_id);

    let mut chat = ChatRuntime::new(transport, Arc::new(fetcher), auth, &config);
    let (command_tx, command_rx) = mpsc::unbounded_channel();

    if let Some(thread_id) = options.thread.clone() {
        let _ = command_tx.send(RuntimeCommand::SwitchTo(thread_id.clone()));

        if let Some(content) = options.send.clone() {
            let mut snapshots = chat.subscribe_snapshots();
            let send_tx = command_tx.clone();
            tokio::spawn(async move {
                // Send once the requested thread is on screen
                loop {
                    {
                        let snapshot = snapshots.borrow_and_update();
                        let ready = matches!(
                            snapshot.loading,
                            LoadingState::Ready | LoadingState::ThreadReady
                        );
                        if ready && snapshot.thread_id.as_deref() == Some(thread_id.as_str()) {
                            let _ = send_tx.send(RuntimeCommand::SendMessage(content));
                            return;
                        }
                    }
                    if snapshots.changed().await.is_err() {
                        return;
                    }
                }
            });
        }
    }

    let shutdown_tx = command_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        info!("Ctrl-C received, shutting down");
        let _ = shutdown_tx.send(RuntimeCommand::Shutdown);
    });

    chat.run(command_rx).await;

    let metrics = chat.router_metrics();
    info!(
        processed = metrics.processed_count,
        dropped = metrics.dropped_count,
        errors = metrics.error_count,
        ignored = metrics.ignored_count,
        "Router totals"
    );
}
