//! CLI entry point for TaskLinx.
//!
//! This binary provides the `tasklinx` command with subcommands for
//! serving the HTTP API, checking configuration, and printing the Google
//! consent URL.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tasklinx_adapters::{CalendarExecutor, GmailExecutor};
use tasklinx_auth::{CredentialManager, SessionSigner, TokenProvider};
use tasklinx_intent::{IntentInterpreter, TaskOrchestrator};
use tasklinx_llm::LlmClient;
use tasklinx_store::{CredentialStore, Database, HistoryStore};
use tasklinx_web::{AppState, WebServer};

use crate::config::{Config, Sources};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// TaskLinx: natural-language email and calendar automation.
#[derive(Parser)]
#[command(
    name = "tasklinx",
    version,
    about = "TaskLinx: AI-powered email and calendar automation",
    long_about = "Interprets natural-language requests with a language model and carries \
                  them out through Gmail and Google Calendar on the user's behalf."
)]
struct Cli {
    /// Path to a TOML config file (default: config/tasklinx.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API until interrupted.
    Serve,

    /// Show which configuration keys are set and whether the database exists.
    Status,

    /// Print the Google consent URL.
    LoginUrl,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Serve => cmd_serve(config_path).await,
        Commands::Status => cmd_status(config_path).await,
        Commands::LoginUrl => cmd_login_url(config_path).await,
    }
}

// ---------------------------------------------------------------------------
// Subcommand: serve
// ---------------------------------------------------------------------------

async fn cmd_serve(config_path: Option<&std::path::Path>) -> Result<()> {
    init_tracing("info");

    let config = Config::load(config_path)?;
    let db_path = config.db_path();
    let db = Database::open_and_migrate(db_path.clone())
        .await
        .with_context(|| format!("failed to open database {}", db_path.display()))?;
    info!(path = %db_path.display(), "database ready");

    let credentials = Arc::new(credential_manager(&config, db.clone())?);
    let llm = LlmClient::new(config.llm.clone()).context("failed to build LLM client")?;
    info!(model = %llm.default_model(), "language model configured");

    let tokens: Arc<dyn TokenProvider> = credentials.clone();
    let orchestrator = TaskOrchestrator::new(
        IntentInterpreter::new(Arc::new(llm)),
        Arc::new(GmailExecutor::with_base_url(
            tokens.clone(),
            &config.gmail_base_url,
        )),
        Arc::new(CalendarExecutor::with_base_url(
            tokens,
            &config.calendar_base_url,
        )),
        HistoryStore::new(db.clone()),
    );

    let state = AppState {
        credentials,
        orchestrator: Arc::new(orchestrator),
        db,
    };
    let server = WebServer::new(config.web.clone(), state)
        .with_context(|| format!("invalid FRONTEND_URL {}", config.web.frontend_url))?;

    server
        .start(shutdown_signal())
        .await
        .with_context(|| format!("failed to serve on {}:{}", config.web.bind_addr, config.web.port))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

// ---------------------------------------------------------------------------
// Subcommand: status
// ---------------------------------------------------------------------------

async fn cmd_status(config_path: Option<&std::path::Path>) -> Result<()> {
    init_tracing("warn");

    let sources = Sources::gather(config_path)?;

    println!();
    println!("  TaskLinx Status");
    println!("  ===============");
    println!();

    match &sources.file_path {
        Some(p) => println!("  Config file:      OK ({})", p.display()),
        None => println!("  Config file:      NONE (environment only)"),
    }

    let db_path = sources.data_dir().join("tasklinx.db");
    if db_path.exists() {
        println!("  Database:         OK ({})", db_path.display());
    } else {
        println!("  Database:         NOT INITIALIZED ({})", db_path.display());
    }

    println!();
    for (key, set) in sources.report() {
        let shown = if set { "SET" } else { "NOT SET" };
        println!("  {key:<22}{shown}");
    }

    println!();
    match sources.resolve() {
        Ok(_) => println!("  Ready to serve."),
        Err(e) => println!("  Not ready: {e}"),
    }
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: login-url
// ---------------------------------------------------------------------------

async fn cmd_login_url(config_path: Option<&std::path::Path>) -> Result<()> {
    init_tracing("warn");

    let config = Config::load(config_path)?;
    let db = Database::in_memory_migrated()
        .await
        .context("failed to open scratch database")?;
    let url = credential_manager(&config, db)?
        .authorization_url()
        .context("failed to build consent URL")?;
    println!("{url}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn credential_manager(config: &Config, db: Database) -> Result<CredentialManager> {
    let signer = SessionSigner::new(config.secret_key.as_bytes())
        .context("invalid SECRET_KEY")?;
    Ok(CredentialManager::new(
        config.google.clone(),
        signer,
        CredentialStore::new(db),
    ))
}

/// Initialize the tracing subscriber with the given default log level.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
