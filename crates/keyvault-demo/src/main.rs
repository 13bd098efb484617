//! # keyvault-demo
//!
//! Walks one secret through its whole lifecycle against the configured vault,
//! or hosts the in-memory vault on a Unix socket for other processes.
//!
//! ```bash
//! # Run the lifecycle against the in-memory vault
//! keyvault-demo
//!
//! # Host a vault, then run the lifecycle against it from another shell
//! keyvault-demo serve --socket /tmp/keyvault.sock
//! keyvault-demo run --backend rpc --socket /tmp/keyvault.sock
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use tracing::info;

use keyvault_core::config::{ConfigFile, ConfigLevel, ConfigProvider, FileConfigProvider};
use keyvault_core::{Logger, PropertiesUpdate, SecretAttributes, SecretClient, TracingLogger};

#[derive(Parser, Debug)]
#[command(name = "keyvault-demo", version, about = "Secret lifecycle walkthrough")]
struct Cli {
    /// Config file (defaults to ~/.config/keyvault/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Set, read, list, update, delete and purge one secret (default)
    Run(RunArgs),
    /// Host the in-memory vault over JSON-RPC until interrupted
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Vault URL used in secret identifiers
    #[arg(long)]
    vault_url: Option<String>,

    /// Backend name ("memory" or "rpc")
    #[arg(long)]
    backend: Option<String>,

    /// Socket of the vault when using the rpc backend
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Secret to walk through the lifecycle
    #[arg(long, default_value = "BankAccountSecret")]
    secret_name: String,

    /// Seconds to wait for the delete to finish
    #[arg(long)]
    timeout: Option<u64>,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            vault_url: None,
            backend: None,
            socket: None,
            secret_name: "BankAccountSecret".to_string(),
            timeout: None,
        }
    }
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Socket to listen on (defaults to the runtime directory)
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Require clients to present this token
    #[arg(long)]
    auth_token: Option<String>,
}

fn load_config(path: Option<PathBuf>) -> Result<ConfigFile> {
    let provider = match path {
        Some(path) => FileConfigProvider::new(path, ConfigLevel::User),
        None => FileConfigProvider::user(),
    };
    let mut config = provider
        .load()
        .with_context(|| format!("Failed to load config from {}", provider.path().display()))?;
    config.apply_env_overrides();
    Ok(config)
}

async fn run(mut config: ConfigFile, args: RunArgs) -> Result<()> {
    if let Some(url) = args.vault_url {
        config.vault.url = url;
    }
    if let Some(backend) = args.backend {
        config.vault.backend = backend;
    }
    if let Some(socket) = args.socket {
        config.vault.socket_path = Some(socket);
    }
    config.validate().context("Invalid configuration")?;

    let timeout = args
        .timeout
        .or(config.polling.timeout_secs)
        .map(Duration::from_secs);
    let name = args.secret_name.as_str();

    let logger: Arc<dyn Logger> = Arc::new(TracingLogger::new());
    let client = SecretClient::from_config(&config, logger).context("Failed to create vault client")?;
    info!("Using backend {} at {}", client.backend().name(), config.vault.url);

    // Bank account credentials valid for one year; setting an existing name
    // adds a new version.
    client
        .set_secret(
            name,
            "f4G34fMh8v".into(),
            SecretAttributes::new().with_expires_on(Utc::now() + chrono::Duration::days(365)),
        )
        .await?;

    let bank_secret = client.get_secret(name, None).await?;
    println!(
        "Secret is returned with name {} and value {}",
        bank_secret.name(),
        bank_secret.value()
    );

    // Listing returns properties only, so fetch each value by version
    let mut listed = client.list_secret_properties(None);
    while let Some(properties) = listed.next().await {
        let properties = properties?;
        let with_value = client
            .get_secret(&properties.name, Some(&properties.version))
            .await?;
        println!(
            "Retrieved secret with name \"{}\" and value \"{}\"",
            with_value.name(),
            with_value.value()
        );
    }

    // Extend the expiry; updates cannot change the value
    let updated = client
        .update_properties(
            name,
            bank_secret.version(),
            PropertiesUpdate::new().with_expires_on(Utc::now() + chrono::Duration::days(365)),
        )
        .await?;
    match updated.expires_on {
        Some(expires_on) => println!("Secret's updated expiry time {}", expires_on.to_rfc3339()),
        None => println!("Secret has no expiry time"),
    }

    // A new value means a new version
    client
        .set_secret(
            name,
            "bhjd4DDgsa".into(),
            SecretAttributes::new().with_expires_on(Utc::now() + chrono::Duration::days(365)),
        )
        .await?;

    let poller = client.begin_delete(name).await?;
    let response = poller.poll().await?;
    if let Some(deleted) = &response.value {
        println!("Deleted Date {}", deleted.deleted_on.to_rfc3339());
        match &deleted.recovery_id {
            Some(recovery_id) => println!("Deleted Secret's Recovery Id {}", recovery_id),
            None => println!("Deleted Secret has no Recovery Id (soft-delete is off)"),
        }
    }

    let deleted = poller
        .wait_for_completion(timeout)
        .await
        .with_context(|| format!("Waiting for {} to be deleted", name))?;

    // Without soft-delete the secret is already gone
    if client.capabilities().await?.soft_delete {
        client.purge(deleted.name()).await?;
        println!("Purged {}", deleted.name());
    }

    Ok(())
}

#[cfg(unix)]
async fn serve(config: ConfigFile, args: ServeArgs) -> Result<()> {
    use keyvault_core::rpc::default_socket_path;
    use keyvault_core::{CancellationToken, MemoryVaultBackend, RpcVaultServer};
    use tokio::net::UnixListener;

    config.validate().context("Invalid configuration")?;

    let socket_path = args
        .socket
        .or_else(|| config.vault.socket_path.clone())
        .unwrap_or_else(|| default_socket_path(false));
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    if socket_path.exists() {
        std::fs::remove_file(&socket_path)
            .with_context(|| format!("Failed to remove stale socket {}", socket_path.display()))?;
    }

    let listener = UnixListener::bind(&socket_path)
        .with_context(|| format!("Failed to bind {}", socket_path.display()))?;

    let logger: Arc<dyn Logger> = Arc::new(TracingLogger::new());
    let backend = Arc::new(MemoryVaultBackend::with_config(
        config.memory_backend_config(),
        Arc::clone(&logger),
    ));
    let server = Arc::new(RpcVaultServer::new(backend, args.auth_token, logger));

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    info!("Serving in-memory vault on {}", socket_path.display());
    server.serve(listener, shutdown).await?;

    let _ = std::fs::remove_file(&socket_path);
    Ok(())
}

#[cfg(not(unix))]
async fn serve(_config: ConfigFile, _args: ServeArgs) -> Result<()> {
    anyhow::bail!("serve needs Unix domain sockets")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keyvault_demo=info,keyvault=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config)?;

    match cli.command.unwrap_or_else(|| Command::Run(RunArgs::default())) {
        Command::Run(args) => run(config, args).await,
        Command::Serve(args) => serve(config, args).await,
    }
}
