use std::{path::PathBuf, process::ExitCode, time::Duration};

use clap::Parser;
use saml_acs_auth::{
    auth::SamlAuthProvider,
    config::{AppConfig, ConfigError},
    observability::{TracingError, init_tracing},
    routes::{AppState, build_app},
};

#[derive(Parser, Debug)]
#[command(name = "saml-acs-auth")]
#[command(about = "SAML 2.0 HTTP-POST assertion consumer issuing signed session tokens", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file
    #[arg(short, long, global = true, default_value = "saml.toml")]
    config: PathBuf,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Start the server (default)
    Serve,
    /// Load the configuration and IdP metadata, report, and exit
    Check,
}

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Tracing(#[from] TracingError),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // The subscriber may not be installed yet.
            eprintln!("Error: {e}");
            tracing::error!(error = %e, "Startup failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), StartupError> {
    let config = AppConfig::from_file(&args.config)?;
    init_tracing(&config.observability)?;

    tracing::info!(config = %args.config.display(), "Configuration loaded");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;
    let provider = SamlAuthProvider::from_config(&config.saml, &client).await?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Check => {
            println!(
                "Configuration OK: {} ACS binding(s), authentication endpoint {}",
                provider.binding_count(),
                provider.auth_endpoint()
            );
            Ok(())
        }
        Command::Serve => serve(&config, provider).await,
    }
}

async fn serve(config: &AppConfig, provider: SamlAuthProvider) -> Result<(), StartupError> {
    let app = build_app(config, AppState::new(provider));

    let addr = config.server.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })?;

    tracing::info!(
        auth_url_path = %config.saml.auth_url_path,
        "Server listening on http://{}",
        addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(StartupError::Serve)?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
