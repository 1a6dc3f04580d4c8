use anyhow::Context;
use clap::Parser;
use ragdoc_app_server::AppState;
use ragdoc_app_server::ServerConfig;
use ragdoc_app_server::router;
use tokio::net::TcpListener;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Question answering over uploaded PDFs, with streamed and cited answers.
#[derive(Parser, Debug)]
#[command(name = "ragdoc-app-server", version)]
struct Cli {
    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8000)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    let cli = Cli::parse();
    let config = ServerConfig::from_env().context("invalid configuration")?;
    if !config.has_api_key() {
        warn!("OPENAI_API_KEY is not set; uploads and chat will be rejected");
    }

    let max_upload_bytes = config.max_upload_bytes;
    let state = AppState::from_config(&config).context("failed to build RAG engine")?;
    let app = router(state, max_upload_bytes);

    let listener = TcpListener::bind((cli.host.as_str(), cli.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", cli.host, cli.port))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
