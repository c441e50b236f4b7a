use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::anyhow;
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use tokio::net::TcpListener;

use voicelive_bridge::{ServerConfig, routes, state::AppState};

/// Voice Live bridge - relays browser audio to Azure Voice Live
#[derive(Parser, Debug)]
#[command(name = "voicelive-bridge")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Initialize crypto provider for TLS connections
    // This must be done before any TLS connections are attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration from file or environment
    let config = if let Some(config_path) = cli.config {
        println!("Loading configuration from {}", config_path.display());
        ServerConfig::from_file(&config_path)?
    } else {
        ServerConfig::from_env()?
    };

    // Missing Voice Live credentials are fatal at startup
    config.validate().map_err(|e| {
        anyhow!("{e} Set AZURE_VOICELIVE_ENDPOINT and AZURE_VOICELIVE_API_KEY.")
    })?;

    println!("Model: {}", config.voicelive_model);
    println!("Voice: {}", config.voicelive_voice);
    println!(
        "Endpoint: {}",
        config.voicelive_endpoint.as_deref().unwrap_or_default()
    );

    let address = config.address();
    let tls_config = config.tls.clone();
    println!("Starting server on {address}");

    let app = routes::create_app(AppState::new(config));

    // Parse socket address
    let socket_addr: SocketAddr = address
        .parse()
        .map_err(|e| anyhow!("Invalid server address '{}': {}", address, e))?;

    // Start server with or without TLS
    if let Some(tls) = tls_config {
        // Load TLS configuration from certificate and key files
        let rustls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
            .await
            .map_err(|e| {
                anyhow!(
                    "Failed to load TLS certificates from {} and {}: {}",
                    tls.cert_path.display(),
                    tls.key_path.display(),
                    e
                )
            })?;

        println!("Server listening on https://{} (TLS enabled)", socket_addr);

        axum_server::bind_rustls(socket_addr, rustls_config)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|e| anyhow!("TLS server error: {}", e))?;
    } else {
        println!("Server listening on http://{}", socket_addr);

        let listener = TcpListener::bind(&socket_addr).await?;
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
    }

    Ok(())
}
