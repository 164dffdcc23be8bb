use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use waci_adapter::{
    config::{BaseUrl, Config},
    core::store::{CorrelationStore, MemoryStore},
    orchestrator::{self, Orchestrator},
    server::{create_router, AppState},
    signer::{DocumentSigner, Ed25519Signer},
};

#[derive(Parser, Debug)]
#[command(about = "WACI issuer and verifier adapter")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value = "8080", env = "PORT")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0", env = "HOST")]
    host: String,

    /// Public URL of this server, used to build redirects and issuer identifiers
    #[arg(long, env = "EXTERNAL_URL")]
    external_url: BaseUrl,

    /// Multibase encoded Ed25519 secret (32 byte seed or 64 byte keypair)
    #[arg(long, env = "SIGNING_KEY", hide_env_values = true)]
    signing_key: Option<String>,

    /// Log level
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Pending protocol actions before submitters have to wait
    #[arg(long, default_value = "64", env = "ACTION_QUEUE_CAPACITY")]
    action_queue_capacity: usize,

    /// Token in issued credentials replaced by a fresh `urn:uuid` identifier
    #[arg(long, default_value = "{{credential_id}}", env = "CREDENTIAL_ID_PLACEHOLDER")]
    credential_id_placeholder: String,

    /// Label carried by out-of-band invitations
    #[arg(long, env = "INVITATION_LABEL")]
    invitation_label: Option<String>,

    /// Service (DID or endpoint) carried by out-of-band invitations
    #[arg(long, env = "INVITATION_SERVICE")]
    invitation_service: Option<String>,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            credential_id_placeholder: self.credential_id_placeholder.clone(),
            action_queue_capacity: self.action_queue_capacity,
            invitation_label: self.invitation_label.clone(),
            invitation_service: self.invitation_service.clone(),
            ..Config::new(self.external_url.clone())
        }
    }
}

fn setup_logging(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_level(true))
        .init();
}

fn load_signer(signing_key: Option<&str>) -> Result<Ed25519Signer> {
    match signing_key {
        Some(secret) => Ed25519Signer::from_multibase(secret).context("invalid SIGNING_KEY"),
        None => {
            warn!("SIGNING_KEY not set, signing with an ephemeral key");
            Ed25519Signer::generate().context("failed to generate a signing key")
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    let config = cli.config();
    let signer = DocumentSigner::new(Arc::new(load_signer(cli.signing_key.as_deref())?));
    info!("signing as {}", signer.verification_method());

    let store: Arc<dyn CorrelationStore> = Arc::new(MemoryStore::default());
    let (actions, rx) = orchestrator::channel(config.action_queue_capacity);

    let orchestrator = Orchestrator::from_config(&config, store.clone(), signer.clone());
    tokio::spawn(orchestrator.run(rx));

    let state = Arc::new(AppState::new(&config, store, signer, actions));
    let app = create_router(state);

    let addr = format!("{}:{}", cli.host, cli.port);
    info!("Listening on {addr}, external url {}", config.external_url.as_str());

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
