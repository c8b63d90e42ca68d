//! # ubadge-api: Binary Entry Point
//!
//! Starts the Axum HTTP server. Configuration comes from the environment;
//! see [`AppConfig::from_env`].

use std::sync::Arc;

use ubadge_api::state::{AppConfig, AppState};
use ubadge_issuance::{ArtifactStore, FsArtifacts, InMemoryArtifacts, TracingMailer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env();
    tracing::info!(?config, "configuration loaded");
    if config.auth_token.is_none() {
        tracing::warn!("AUTH_TOKEN not set; every request runs as admin");
    }

    let artifacts: Arc<dyn ArtifactStore> = match &config.artifact_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| {
                tracing::error!(path = %dir.display(), "artifact directory unusable: {e}");
                e
            })?;
            tracing::info!(path = %dir.display(), "writing certificate artifacts to disk");
            Arc::new(FsArtifacts::new(dir.clone(), config.artifact_base_url.clone()))
        }
        None => {
            tracing::warn!("ARTIFACT_DIR not set; certificate artifacts are kept in memory");
            Arc::new(InMemoryArtifacts::new())
        }
    };

    let port = config.port;
    let state = AppState::with_collaborators(config, artifacts, Arc::new(TracingMailer));
    let app = ubadge_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("uBadge API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
