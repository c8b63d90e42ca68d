//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! The directory and invite book are in-memory stores shared by handle;
//! cloning `AppState` is cheap and every clone sees the same records. The
//! orchestrator holds clones of the same handles plus the artifact store
//! and mailer chosen at startup.

use std::path::PathBuf;
use std::sync::Arc;

use ubadge_issuance::{
    ArtifactStore, Directory, EmailDispatcher, InMemoryArtifacts, InviteBook,
    IssuanceOrchestrator, IssuanceSettings, PublicUrls, TracingMailer,
};
use ubadge_issuance::orchestrator::{DEFAULT_MAIL_FROM, DEFAULT_MAIL_SUBJECT};

/// Runtime configuration, read from the environment by the binary.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Shared bearer secret. If `None`, authentication is disabled.
    pub auth_token: Option<String>,
    /// Public base URL used in issuer documents and certificates.
    pub api_url: String,
    /// Directory for certificate artifacts. `None` keeps them in memory.
    pub artifact_dir: Option<PathBuf>,
    /// Public URL prefix for filesystem artifacts.
    pub artifact_base_url: Option<String>,
    pub mail_from: String,
    pub mail_subject: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("api_url", &self.api_url)
            .field("artifact_dir", &self.artifact_dir)
            .field("artifact_base_url", &self.artifact_base_url)
            .field("mail_from", &self.mail_from)
            .field("mail_subject", &self.mail_subject)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
            api_url: "http://localhost:8080".to_string(),
            artifact_dir: None,
            artifact_base_url: None,
            mail_from: DEFAULT_MAIL_FROM.to_string(),
            mail_subject: DEFAULT_MAIL_SUBJECT.to_string(),
        }
    }
}

impl AppConfig {
    /// Read configuration from environment variables, falling back to the
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        let port: u16 = var("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);

        Self {
            port,
            auth_token: var("AUTH_TOKEN"),
            api_url: var("API_URL").unwrap_or_else(|| format!("http://localhost:{port}")),
            artifact_dir: var("ARTIFACT_DIR").map(PathBuf::from),
            artifact_base_url: var("ARTIFACT_BASE_URL"),
            mail_from: var("MAIL_FROM").unwrap_or(defaults.mail_from),
            mail_subject: var("MAIL_SUBJECT").unwrap_or(defaults.mail_subject),
        }
    }

    /// Orchestrator settings derived from this configuration.
    pub fn issuance_settings(&self) -> IssuanceSettings {
        IssuanceSettings {
            urls: PublicUrls::new(self.api_url.clone()),
            mail_from: self.mail_from.clone(),
            mail_subject: self.mail_subject.clone(),
        }
    }
}

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub directory: Directory,
    pub invites: InviteBook,
    pub orchestrator: Arc<IssuanceOrchestrator>,
    pub config: AppConfig,
}

impl AppState {
    /// Default configuration, in-memory artifacts, and a logging mailer.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    /// The given configuration with in-memory artifacts and a logging mailer.
    pub fn with_config(config: AppConfig) -> Self {
        Self::with_collaborators(
            config,
            Arc::new(InMemoryArtifacts::new()),
            Arc::new(TracingMailer),
        )
    }

    /// Full control over the artifact store and mailer.
    pub fn with_collaborators(
        config: AppConfig,
        artifacts: Arc<dyn ArtifactStore>,
        mailer: Arc<dyn EmailDispatcher>,
    ) -> Self {
        let directory = Directory::new();
        let invites = InviteBook::new();
        let orchestrator = IssuanceOrchestrator::new(
            directory.clone(),
            invites.clone(),
            artifacts,
            mailer,
            config.issuance_settings(),
        );
        Self {
            directory,
            invites,
            orchestrator: Arc::new(orchestrator),
            config,
        }
    }

    /// Public URL builder for issuer documents.
    pub fn urls(&self) -> &PublicUrls {
        &self.orchestrator.settings().urls
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
