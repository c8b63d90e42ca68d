//! # ubadge-api: Axum API Service
//!
//! HTTP surface for badge issuance, built on Axum/Tower/Tokio.
//!
//! ## Routes
//!
//! - `/issuers/*`: issuer CRUD, key rotation, revocation, badges,
//!   issuance and invite listing (authenticated)
//! - `/recipients/*`: recipient records (authenticated, admin)
//! - `/issuers/:id/{profile,revocations,intro}`: public issuer documents
//!   and invite redemption (unauthenticated)
//! - `/health/*`: health probes (unauthenticated)
//! - `/openapi.json`: generated OpenAPI document (authenticated)
//!
//! ## Crate Policy
//!
//! - No business logic in route handlers; they delegate to ubadge-issuance.
//! - All errors map to structured HTTP responses via `AppError`.

pub mod auth;
pub mod error;
pub mod extractors;
pub mod openapi;
pub mod routes;
pub mod state;

pub use error::AppError;
pub use state::{AppConfig, AppState};

use axum::middleware::from_fn;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;

/// Assemble the full application router with all routes and middleware.
///
/// Health probes and public issuer documents are mounted outside the auth
/// middleware so wallets and orchestrators reach them without credentials.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };

    // Authenticated API routes.
    let api = Router::new()
        .merge(routes::issuers::router())
        .merge(routes::badges::router())
        .merge(routes::invites::router())
        .merge(routes::recipients::router())
        .merge(openapi::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(auth_config))
        .with_state(state.clone());

    // Unauthenticated issuer documents and invite redemption.
    let public = routes::public::router()
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Unauthenticated health probes.
    let health = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness));

    Router::new().merge(health).merge(public).merge(api)
}

/// Liveness probe: always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: returns 200 when the application is ready to serve.
async fn readiness() -> &'static str {
    "ready"
}
