//! # Public Issuer Endpoints
//!
//! Unauthenticated endpoints used by certificate wallets and verifiers:
//! the issuer profile, its revocation list, and the introduction endpoint
//! where a recipient redeems an invite code by supplying their address.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use ubadge_core::IssuerId;
use ubadge_issuance::{
    issuer_profile, revocation_list, AcceptanceReport, BadgeStatus, IssuerProfile, RevocationList,
};

use crate::error::AppError;
use crate::extractors::{extract_validated_json, non_blank, Validate};
use crate::routes::issuers::load_issuer;
use crate::routes::run_blocking;
use crate::state::AppState;

/// Invite redemption request, as posted by a wallet.
#[derive(Debug, Deserialize, ToSchema)]
pub struct IntroductionRequest {
    /// The invite code from the email.
    pub nonce: String,
    /// The recipient's public key/address for this issuer.
    #[serde(rename = "bitcoinAddress")]
    pub bitcoin_address: String,
}

impl Validate for IntroductionRequest {
    fn validate(&self) -> Result<(), String> {
        non_blank("nonce", &self.nonce)?;
        non_blank("bitcoinAddress", &self.bitcoin_address)
    }
}

/// Status of one badge replayed on redemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReplayStatus {
    Certified,
    Failed,
}

/// Outcome for one accumulated badge.
#[derive(Debug, Serialize, ToSchema)]
pub struct BadgeResult {
    pub badge_id: Uuid,
    pub status: ReplayStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Redemption report.
#[derive(Debug, Serialize, ToSchema)]
pub struct IntroductionResponse {
    pub recipient_id: Uuid,
    pub issuer_id: Uuid,
    pub results: Vec<BadgeResult>,
}

impl From<AcceptanceReport> for IntroductionResponse {
    fn from(report: AcceptanceReport) -> Self {
        Self {
            recipient_id: *report.recipient_id.as_uuid(),
            issuer_id: *report.issuer_id.as_uuid(),
            results: report
                .outcomes
                .into_iter()
                .map(|outcome| match outcome.status {
                    BadgeStatus::Certified(cert) => BadgeResult {
                        badge_id: *outcome.badge_id.as_uuid(),
                        status: ReplayStatus::Certified,
                        certificate_id: Some(*cert.id.as_uuid()),
                        reason: None,
                    },
                    BadgeStatus::Failed { reason } => BadgeResult {
                        badge_id: *outcome.badge_id.as_uuid(),
                        status: ReplayStatus::Failed,
                        certificate_id: None,
                        reason: Some(reason),
                    },
                })
                .collect(),
        }
    }
}

/// Build the public router. Mounted outside the auth middleware.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/issuers/:id/profile", get(get_profile))
        .route("/issuers/:id/revocations", get(get_revocations))
        .route("/issuers/:id/intro", post(introduce))
}

/// GET /issuers/:id/profile: Blockcerts issuer profile.
#[utoipa::path(
    get,
    path = "/issuers/{id}/profile",
    params(("id" = Uuid, Path, description = "Issuer ID")),
    responses(
        (status = 200, description = "Issuer profile document"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "public"
)]
pub(crate) async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<IssuerProfile>, AppError> {
    let issuer = load_issuer(&state, id)?;
    Ok(Json(issuer_profile(&issuer, state.urls())?))
}

/// GET /issuers/:id/revocations: Open Badges revocation list.
#[utoipa::path(
    get,
    path = "/issuers/{id}/revocations",
    params(("id" = Uuid, Path, description = "Issuer ID")),
    responses(
        (status = 200, description = "Revocation list document"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "public"
)]
pub(crate) async fn get_revocations(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RevocationList>, AppError> {
    let issuer = load_issuer(&state, id)?;
    Ok(Json(revocation_list(&issuer, state.urls())))
}

/// POST /issuers/:id/intro: Redeem an invite code.
#[utoipa::path(
    post,
    path = "/issuers/{id}/intro",
    params(("id" = Uuid, Path, description = "Issuer ID")),
    request_body = IntroductionRequest,
    responses(
        (status = 200, description = "Per-badge certification report", body = IntroductionResponse),
        (status = 400, description = "Invalid invite code", body = crate::error::ErrorBody),
        (status = 404, description = "Issuer not found", body = crate::error::ErrorBody),
    ),
    tag = "public"
)]
pub(crate) async fn introduce(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Result<Json<IntroductionRequest>, JsonRejection>,
) -> Result<Json<IntroductionResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let issuer_id = IssuerId::from_uuid(id);
    let orchestrator = state.orchestrator.clone();
    let report = run_blocking(move || {
        orchestrator.accept_invite(&issuer_id, req.nonce.trim(), req.bitcoin_address.trim())
    })
    .await??;
    Ok(Json(report.into()))
}
