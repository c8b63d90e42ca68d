//! # Badge & Issuance API
//!
//! Badge classes belong to one issuer and are immutable once created.
//! `POST /issuers/:id/badges/:badge_id/issue` is the issuance entry point:
//! addressed recipients are certified on the spot, the rest are invited.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use ubadge_core::{BadgeId, EmailAddress};
use ubadge_issuance::{
    Badge, Criteria, Delivery, IssuanceReport, NewBadge, RecipientInput, RecipientStatus,
    SignatureLine,
};

use crate::auth::{require_issuer_access, CallerIdentity};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, non_blank, Validate};
use crate::routes::issuers::load_issuer;
use crate::routes::run_blocking;
use crate::state::AppState;

// ── Request DTOs ────────────────────────────────────────────────────────────

/// One signatory on the certificate.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignatureLineDto {
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(rename = "jobTitle")]
    pub job_title: String,
}

/// Create badge request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBadgeRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Criteria narrative.
    pub criteria: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub signature_lines: Vec<SignatureLineDto>,
    #[serde(default = "default_template")]
    pub template: u32,
}

fn default_template() -> u32 {
    1
}

impl Validate for CreateBadgeRequest {
    fn validate(&self) -> Result<(), String> {
        non_blank("name", &self.name)?;
        non_blank("criteria", &self.criteria)?;
        for line in &self.signature_lines {
            non_blank("signature_lines.name", &line.name)?;
        }
        Ok(())
    }
}

/// One recipient named in an issue request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RecipientEntry {
    pub name: String,
    pub email: String,
}

/// Issue request body.
#[derive(Debug, Deserialize, ToSchema)]
pub struct IssueBadgeRequest {
    pub recipients: Vec<RecipientEntry>,
}

impl Validate for IssueBadgeRequest {
    fn validate(&self) -> Result<(), String> {
        if self.recipients.is_empty() {
            return Err("recipients must not be empty".to_string());
        }
        for entry in &self.recipients {
            non_blank("recipients.name", &entry.name)?;
            EmailAddress::new(entry.email.as_str()).map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

// ── Response DTOs ───────────────────────────────────────────────────────────

/// Badge class as returned by the API.
#[derive(Debug, Serialize, ToSchema)]
pub struct BadgeResponse {
    pub id: Uuid,
    pub issuer_id: Uuid,
    pub name: String,
    pub description: String,
    pub criteria: String,
    pub image: String,
    pub signature_lines: Vec<SignatureLineDto>,
    pub template: u32,
    pub created_at: DateTime<Utc>,
}

impl From<Badge> for BadgeResponse {
    fn from(badge: Badge) -> Self {
        Self {
            id: *badge.id.as_uuid(),
            issuer_id: *badge.issuer_id.as_uuid(),
            name: badge.name,
            description: badge.description,
            criteria: badge.criteria.narrative,
            image: badge.image,
            signature_lines: badge
                .signature_lines
                .into_iter()
                .map(|l| SignatureLineDto {
                    name: l.name,
                    image: l.image,
                    job_title: l.job_title,
                })
                .collect(),
            template: badge.template,
            created_at: badge.created_at,
        }
    }
}

/// Per-recipient status in an issuance report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Certified,
    Invited,
    AlreadyInvited,
    Failed,
}

/// Outcome for one recipient.
#[derive(Debug, Serialize, ToSchema)]
pub struct RecipientResult {
    pub recipient_id: Uuid,
    pub email: String,
    pub status: IssueStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invite_id: Option<Uuid>,
    /// Whether the invite email reached the mail transport.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RecipientResult {
    fn record_delivery(&mut self, delivery: Delivery) {
        match delivery {
            Delivery::Sent => self.notified = Some(true),
            Delivery::Failed(reason) => {
                self.notified = Some(false);
                self.reason = Some(reason);
            }
        }
    }
}

/// Aggregate issuance report.
#[derive(Debug, Serialize, ToSchema)]
pub struct IssueBadgeResponse {
    pub issuer_id: Uuid,
    pub badge_id: Uuid,
    pub results: Vec<RecipientResult>,
}

impl From<IssuanceReport> for IssueBadgeResponse {
    fn from(report: IssuanceReport) -> Self {
        let results = report
            .outcomes
            .into_iter()
            .map(|outcome| {
                let mut result = RecipientResult {
                    recipient_id: *outcome.recipient_id.as_uuid(),
                    email: outcome.email.to_string(),
                    status: IssueStatus::Failed,
                    certificate_id: None,
                    invite_id: None,
                    notified: None,
                    reason: None,
                };
                match outcome.status {
                    RecipientStatus::Certified(cert) => {
                        result.status = IssueStatus::Certified;
                        result.certificate_id = Some(*cert.id.as_uuid());
                    }
                    RecipientStatus::Invited {
                        invite_id,
                        delivery,
                        ..
                    } => {
                        result.status = IssueStatus::Invited;
                        result.invite_id = Some(*invite_id.as_uuid());
                        result.record_delivery(delivery);
                    }
                    RecipientStatus::AlreadyInvited {
                        invite_id,
                        delivery,
                    } => {
                        result.status = IssueStatus::AlreadyInvited;
                        result.invite_id = Some(*invite_id.as_uuid());
                        result.record_delivery(delivery);
                    }
                    RecipientStatus::Failed { reason } => {
                        result.reason = Some(reason);
                    }
                }
                result
            })
            .collect();

        Self {
            issuer_id: *report.issuer_id.as_uuid(),
            badge_id: *report.badge_id.as_uuid(),
            results,
        }
    }
}

// ── Router ──────────────────────────────────────────────────────────────────

/// Build the badge router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/issuers/:id/badges", post(create_badge).get(list_badges))
        .route("/issuers/:id/badges/:badge_id", get(get_badge))
        .route("/issuers/:id/badges/:badge_id/issue", post(issue_badge))
}

/// POST /issuers/:id/badges: Define a badge.
#[utoipa::path(
    post,
    path = "/issuers/{id}/badges",
    params(("id" = Uuid, Path, description = "Issuer ID")),
    request_body = CreateBadgeRequest,
    responses(
        (status = 201, description = "Badge created", body = BadgeResponse),
        (status = 404, description = "Issuer not found", body = crate::error::ErrorBody),
        (status = 409, description = "Name already taken", body = crate::error::ErrorBody),
    ),
    tag = "badges"
)]
pub(crate) async fn create_badge(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<CreateBadgeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BadgeResponse>), AppError> {
    let req = extract_validated_json(body)?;
    let issuer = load_issuer(&state, id)?;
    require_issuer_access(&caller, &issuer)?;

    let badge = state.directory.create_badge(
        &issuer.id,
        NewBadge {
            name: req.name,
            description: req.description,
            criteria: Criteria {
                narrative: req.criteria,
            },
            image: req.image,
            signature_lines: req
                .signature_lines
                .into_iter()
                .map(|l| SignatureLine {
                    name: l.name,
                    image: l.image,
                    job_title: l.job_title,
                })
                .collect(),
            template: req.template,
        },
    )?;
    Ok((StatusCode::CREATED, Json(badge.into())))
}

/// GET /issuers/:id/badges: List an issuer's badges.
#[utoipa::path(
    get,
    path = "/issuers/{id}/badges",
    params(("id" = Uuid, Path, description = "Issuer ID")),
    responses(
        (status = 200, description = "Badges", body = Vec<BadgeResponse>),
        (status = 404, description = "Issuer not found", body = crate::error::ErrorBody),
    ),
    tag = "badges"
)]
pub(crate) async fn list_badges(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<BadgeResponse>>, AppError> {
    let issuer = load_issuer(&state, id)?;
    require_issuer_access(&caller, &issuer)?;
    let badges = state.directory.badges_for(&issuer.id);
    Ok(Json(badges.into_iter().map(BadgeResponse::from).collect()))
}

/// GET /issuers/:id/badges/:badge_id: Get a badge.
#[utoipa::path(
    get,
    path = "/issuers/{id}/badges/{badge_id}",
    params(
        ("id" = Uuid, Path, description = "Issuer ID"),
        ("badge_id" = Uuid, Path, description = "Badge ID"),
    ),
    responses(
        (status = 200, description = "Badge found", body = BadgeResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "badges"
)]
pub(crate) async fn get_badge(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path((id, badge_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<BadgeResponse>, AppError> {
    let issuer = load_issuer(&state, id)?;
    require_issuer_access(&caller, &issuer)?;
    let badge = state
        .directory
        .badge(&issuer.id, &BadgeId::from_uuid(badge_id))?;
    Ok(Json(badge.into()))
}

/// POST /issuers/:id/badges/:badge_id/issue: Issue a badge to recipients.
#[utoipa::path(
    post,
    path = "/issuers/{id}/badges/{badge_id}/issue",
    params(
        ("id" = Uuid, Path, description = "Issuer ID"),
        ("badge_id" = Uuid, Path, description = "Badge ID"),
    ),
    request_body = IssueBadgeRequest,
    responses(
        (status = 200, description = "Per-recipient issuance report", body = IssueBadgeResponse),
        (status = 403, description = "Not permitted", body = crate::error::ErrorBody),
        (status = 404, description = "Issuer or badge not found", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "badges"
)]
pub(crate) async fn issue_badge(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path((id, badge_id)): Path<(Uuid, Uuid)>,
    body: Result<Json<IssueBadgeRequest>, JsonRejection>,
) -> Result<Json<IssueBadgeResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let issuer = load_issuer(&state, id)?;
    require_issuer_access(&caller, &issuer)?;

    let recipients = req
        .recipients
        .into_iter()
        .map(|entry| {
            Ok(RecipientInput {
                name: entry.name,
                email: EmailAddress::new(entry.email)?,
            })
        })
        .collect::<Result<Vec<_>, ubadge_core::ValidationError>>()?;

    let orchestrator = state.orchestrator.clone();
    let badge_id = BadgeId::from_uuid(badge_id);
    let report = run_blocking(move || orchestrator.issue(&issuer.id, &badge_id, &recipients)).await??;
    Ok(Json(report.into()))
}
