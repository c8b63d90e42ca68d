//! # Recipient Records
//!
//! Admin-only view of recipients, their per-issuer addresses and the
//! certificates issued to them.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use ubadge_core::RecipientId;
use ubadge_issuance::{CertificateRef, Recipient};

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::state::AppState;

/// Pointer to an issued certificate artifact.
#[derive(Debug, Serialize, ToSchema)]
pub struct CertificateRefResponse {
    pub id: Uuid,
    pub issuer_id: Uuid,
    pub badge_id: Uuid,
    pub location: String,
    pub issued_on: DateTime<Utc>,
}

impl From<CertificateRef> for CertificateRefResponse {
    fn from(cert: CertificateRef) -> Self {
        Self {
            id: *cert.id.as_uuid(),
            issuer_id: *cert.issuer_id.as_uuid(),
            badge_id: *cert.badge_id.as_uuid(),
            location: cert.location,
            issued_on: cert.issued_on,
        }
    }
}

/// Recipient record as returned by the API.
#[derive(Debug, Serialize, ToSchema)]
pub struct RecipientResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Registered address, keyed by issuer id.
    pub addresses: BTreeMap<String, String>,
    pub certificates: Vec<CertificateRefResponse>,
    pub created_at: DateTime<Utc>,
}

impl From<Recipient> for RecipientResponse {
    fn from(recipient: Recipient) -> Self {
        Self {
            id: *recipient.id.as_uuid(),
            name: recipient.name,
            email: recipient.email.to_string(),
            addresses: recipient
                .addresses
                .into_iter()
                .map(|(issuer, address)| (issuer.to_string(), address))
                .collect(),
            certificates: recipient
                .certificates
                .into_iter()
                .map(CertificateRefResponse::from)
                .collect(),
            created_at: recipient.created_at,
        }
    }
}

/// Build the recipient router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/recipients", get(list_recipients))
        .route("/recipients/:id", get(get_recipient))
}

/// GET /recipients: List all recipients.
#[utoipa::path(
    get,
    path = "/recipients",
    responses(
        (status = 200, description = "Recipients", body = Vec<RecipientResponse>),
        (status = 403, description = "Admin role required", body = crate::error::ErrorBody),
    ),
    tag = "recipients"
)]
pub(crate) async fn list_recipients(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<RecipientResponse>>, AppError> {
    require_role(&caller, Role::Admin)?;
    let mut recipients = state.directory.recipients();
    recipients.sort_by_key(|r| r.created_at);
    Ok(Json(recipients.into_iter().map(RecipientResponse::from).collect()))
}

/// GET /recipients/:id: Get a recipient.
#[utoipa::path(
    get,
    path = "/recipients/{id}",
    params(("id" = Uuid, Path, description = "Recipient ID")),
    responses(
        (status = 200, description = "Recipient found", body = RecipientResponse),
        (status = 403, description = "Admin role required", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "recipients"
)]
pub(crate) async fn get_recipient(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<RecipientResponse>, AppError> {
    require_role(&caller, Role::Admin)?;
    let recipient = state.directory.recipient(&RecipientId::from_uuid(id))?;
    Ok(Json(recipient.into()))
}
