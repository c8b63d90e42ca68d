//! # Invite Inspection
//!
//! Open invites for an issuer. Nonces stay server-side; they only ever
//! leave the system inside the invite email.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use ubadge_issuance::Invite;

use crate::auth::{require_issuer_access, CallerIdentity};
use crate::error::AppError;
use crate::routes::issuers::load_issuer;
use crate::state::AppState;

/// An open invite, without its nonce.
#[derive(Debug, Serialize, ToSchema)]
pub struct InviteResponse {
    pub id: Uuid,
    pub issuer_id: Uuid,
    pub recipient_id: Uuid,
    pub badges: Vec<Uuid>,
    /// `OPEN` or `REDEEMING`.
    pub state: String,
    pub created_at: DateTime<Utc>,
}

impl From<Invite> for InviteResponse {
    fn from(invite: Invite) -> Self {
        Self {
            id: *invite.id.as_uuid(),
            issuer_id: *invite.issuer_id.as_uuid(),
            recipient_id: *invite.recipient_id.as_uuid(),
            badges: invite.badges.iter().map(|b| *b.as_uuid()).collect(),
            state: invite.state.as_str().to_string(),
            created_at: invite.created_at,
        }
    }
}

/// Build the invite router.
pub fn router() -> Router<AppState> {
    Router::new().route("/issuers/:id/invites", get(list_invites))
}

/// GET /issuers/:id/invites: List the issuer's open invites.
#[utoipa::path(
    get,
    path = "/issuers/{id}/invites",
    params(("id" = Uuid, Path, description = "Issuer ID")),
    responses(
        (status = 200, description = "Open invites", body = Vec<InviteResponse>),
        (status = 404, description = "Issuer not found", body = crate::error::ErrorBody),
    ),
    tag = "invites"
)]
pub(crate) async fn list_invites(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<InviteResponse>>, AppError> {
    let issuer = load_issuer(&state, id)?;
    require_issuer_access(&caller, &issuer)?;
    let invites = state.invites.for_issuer(&issuer.id);
    Ok(Json(invites.into_iter().map(InviteResponse::from).collect()))
}
