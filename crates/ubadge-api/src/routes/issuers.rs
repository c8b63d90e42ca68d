//! # Issuer Management API
//!
//! Create, list, read and update issuers, rotate their signing keys, and
//! revoke certificates they issued. Private key material is accepted on
//! input and never returned.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use ubadge_core::{CertificateId, EmailAddress, IssuerId, UserId};
use ubadge_issuance::{Issuer, IssuerUpdate, KeyMaterial, NewIssuer};

use crate::auth::{require_issuer_admin, require_issuer_access, require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_optional_json, extract_validated_json, non_blank, Validate};
use crate::state::AppState;

// ── Request DTOs ────────────────────────────────────────────────────────────

/// Caller-supplied key pair.
#[derive(Debug, Deserialize, ToSchema)]
pub struct KeyInput {
    pub public_key: String,
    /// Stored for signing; never returned.
    pub private_key: String,
}

impl Validate for KeyInput {
    fn validate(&self) -> Result<(), String> {
        non_blank("public_key", &self.public_key)?;
        non_blank("private_key", &self.private_key)
    }
}

impl From<KeyInput> for KeyMaterial {
    fn from(input: KeyInput) -> Self {
        KeyMaterial::new(input.public_key, input.private_key)
    }
}

/// Create issuer request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateIssuerRequest {
    /// User account that will own the issuer.
    pub owner_id: Uuid,
    pub name: String,
    pub email: String,
    pub url: String,
    #[serde(default)]
    pub image: String,
    /// Initial key pair. Generated when absent.
    #[serde(default)]
    pub key: Option<KeyInput>,
}

impl Validate for CreateIssuerRequest {
    fn validate(&self) -> Result<(), String> {
        non_blank("name", &self.name)?;
        non_blank("url", &self.url)?;
        EmailAddress::new(&self.email).map_err(|e| e.to_string())?;
        match &self.key {
            Some(key) => key.validate(),
            None => Ok(()),
        }
    }
}

/// Partial issuer update. Absent fields are left unchanged; a `key`
/// rotates the signing key.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateIssuerRequest {
    #[serde(default)]
    pub owner_id: Option<Uuid>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub key: Option<KeyInput>,
}

impl Validate for UpdateIssuerRequest {
    fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.name {
            non_blank("name", name)?;
        }
        if let Some(email) = &self.email {
            EmailAddress::new(email).map_err(|e| e.to_string())?;
        }
        if let Some(key) = &self.key {
            key.validate()?;
        }
        Ok(())
    }
}

/// Certificate revocation request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RevokeCertificateRequest {
    pub certificate_id: Uuid,
    pub reason: String,
}

impl Validate for RevokeCertificateRequest {
    fn validate(&self) -> Result<(), String> {
        non_blank("reason", &self.reason)
    }
}

// ── Response DTOs ───────────────────────────────────────────────────────────

/// Public half of an issuer key.
#[derive(Debug, Serialize, ToSchema)]
pub struct KeyResponse {
    pub public_key: String,
    pub date_created: DateTime<Utc>,
    pub date_revoked: Option<DateTime<Utc>>,
}

/// A revoked certificate.
#[derive(Debug, Serialize, ToSchema)]
pub struct RevocationResponse {
    pub certificate_id: Uuid,
    pub reason: String,
    pub revoked_at: DateTime<Utc>,
}

/// Issuer record as returned by the API.
#[derive(Debug, Serialize, ToSchema)]
pub struct IssuerResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub email: String,
    pub url: String,
    pub image: String,
    pub keys: Vec<KeyResponse>,
    pub revocations: Vec<RevocationResponse>,
    pub created_at: DateTime<Utc>,
}

impl From<Issuer> for IssuerResponse {
    fn from(issuer: Issuer) -> Self {
        Self {
            id: *issuer.id.as_uuid(),
            owner_id: *issuer.owner_id.as_uuid(),
            name: issuer.name,
            email: issuer.email.to_string(),
            url: issuer.url,
            image: issuer.image,
            keys: issuer
                .keys
                .iter()
                .map(|k| KeyResponse {
                    public_key: k.public_key().to_string(),
                    date_created: k.date_created,
                    date_revoked: k.date_revoked,
                })
                .collect(),
            revocations: issuer
                .revocations
                .into_iter()
                .map(|r| RevocationResponse {
                    certificate_id: *r.certificate_id.as_uuid(),
                    reason: r.reason,
                    revoked_at: r.revoked_at,
                })
                .collect(),
            created_at: issuer.created_at,
        }
    }
}

// ── Router ──────────────────────────────────────────────────────────────────

/// Build the issuer router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/issuers", post(create_issuer).get(list_issuers))
        .route("/issuers/:id", get(get_issuer).put(update_issuer))
        .route("/issuers/:id/keys", post(rotate_key))
        .route("/issuers/:id/revoke", post(revoke_certificate))
}

/// Load an issuer, 404 if unknown.
pub(crate) fn load_issuer(state: &AppState, id: Uuid) -> Result<Issuer, AppError> {
    Ok(state.directory.issuer(&IssuerId::from_uuid(id))?)
}

/// POST /issuers: Create an issuer.
#[utoipa::path(
    post,
    path = "/issuers",
    request_body = CreateIssuerRequest,
    responses(
        (status = 201, description = "Issuer created", body = IssuerResponse),
        (status = 403, description = "Admin role required", body = crate::error::ErrorBody),
        (status = 409, description = "Name already taken", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "issuers"
)]
pub(crate) async fn create_issuer(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateIssuerRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IssuerResponse>), AppError> {
    require_role(&caller, Role::Admin)?;
    let req = extract_validated_json(body)?;

    let key = req.key.map(KeyMaterial::from).unwrap_or_else(KeyMaterial::generate);
    let issuer = state.directory.create_issuer(
        NewIssuer {
            owner_id: UserId::from_uuid(req.owner_id),
            name: req.name,
            email: EmailAddress::new(&req.email)?,
            url: req.url,
            image: req.image,
        },
        key,
    )?;
    Ok((StatusCode::CREATED, Json(issuer.into())))
}

/// GET /issuers: List issuers visible to the caller.
#[utoipa::path(
    get,
    path = "/issuers",
    responses(
        (status = 200, description = "Issuers", body = Vec<IssuerResponse>),
    ),
    tag = "issuers"
)]
pub(crate) async fn list_issuers(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Json<Vec<IssuerResponse>> {
    let issuers = match (caller.role, caller.user_id) {
        (Role::Admin, _) => state.directory.issuers(),
        (_, Some(user)) => state.directory.issuers_owned_by(&user),
        (_, None) => Vec::new(),
    };
    Json(issuers.into_iter().map(IssuerResponse::from).collect())
}

/// GET /issuers/:id: Get an issuer.
#[utoipa::path(
    get,
    path = "/issuers/{id}",
    params(("id" = Uuid, Path, description = "Issuer ID")),
    responses(
        (status = 200, description = "Issuer found", body = IssuerResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "issuers"
)]
pub(crate) async fn get_issuer(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<IssuerResponse>, AppError> {
    let issuer = load_issuer(&state, id)?;
    require_issuer_access(&caller, &issuer)?;
    Ok(Json(issuer.into()))
}

/// PUT /issuers/:id: Update an issuer.
#[utoipa::path(
    put,
    path = "/issuers/{id}",
    params(("id" = Uuid, Path, description = "Issuer ID")),
    request_body = UpdateIssuerRequest,
    responses(
        (status = 200, description = "Issuer updated", body = IssuerResponse),
        (status = 403, description = "Not permitted", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Name already taken", body = crate::error::ErrorBody),
    ),
    tag = "issuers"
)]
pub(crate) async fn update_issuer(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateIssuerRequest>, JsonRejection>,
) -> Result<Json<IssuerResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let issuer = load_issuer(&state, id)?;
    require_issuer_admin(&caller, &issuer)?;
    if req.owner_id.is_some() {
        require_role(&caller, Role::Admin)?;
    }

    let update = IssuerUpdate {
        owner_id: req.owner_id.map(UserId::from_uuid),
        name: req.name,
        email: req.email.as_deref().map(EmailAddress::new).transpose()?,
        url: req.url,
        image: req.image,
        key: req.key.map(KeyMaterial::from),
    };
    let issuer = state.directory.update_issuer(&issuer.id, update)?;
    Ok(Json(issuer.into()))
}

/// POST /issuers/:id/keys: Rotate the signing key.
///
/// The body is optional key material; a key pair is generated when absent.
#[utoipa::path(
    post,
    path = "/issuers/{id}/keys",
    params(("id" = Uuid, Path, description = "Issuer ID")),
    request_body(content = KeyInput, description = "Key pair to install; generated when omitted"),
    responses(
        (status = 200, description = "Key rotated", body = IssuerResponse),
        (status = 403, description = "Not permitted", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "issuers"
)]
pub(crate) async fn rotate_key(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<KeyInput>, JsonRejection>,
) -> Result<Json<IssuerResponse>, AppError> {
    let key = extract_optional_json(body)?;
    let issuer = load_issuer(&state, id)?;
    require_issuer_admin(&caller, &issuer)?;

    let key = key.map(KeyMaterial::from).unwrap_or_else(KeyMaterial::generate);
    let issuer = state.directory.rotate_key(&issuer.id, key)?;
    Ok(Json(issuer.into()))
}

/// POST /issuers/:id/revoke: Revoke a certificate issued by this issuer.
#[utoipa::path(
    post,
    path = "/issuers/{id}/revoke",
    params(("id" = Uuid, Path, description = "Issuer ID")),
    request_body = RevokeCertificateRequest,
    responses(
        (status = 200, description = "Certificate revoked", body = IssuerResponse),
        (status = 404, description = "Issuer or certificate not found", body = crate::error::ErrorBody),
        (status = 409, description = "Already revoked", body = crate::error::ErrorBody),
    ),
    tag = "issuers"
)]
pub(crate) async fn revoke_certificate(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<RevokeCertificateRequest>, JsonRejection>,
) -> Result<Json<IssuerResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let issuer = load_issuer(&state, id)?;
    require_issuer_access(&caller, &issuer)?;

    let issuer = state.directory.revoke_certificate(
        &issuer.id,
        CertificateId::from_uuid(req.certificate_id),
        req.reason,
    )?;
    Ok(Json(issuer.into()))
}
