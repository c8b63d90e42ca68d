//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI document,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI document for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "uBadge API",
        version = "0.1.0",
        description = "Issuer and badge management, badge issuance with invite-based address registration, and public Blockcerts issuer documents.",
        license(name = "BUSL-1.1")
    ),
    paths(
        // Issuers
        crate::routes::issuers::create_issuer,
        crate::routes::issuers::list_issuers,
        crate::routes::issuers::get_issuer,
        crate::routes::issuers::update_issuer,
        crate::routes::issuers::rotate_key,
        crate::routes::issuers::revoke_certificate,
        // Badges & issuance
        crate::routes::badges::create_badge,
        crate::routes::badges::list_badges,
        crate::routes::badges::get_badge,
        crate::routes::badges::issue_badge,
        // Invites
        crate::routes::invites::list_invites,
        // Recipients
        crate::routes::recipients::list_recipients,
        crate::routes::recipients::get_recipient,
        // Public
        crate::routes::public::get_profile,
        crate::routes::public::get_revocations,
        crate::routes::public::introduce,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::auth::Role,
        crate::routes::issuers::KeyInput,
        crate::routes::issuers::CreateIssuerRequest,
        crate::routes::issuers::UpdateIssuerRequest,
        crate::routes::issuers::RevokeCertificateRequest,
        crate::routes::issuers::KeyResponse,
        crate::routes::issuers::RevocationResponse,
        crate::routes::issuers::IssuerResponse,
        crate::routes::badges::SignatureLineDto,
        crate::routes::badges::CreateBadgeRequest,
        crate::routes::badges::RecipientEntry,
        crate::routes::badges::IssueBadgeRequest,
        crate::routes::badges::BadgeResponse,
        crate::routes::badges::IssueStatus,
        crate::routes::badges::RecipientResult,
        crate::routes::badges::IssueBadgeResponse,
        crate::routes::invites::InviteResponse,
        crate::routes::recipients::CertificateRefResponse,
        crate::routes::recipients::RecipientResponse,
        crate::routes::public::IntroductionRequest,
        crate::routes::public::ReplayStatus,
        crate::routes::public::BadgeResult,
        crate::routes::public::IntroductionResponse,
    )),
    tags(
        (name = "issuers", description = "Issuer management"),
        (name = "badges", description = "Badge classes and issuance"),
        (name = "invites", description = "Open invites"),
        (name = "recipients", description = "Recipient records"),
        (name = "public", description = "Unauthenticated issuer documents and invite redemption"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json: Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
