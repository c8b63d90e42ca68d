//! # Authentication & Authorization Middleware
//!
//! Bearer token middleware with role-based access control (RBAC).
//!
//! ## Token Format
//!
//! ```text
//! Bearer {role}:{user_id}:{secret}
//! Bearer {secret}                    (treated as Admin)
//! ```
//!
//! ## CallerIdentity
//!
//! Every authenticated request gets a [`CallerIdentity`] injected into the
//! request extensions. Handlers extract it via the `FromRequestParts` impl.
//!
//! ## Issuer scoping
//!
//! Owners and managers act on behalf of a user account. They may only touch
//! issuers whose `owner_id` is that account.

use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use utoipa::ToSchema;

use ubadge_core::UserId;
use ubadge_issuance::Issuer;

use crate::error::{AppError, ErrorBody, ErrorDetail};

// ── Role ────────────────────────────────────────────────────────────────────

/// Operator roles, ordered by privilege level: `Manager < Owner < Admin`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Manages badges and issuance for the owner's issuers.
    Manager,
    /// Owns issuers; may also edit them and rotate their keys.
    Owner,
    /// Full access, including issuer creation and recipient records.
    Admin,
}

impl Role {
    /// Return the string representation of this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manager => "manager",
            Self::Owner => "owner",
            Self::Admin => "admin",
        }
    }
}

// ── CallerIdentity ──────────────────────────────────────────────────────────

/// Identity of the authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub role: Role,
    /// The user account the caller acts for. `None` for admins using the
    /// bare secret.
    pub user_id: Option<UserId>,
}

impl CallerIdentity {
    /// The identity used when authentication is disabled.
    pub fn admin() -> Self {
        Self {
            role: Role::Admin,
            user_id: None,
        }
    }

    /// Check if the caller has at least the given minimum role.
    pub fn has_role(&self, minimum: Role) -> bool {
        self.role >= minimum
    }

    fn owns(&self, issuer: &Issuer) -> bool {
        self.user_id.as_ref() == Some(&issuer.owner_id)
    }

    /// Whether the caller may edit `issuer` or rotate its key.
    pub fn can_administer(&self, issuer: &Issuer) -> bool {
        match self.role {
            Role::Admin => true,
            Role::Owner => self.owns(issuer),
            Role::Manager => false,
        }
    }

    /// Whether the caller may manage badges, issue, and revoke for `issuer`.
    pub fn can_operate(&self, issuer: &Issuer) -> bool {
        match self.role {
            Role::Admin => true,
            Role::Owner | Role::Manager => self.owns(issuer),
        }
    }
}

#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))
    }
}

/// Check that the caller has at least the required role.
/// Returns 403 Forbidden if the caller's role is insufficient.
pub fn require_role(caller: &CallerIdentity, minimum: Role) -> Result<(), AppError> {
    if caller.has_role(minimum) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "role '{}' required, caller has '{}'",
            minimum.as_str(),
            caller.role.as_str()
        )))
    }
}

/// 403 unless the caller may administer `issuer`.
pub fn require_issuer_admin(caller: &CallerIdentity, issuer: &Issuer) -> Result<(), AppError> {
    if caller.can_administer(issuer) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "caller may not administer issuer {}",
            issuer.id
        )))
    }
}

/// 403 unless the caller may operate on `issuer`.
pub fn require_issuer_access(caller: &CallerIdentity, issuer: &Issuer) -> Result<(), AppError> {
    if caller.can_operate(issuer) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "caller has no access to issuer {}",
            issuer.id
        )))
    }
}

// ── Auth Configuration ──────────────────────────────────────────────────────

/// Auth configuration injected into request extensions.
///
/// Custom `Debug` redacts the token value.
#[derive(Clone)]
pub struct AuthConfig {
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ── Token Validation ────────────────────────────────────────────────────────

/// Constant-time comparison of bearer tokens.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Parse the bearer token in format `{role}:{user_id}:{secret}` or `{secret}`.
pub fn parse_bearer_token(provided: &str, expected_secret: &str) -> Result<CallerIdentity, String> {
    let parts: Vec<&str> = provided.splitn(3, ':').collect();

    match parts.len() {
        1 => {
            if constant_time_token_eq(provided, expected_secret) {
                Ok(CallerIdentity::admin())
            } else {
                Err("invalid bearer token".into())
            }
        }
        3 => {
            let (role_str, user_str, secret) = (parts[0], parts[1], parts[2]);

            if !constant_time_token_eq(secret, expected_secret) {
                return Err("invalid bearer token".into());
            }

            let role = match role_str {
                "admin" => Role::Admin,
                "owner" => Role::Owner,
                "manager" => Role::Manager,
                other => return Err(format!("unknown role: {other}")),
            };

            let user_id = if user_str.is_empty() {
                None
            } else {
                Some(
                    user_str
                        .parse::<UserId>()
                        .map_err(|e| format!("invalid user_id: {e}"))?,
                )
            };
            if user_id.is_none() && role != Role::Admin {
                return Err(format!("role '{}' requires a user_id", role.as_str()));
            }

            Ok(CallerIdentity { role, user_id })
        }
        _ => Err("invalid token format, expected {role}:{user_id}:{secret} or {secret}".into()),
    }
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Validate the Bearer token and inject the caller's [`CallerIdentity`].
///
/// When `AuthConfig.token` is `None`, every request runs as admin.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let expected_token = request.extensions().get::<AuthConfig>().cloned();

    match expected_token {
        Some(AuthConfig {
            token: Some(ref expected),
        }) => {
            let auth_header = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok());

            match auth_header {
                Some(header_value) if header_value.starts_with("Bearer ") => {
                    let provided = &header_value[7..];
                    match parse_bearer_token(provided, expected) {
                        Ok(identity) => {
                            request.extensions_mut().insert(identity);
                            next.run(request).await
                        }
                        Err(msg) => {
                            tracing::warn!(reason = %msg, "authentication failed: invalid bearer token");
                            unauthorized_response(&msg)
                        }
                    }
                }
                Some(_) => {
                    tracing::warn!("authentication failed: non-Bearer authorization scheme");
                    unauthorized_response("authorization header must use Bearer scheme")
                }
                None => {
                    tracing::warn!("authentication failed: missing authorization header");
                    unauthorized_response("missing authorization header")
                }
            }
        }
        _ => {
            request.extensions_mut().insert(CallerIdentity::admin());
            next.run(request).await
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            details: None,
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
