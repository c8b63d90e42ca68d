//! # API Route Modules
//!
//! - `issuers`: issuer CRUD, key rotation and certificate revocation.
//! - `badges`: badge classes and the issuance entry point.
//! - `invites`: read-only view of open invites.
//! - `recipients`: admin view of recipient records.
//! - `public`: unauthenticated issuer profile, revocation list and invite
//!   redemption.

pub mod badges;
pub mod invites;
pub mod issuers;
pub mod public;
pub mod recipients;

use crate::error::AppError;

/// Run synchronous issuance work off the async executor.
///
/// Certificate issuance writes artifacts and may block on I/O.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T, AppError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Internal(format!("issuance task failed: {e}")))
}
