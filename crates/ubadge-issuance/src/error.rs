//! # Issuance Error Hierarchy
//!
//! One error enum per component, each carrying the identifiers needed to
//! diagnose the failure, plus [`IssuanceError`] which the orchestrator
//! returns and which every component error converts into.

use thiserror::Error;

use ubadge_core::{BadgeId, InviteId, IssuerId, RecipientId, ValidationError};

use crate::artifact::ArtifactError;
use crate::keys::KeyRingError;

/// Identity & key store failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// No record with this id.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Record kind ("issuer", "badge", "recipient", "certificate").
        kind: &'static str,
        /// The id that was looked up.
        id: String,
    },

    /// A uniqueness rule would be broken.
    #[error("{0}")]
    Conflict(String),

    /// The issuer's key ring does not have exactly one active key.
    #[error("issuer {issuer_id} key invariant violated: {source}")]
    InvariantViolation {
        /// The issuer whose ring is inconsistent.
        issuer_id: IssuerId,
        /// What is wrong with the ring.
        #[source]
        source: KeyRingError,
    },

    /// Input failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl IdentityError {
    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Invite state machine failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InviteError {
    /// No open invite carries this nonce.
    #[error("no open invite matches the supplied nonce")]
    InvalidNonce,

    /// The nonce belongs to an invite from a different issuer.
    #[error("invite belongs to issuer {actual}, not {requested}")]
    IssuerMismatch {
        /// The issuer named in the redemption request.
        requested: IssuerId,
        /// The issuer that created the invite.
        actual: IssuerId,
    },

    /// No invite with this id.
    #[error("invite {0} not found")]
    NotFound(InviteId),

    /// Every generated nonce collided with an open invite.
    #[error("could not draw an unused nonce after {attempts} attempts")]
    NonceSpaceExhausted {
        /// Number of draws made.
        attempts: usize,
    },
}

/// Credential assembler precondition failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    /// The issuer has no unrevoked key to name in the verification block.
    #[error("issuer {issuer_id} has no active key")]
    NoActiveKey {
        /// The issuer.
        issuer_id: IssuerId,
    },

    /// The issuer has several unrevoked keys.
    #[error("issuer {issuer_id} has {count} active keys")]
    AmbiguousActiveKey {
        /// The issuer.
        issuer_id: IssuerId,
        /// Number of unrevoked keys.
        count: usize,
    },

    /// The recipient has not registered an address with this issuer.
    #[error("recipient {recipient_id} has no address registered with issuer {issuer_id}")]
    MissingAddress {
        /// The recipient.
        recipient_id: RecipientId,
        /// The issuer.
        issuer_id: IssuerId,
    },

    /// The badge passed in belongs to another issuer.
    #[error("badge {badge_id} does not belong to issuer {issuer_id}")]
    ForeignBadge {
        /// The badge.
        badge_id: BadgeId,
        /// The issuer doing the assembling.
        issuer_id: IssuerId,
    },
}

/// Umbrella error for orchestrated issuance and redemption.
#[derive(Error, Debug)]
pub enum IssuanceError {
    /// Identity & key store failure.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// Invite state machine failure.
    #[error(transparent)]
    Invite(#[from] InviteError),

    /// Assembler precondition failure.
    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    /// Artifact persistence failure.
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    /// Certificate serialization failure.
    #[error("certificate serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
