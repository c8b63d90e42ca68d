//! # ubadge-issuance: Badge Issuance Workflow
//!
//! Everything between an administrator's "issue badge B to these people"
//! and an unsigned Blockcerts certificate sitting in artifact storage.
//!
//! ## Components
//!
//! - [`directory`]: issuers and their key rings, badge classes, recipients
//!   and their per-issuer addresses.
//! - [`invite`]: pending invites keyed by `(issuer, recipient)`, each with a
//!   unique six-digit nonce and an accumulated badge list.
//! - [`certificate`]: assembly of the unsigned Open Badges v2 / Blockcerts
//!   v2 certificate document.
//! - [`orchestrator`]: the issue and accept-invite workflows over the above.
//!
//! Artifact storage and email delivery are collaborators behind the
//! [`ArtifactStore`] and [`EmailDispatcher`] traits.
//!
//! ## Crate Policy
//!
//! - Depends only on `ubadge-core` internally.
//! - No HTTP types. The API crate maps these errors to responses.
//! - Nonces and private keys never reach a log line.

pub mod artifact;
pub mod certificate;
pub mod directory;
pub mod error;
pub mod invite;
pub mod keys;
pub mod notify;
pub mod orchestrator;
pub mod profile;
pub mod records;
pub mod urls;

pub use artifact::{ArtifactError, ArtifactStore, FsArtifacts, InMemoryArtifacts};
pub use certificate::{artifact_path, assemble, UnsignedCertificate};
pub use directory::{Directory, IssuerUpdate, NewBadge, NewIssuer};
pub use error::{AssemblyError, IdentityError, InviteError, IssuanceError};
pub use invite::{DigitNonces, Invite, InviteBook, InviteOutcome, InviteState, NonceSource};
pub use keys::{IssuerKey, KeyMaterial, KeyRing, KeyRingError};
pub use notify::{DispatchError, EmailDispatcher, EmailMessage, Outbox, TracingMailer};
pub use orchestrator::{
    AcceptanceReport, BadgeOutcome, BadgeStatus, Delivery, IssuanceOrchestrator,
    IssuanceReport, IssuanceSettings, RecipientInput, RecipientOutcome, RecipientStatus,
};
pub use profile::{issuer_profile, revocation_list, IssuerProfile, RevocationList};
pub use records::{Badge, CertificateRef, Criteria, Issuer, Recipient, Revocation, SignatureLine};
pub use urls::PublicUrls;
