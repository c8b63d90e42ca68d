//! # Credential Assembler
//!
//! Builds the unsigned Open Badges v2 / Blockcerts v2 assertion for one
//! (issuer, recipient, badge) triple.
//!
//! [`assemble`] is pure apart from reading the clock and drawing a fresh
//! certificate id. Every sub-block derived from the inputs (issuer, badge,
//! recipient profile, verification) is identical across calls with the
//! same inputs; only `issuedOn` and `id` vary. Ids are random UUIDs and are
//! never derived from content.
//!
//! Persisting the document is not done here; see [`artifact_path`] for the
//! storage layout the orchestrator uses.

use chrono::{DateTime, Utc};
use serde::Serialize;

use ubadge_core::{CertificateId, IssuerId};

use crate::error::AssemblyError;
use crate::keys::KeyRingError;
use crate::records::{Badge, Criteria, Issuer, Recipient, SignatureLine};
use crate::urls::PublicUrls;

/// JSON-LD contexts of an Open Badges v2 assertion extended by Blockcerts v2.
pub const CONTEXTS: [&str; 2] = [
    "https://w3id.org/openbadges/v2",
    "https://w3id.org/blockcerts/v2",
];

/// Prefix Blockcerts uses for secp256k1 public keys and addresses.
pub const KOBLITZ_PREFIX: &str = "ecdsa-koblitz-pubkey:";

pub(crate) fn koblitz(key: &str) -> String {
    format!("{KOBLITZ_PREFIX}{key}")
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// Unsigned certificate document, ready for a signing pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnsignedCertificate {
    #[serde(skip)]
    certificate_id: CertificateId,
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    #[serde(rename = "issuedOn")]
    pub issued_on: DateTime<Utc>,
    pub recipient: RecipientIdentity,
    #[serde(rename = "recipientProfile")]
    pub recipient_profile: RecipientProfile,
    pub badge: BadgeClass,
    pub verification: Verification,
}

impl UnsignedCertificate {
    /// The certificate's identifier, as embedded in `id`.
    pub fn certificate_id(&self) -> CertificateId {
        self.certificate_id
    }
}

/// How the recipient is identified: their plain email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipientIdentity {
    pub identity: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub hashed: bool,
}

/// Blockcerts recipient profile extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipientProfile {
    #[serde(rename = "type")]
    pub kind: Vec<String>,
    pub name: String,
    #[serde(rename = "publicKey")]
    pub public_key: String,
}

/// The badge class, embedding its issuer profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BadgeClass {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub name: String,
    pub description: String,
    pub image: String,
    pub criteria: Criteria,
    pub issuer: IssuerBlock,
    #[serde(rename = "signatureLines")]
    pub signature_lines: Vec<SignatureLineBlock>,
}

/// Issuer as embedded in the badge class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuerBlock {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub name: String,
    pub url: String,
    pub email: String,
    pub image: String,
    #[serde(rename = "revocationList")]
    pub revocation_list: String,
}

/// Signature line extension entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureLineBlock {
    #[serde(rename = "type")]
    pub kind: Vec<String>,
    pub name: String,
    pub image: String,
    #[serde(rename = "jobTitle")]
    pub job_title: String,
}

/// Verification block naming the issuer key that will sign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verification {
    #[serde(rename = "type")]
    pub kind: Vec<String>,
    #[serde(rename = "publicKey")]
    pub public_key: String,
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// Build the unsigned certificate for `recipient` earning `badge` from `issuer`.
///
/// # Errors
///
/// - [`AssemblyError::NoActiveKey`] / [`AssemblyError::AmbiguousActiveKey`]
///   when the issuer's key ring has zero or several active keys.
/// - [`AssemblyError::MissingAddress`] when the recipient has not registered
///   an address with this issuer. Callers are expected to route such
///   recipients through an invite instead.
/// - [`AssemblyError::ForeignBadge`] when `badge` belongs to another issuer.
pub fn assemble(
    issuer: &Issuer,
    recipient: &Recipient,
    badge: &Badge,
    urls: &PublicUrls,
) -> Result<UnsignedCertificate, AssemblyError> {
    let key = issuer.keys.active().map_err(|e| match e {
        KeyRingError::NoActiveKey => AssemblyError::NoActiveKey {
            issuer_id: issuer.id,
        },
        KeyRingError::MultipleActiveKeys { count } => AssemblyError::AmbiguousActiveKey {
            issuer_id: issuer.id,
            count,
        },
    })?;
    let address = recipient
        .address_for(&issuer.id)
        .ok_or(AssemblyError::MissingAddress {
            recipient_id: recipient.id,
            issuer_id: issuer.id,
        })?;
    if badge.issuer_id != issuer.id {
        return Err(AssemblyError::ForeignBadge {
            badge_id: badge.id,
            issuer_id: issuer.id,
        });
    }

    let certificate_id = CertificateId::new();
    Ok(UnsignedCertificate {
        certificate_id,
        context: CONTEXTS.iter().map(|c| c.to_string()).collect(),
        kind: "Assertion".into(),
        id: certificate_id.urn(),
        issued_on: Utc::now(),
        recipient: RecipientIdentity {
            identity: recipient.email.to_string(),
            kind: "email".into(),
            hashed: false,
        },
        recipient_profile: RecipientProfile {
            kind: vec!["RecipientProfile".into(), "Extension".into()],
            name: recipient.name.clone(),
            public_key: koblitz(address),
        },
        badge: badge_class(issuer, badge, urls),
        verification: Verification {
            kind: vec!["MerkleProofVerification2017".into(), "Extension".into()],
            public_key: koblitz(key.public_key()),
        },
    })
}

fn badge_class(issuer: &Issuer, badge: &Badge, urls: &PublicUrls) -> BadgeClass {
    BadgeClass {
        kind: "BadgeClass".into(),
        id: badge.id.urn(),
        name: badge.name.clone(),
        description: badge.description.clone(),
        image: badge.image.clone(),
        criteria: badge.criteria.clone(),
        issuer: IssuerBlock {
            kind: "Profile".into(),
            id: urls.profile(&issuer.id),
            name: issuer.name.clone(),
            url: issuer.url.clone(),
            email: issuer.email.to_string(),
            image: issuer.image.clone(),
            revocation_list: urls.revocations(&issuer.id),
        },
        signature_lines: badge.signature_lines.iter().map(signature_line).collect(),
    }
}

fn signature_line(line: &SignatureLine) -> SignatureLineBlock {
    SignatureLineBlock {
        kind: vec!["SignatureLine".into(), "Extension".into()],
        name: line.name.clone(),
        image: line.image.clone(),
        job_title: line.job_title.clone(),
    }
}

/// Storage path for an unsigned certificate:
/// `batch/{YYYYMMDD}/{issuer_id}/unsigned/{certificate_id}.json`.
pub fn artifact_path(
    issued_on: DateTime<Utc>,
    issuer_id: &IssuerId,
    certificate_id: &CertificateId,
) -> String {
    format!(
        "batch/{}/{issuer_id}/unsigned/{certificate_id}.json",
        issued_on.format("%Y%m%d")
    )
}
