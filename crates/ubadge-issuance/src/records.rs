//! # Directory Records
//!
//! Issuers, badges and recipients as held by the [`Directory`](crate::Directory).
//! Each record owns its nested collections: an issuer owns its key ring and
//! revocation set, a recipient owns its address associations and
//! certificate references. Cross-record changes go through the directory.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ubadge_core::{BadgeId, CertificateId, EmailAddress, IssuerId, RecipientId, UserId};

use crate::keys::KeyRing;

// ---------------------------------------------------------------------------
// Issuer
// ---------------------------------------------------------------------------

/// An organization that defines badges and issues certificates.
#[derive(Debug, Clone, Serialize)]
pub struct Issuer {
    pub id: IssuerId,
    /// Operator account that administers this issuer.
    pub owner_id: UserId,
    /// Display name, unique across issuers.
    pub name: String,
    pub email: EmailAddress,
    /// Issuer home page.
    pub url: String,
    /// Logo, as a URL or data URI.
    pub image: String,
    pub keys: KeyRing,
    pub revocations: Vec<Revocation>,
    pub created_at: DateTime<Utc>,
}

/// A certificate the issuer has withdrawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revocation {
    pub certificate_id: CertificateId,
    pub reason: String,
    pub revoked_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Badge
// ---------------------------------------------------------------------------

/// Achievement criteria shown on a badge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criteria {
    pub narrative: String,
}

/// One signatory printed on the certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureLine {
    pub name: String,
    pub image: String,
    #[serde(rename = "jobTitle")]
    pub job_title: String,
}

/// A badge template. Badges have no update path once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub id: BadgeId,
    pub issuer_id: IssuerId,
    /// Unique across all issuers.
    pub name: String,
    pub description: String,
    pub criteria: Criteria,
    pub image: String,
    pub signature_lines: Vec<SignatureLine>,
    /// Display template selector for certificate rendering.
    pub template: u32,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Pointer from a recipient to a persisted certificate artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRef {
    pub id: CertificateId,
    pub issuer_id: IssuerId,
    pub badge_id: BadgeId,
    /// Where the artifact store put the document.
    pub location: String,
    pub issued_on: DateTime<Utc>,
}

/// A person who receives certificates, keyed by email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipient {
    pub id: RecipientId,
    pub name: String,
    pub email: EmailAddress,
    /// Public key/address the recipient registered with each issuer.
    pub addresses: BTreeMap<IssuerId, String>,
    /// Issued certificates, oldest first.
    pub certificates: Vec<CertificateRef>,
    pub created_at: DateTime<Utc>,
}

impl Recipient {
    /// The address registered with `issuer_id`, if any.
    pub fn address_for(&self, issuer_id: &IssuerId) -> Option<&str> {
        self.addresses.get(issuer_id).map(String::as_str)
    }

    /// Whether the recipient can be certified by `issuer_id` without an invite.
    pub fn is_addressed_for(&self, issuer_id: &IssuerId) -> bool {
        self.addresses.contains_key(issuer_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_line_uses_job_title_key() {
        let line = SignatureLine {
            name: "Dean".into(),
            image: "sig.png".into(),
            job_title: "Dean of Studies".into(),
        };
        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json["jobTitle"], "Dean of Studies");
    }

    #[test]
    fn recipient_address_lookup_is_per_issuer() {
        let acme = IssuerId::new();
        let other = IssuerId::new();
        let mut addresses = BTreeMap::new();
        addresses.insert(acme, "addr0".to_string());
        let recipient = Recipient {
            id: RecipientId::new(),
            name: "A".into(),
            email: EmailAddress::new("a@x.com").unwrap(),
            addresses,
            certificates: Vec::new(),
            created_at: Utc::now(),
        };
        assert_eq!(recipient.address_for(&acme), Some("addr0"));
        assert!(recipient.is_addressed_for(&acme));
        assert!(!recipient.is_addressed_for(&other));
    }
}
