//! # Public Issuer Documents
//!
//! The issuer Profile and RevocationList that certificate verifiers and
//! wallets fetch without authentication.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::certificate::{koblitz, CONTEXTS};
use crate::error::IdentityError;
use crate::records::Issuer;
use crate::urls::PublicUrls;

/// Blockcerts issuer profile.
#[derive(Debug, Clone, Serialize)]
pub struct IssuerProfile {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub name: String,
    pub url: String,
    pub email: String,
    pub image: String,
    #[serde(rename = "introductionURL")]
    pub introduction_url: String,
    #[serde(rename = "revocationList")]
    pub revocation_list: String,
    #[serde(rename = "publicKey")]
    pub public_keys: Vec<ProfileKey>,
}

/// One key in the profile's key history.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileKey {
    pub id: String,
    pub created: DateTime<Utc>,
    /// Set once the key has been rotated out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
}

/// Build the profile. Fails if the issuer's key ring is inconsistent,
/// since verifiers would otherwise see an issuer with no usable key.
pub fn issuer_profile(issuer: &Issuer, urls: &PublicUrls) -> Result<IssuerProfile, IdentityError> {
    issuer
        .keys
        .active()
        .map_err(|source| IdentityError::InvariantViolation {
            issuer_id: issuer.id,
            source,
        })?;

    Ok(IssuerProfile {
        context: CONTEXTS.iter().map(|c| c.to_string()).collect(),
        kind: "Profile".into(),
        id: urls.profile(&issuer.id),
        name: issuer.name.clone(),
        url: issuer.url.clone(),
        email: issuer.email.to_string(),
        image: issuer.image.clone(),
        introduction_url: urls.introduction(&issuer.id),
        revocation_list: urls.revocations(&issuer.id),
        public_keys: issuer
            .keys
            .iter()
            .map(|k| ProfileKey {
                id: koblitz(k.public_key()),
                created: k.date_created,
                expires: k.date_revoked,
            })
            .collect(),
    })
}

/// Open Badges revocation list.
#[derive(Debug, Clone, Serialize)]
pub struct RevocationList {
    #[serde(rename = "@context")]
    pub context: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub issuer: String,
    #[serde(rename = "revokedAssertions")]
    pub revoked_assertions: Vec<RevokedAssertion>,
}

/// One revoked certificate.
#[derive(Debug, Clone, Serialize)]
pub struct RevokedAssertion {
    pub id: String,
    #[serde(rename = "revocationReason")]
    pub revocation_reason: String,
}

/// Build the issuer's revocation list.
pub fn revocation_list(issuer: &Issuer, urls: &PublicUrls) -> RevocationList {
    RevocationList {
        context: CONTEXTS[0].to_string(),
        kind: "RevocationList".into(),
        id: urls.revocations(&issuer.id),
        issuer: urls.profile(&issuer.id),
        revoked_assertions: issuer
            .revocations
            .iter()
            .map(|r| RevokedAssertion {
                id: r.certificate_id.urn(),
                revocation_reason: r.reason.clone(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::tests::{key, new_issuer};
    use crate::directory::Directory;
    use crate::records::Revocation;
    use ubadge_core::CertificateId;

    #[test]
    fn profile_lists_key_history() {
        let dir = Directory::new();
        let issuer = dir.create_issuer(new_issuer("Acme"), key("a")).unwrap();
        let issuer = dir.rotate_key(&issuer.id, key("b")).unwrap();
        let urls = PublicUrls::new("https://badges.example");

        let profile = issuer_profile(&issuer, &urls).unwrap();
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["type"], "Profile");
        assert_eq!(json["id"], urls.profile(&issuer.id));
        assert_eq!(json["introductionURL"], urls.introduction(&issuer.id));
        assert_eq!(json["publicKey"].as_array().unwrap().len(), 2);
        assert_eq!(json["publicKey"][0]["id"], "ecdsa-koblitz-pubkey:pub-a");
        assert!(json["publicKey"][0].get("expires").is_some());
        assert!(json["publicKey"][1].get("expires").is_none());
    }

    #[test]
    fn profile_requires_active_key() {
        let dir = Directory::new();
        let mut issuer = dir.create_issuer(new_issuer("Acme"), key("a")).unwrap();
        issuer.keys.keys_mut()[0].date_revoked = Some(Utc::now());
        let urls = PublicUrls::new("https://badges.example");
        assert!(matches!(
            issuer_profile(&issuer, &urls),
            Err(IdentityError::InvariantViolation { .. })
        ));
    }

    #[test]
    fn revocation_list_uses_urns() {
        let dir = Directory::new();
        let mut issuer = dir.create_issuer(new_issuer("Acme"), key("a")).unwrap();
        let cert = CertificateId::new();
        issuer.revocations.push(Revocation {
            certificate_id: cert,
            reason: "Issued in error.".into(),
            revoked_at: Utc::now(),
        });
        let urls = PublicUrls::new("https://badges.example");
        let list = revocation_list(&issuer, &urls);
        let json = serde_json::to_value(&list).unwrap();
        assert_eq!(json["@context"], "https://w3id.org/openbadges/v2");
        assert_eq!(json["type"], "RevocationList");
        assert_eq!(json["issuer"], urls.profile(&issuer.id));
        assert_eq!(json["revokedAssertions"][0]["id"], cert.urn());
        assert_eq!(json["revokedAssertions"][0]["revocationReason"], "Issued in error.");
    }
}
