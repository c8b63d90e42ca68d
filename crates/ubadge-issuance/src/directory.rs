//! # Identity & Key Store
//!
//! The [`Directory`] owns issuer, badge and recipient records and is the only
//! path through which they change. Every uniqueness check runs under the
//! same lock as the write it guards, so two concurrent creates with the same
//! issuer name, badge name or recipient email cannot both succeed.
//!
//! ## Rules
//!
//! - Issuer names are unique across issuers.
//! - Badge names are unique across the whole system.
//! - Recipient email is the deduplication key, compared exactly.
//! - Key rotation revokes the prior active key and appends the new one in
//!   a single update.

use std::collections::BTreeMap;

use chrono::Utc;

use ubadge_core::error::require_non_empty;
use ubadge_core::{
    BadgeId, CertificateId, EmailAddress, IssuerId, RecipientId, Store, UserId,
};

use crate::error::IdentityError;
use crate::keys::{IssuerKey, KeyMaterial, KeyRing};
use crate::records::{
    Badge, CertificateRef, Criteria, Issuer, Recipient, Revocation, SignatureLine,
};

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Fields for a new issuer.
#[derive(Debug, Clone)]
pub struct NewIssuer {
    pub owner_id: UserId,
    pub name: String,
    pub email: EmailAddress,
    pub url: String,
    pub image: String,
}

/// Partial issuer update. `None` leaves a field unchanged; a `key` rotates.
#[derive(Debug, Clone, Default)]
pub struct IssuerUpdate {
    pub owner_id: Option<UserId>,
    pub name: Option<String>,
    pub email: Option<EmailAddress>,
    pub url: Option<String>,
    pub image: Option<String>,
    pub key: Option<KeyMaterial>,
}

/// Fields for a new badge.
#[derive(Debug, Clone)]
pub struct NewBadge {
    pub name: String,
    pub description: String,
    pub criteria: Criteria,
    pub image: String,
    pub signature_lines: Vec<SignatureLine>,
    pub template: u32,
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

/// Issuer, badge and recipient records. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    issuers: Store<IssuerId, Issuer>,
    badges: Store<BadgeId, Badge>,
    recipients: Store<RecipientId, Recipient>,
}

impl Directory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    // -- Issuers ----------------------------------------------------------

    /// Register an issuer with its initial key.
    ///
    /// Fails with `Conflict` if another issuer already has this name.
    pub fn create_issuer(&self, new: NewIssuer, key: KeyMaterial) -> Result<Issuer, IdentityError> {
        require_non_empty("name", &new.name)?;
        let now = Utc::now();
        let issuer = Issuer {
            id: IssuerId::new(),
            owner_id: new.owner_id,
            name: new.name,
            email: new.email,
            url: new.url,
            image: new.image,
            keys: KeyRing::new(key, now),
            revocations: Vec::new(),
            created_at: now,
        };

        self.issuers.transact(|map| {
            if map.values().any(|i| i.name == issuer.name) {
                return Err(name_taken("issuer", &issuer.name));
            }
            map.insert(issuer.id, issuer.clone());
            Ok(())
        })?;

        tracing::info!(issuer_id = %issuer.id, name = %issuer.name, "issuer created");
        Ok(issuer)
    }

    /// Fetch an issuer.
    pub fn issuer(&self, id: &IssuerId) -> Result<Issuer, IdentityError> {
        self.issuers
            .get(id)
            .ok_or_else(|| IdentityError::not_found("issuer", id))
    }

    /// All issuers, oldest first.
    pub fn issuers(&self) -> Vec<Issuer> {
        let mut all = self.issuers.list();
        all.sort_by_key(|i| i.created_at);
        all
    }

    /// Issuers administered by `owner_id`, oldest first.
    pub fn issuers_owned_by(&self, owner_id: &UserId) -> Vec<Issuer> {
        let mut owned = self.issuers.filter(|i| &i.owner_id == owner_id);
        owned.sort_by_key(|i| i.created_at);
        owned
    }

    /// Apply a partial update.
    ///
    /// Fails with `NotFound` for an unknown id, then `Conflict` if the new
    /// name belongs to a different issuer.
    pub fn update_issuer(&self, id: &IssuerId, update: IssuerUpdate) -> Result<Issuer, IdentityError> {
        if let Some(name) = &update.name {
            require_non_empty("name", name)?;
        }

        let updated = self.issuers.transact(|map| {
            if !map.contains_key(id) {
                return Err(IdentityError::not_found("issuer", id));
            }
            if let Some(name) = &update.name {
                if map.values().any(|i| &i.name == name && &i.id != id) {
                    return Err(name_taken("issuer", name));
                }
            }
            let issuer = map
                .get_mut(id)
                .ok_or_else(|| IdentityError::not_found("issuer", id))?;
            if let Some(owner_id) = update.owner_id {
                issuer.owner_id = owner_id;
            }
            if let Some(name) = update.name {
                issuer.name = name;
            }
            if let Some(email) = update.email {
                issuer.email = email;
            }
            if let Some(url) = update.url {
                issuer.url = url;
            }
            if let Some(image) = update.image {
                issuer.image = image;
            }
            if let Some(key) = update.key {
                issuer.keys.rotate(key, Utc::now());
            }
            Ok(issuer.clone())
        })?;

        tracing::info!(issuer_id = %id, "issuer updated");
        Ok(updated)
    }

    /// Revoke the current key and make `key` the active one.
    pub fn rotate_key(&self, id: &IssuerId, key: KeyMaterial) -> Result<Issuer, IdentityError> {
        let issuer = self
            .issuers
            .update(id, |issuer| issuer.keys.rotate(key, Utc::now()))
            .ok_or_else(|| IdentityError::not_found("issuer", id))?;
        tracing::info!(issuer_id = %id, keys = issuer.keys.len(), "issuer key rotated");
        Ok(issuer)
    }

    /// The issuer's single unrevoked key.
    ///
    /// Fails with `InvariantViolation` if the ring has zero or several.
    pub fn active_key(&self, id: &IssuerId) -> Result<IssuerKey, IdentityError> {
        let issuer = self.issuer(id)?;
        let key = issuer
            .keys
            .active()
            .map_err(|source| IdentityError::InvariantViolation {
                issuer_id: *id,
                source,
            })?;
        Ok(key.clone())
    }

    /// Add a certificate to the issuer's revocation set.
    ///
    /// The certificate must have been issued by this issuer to some
    /// recipient. Fails with `Conflict` if it is already revoked.
    pub fn revoke_certificate(
        &self,
        issuer_id: &IssuerId,
        certificate_id: CertificateId,
        reason: String,
    ) -> Result<Issuer, IdentityError> {
        require_non_empty("reason", &reason)?;
        self.issuer(issuer_id)?;

        let issued_here = self
            .recipients
            .find(|r| {
                r.certificates
                    .iter()
                    .any(|c| c.id == certificate_id && &c.issuer_id == issuer_id)
            })
            .is_some();
        if !issued_here {
            return Err(IdentityError::not_found("certificate", certificate_id));
        }

        let issuer = self
            .issuers
            .try_update(issuer_id, |issuer| {
                if issuer
                    .revocations
                    .iter()
                    .any(|r| r.certificate_id == certificate_id)
                {
                    return Err(IdentityError::Conflict(format!(
                        "certificate {certificate_id} is already revoked"
                    )));
                }
                issuer.revocations.push(Revocation {
                    certificate_id,
                    reason,
                    revoked_at: Utc::now(),
                });
                Ok(issuer.clone())
            })
            .ok_or_else(|| IdentityError::not_found("issuer", issuer_id))??;

        tracing::info!(%issuer_id, %certificate_id, "certificate revoked");
        Ok(issuer)
    }

    // -- Badges -----------------------------------------------------------

    /// Define a badge for an issuer. Badge names are unique system-wide.
    pub fn create_badge(&self, issuer_id: &IssuerId, new: NewBadge) -> Result<Badge, IdentityError> {
        require_non_empty("name", &new.name)?;
        self.issuer(issuer_id)?;

        let badge = Badge {
            id: BadgeId::new(),
            issuer_id: *issuer_id,
            name: new.name,
            description: new.description,
            criteria: new.criteria,
            image: new.image,
            signature_lines: new.signature_lines,
            template: new.template,
            created_at: Utc::now(),
        };

        self.badges.transact(|map| {
            if map.values().any(|b| b.name == badge.name) {
                return Err(name_taken("badge", &badge.name));
            }
            map.insert(badge.id, badge.clone());
            Ok(())
        })?;

        tracing::info!(%issuer_id, badge_id = %badge.id, name = %badge.name, "badge created");
        Ok(badge)
    }

    /// Fetch a badge owned by `issuer_id`.
    ///
    /// A badge that exists under another issuer is reported as not found.
    pub fn badge(&self, issuer_id: &IssuerId, badge_id: &BadgeId) -> Result<Badge, IdentityError> {
        self.badges
            .get(badge_id)
            .filter(|b| &b.issuer_id == issuer_id)
            .ok_or_else(|| IdentityError::not_found("badge", badge_id))
    }

    /// Badges defined by `issuer_id`, oldest first.
    pub fn badges_for(&self, issuer_id: &IssuerId) -> Vec<Badge> {
        let mut badges = self.badges.filter(|b| &b.issuer_id == issuer_id);
        badges.sort_by_key(|b| b.created_at);
        badges
    }

    // -- Recipients -------------------------------------------------------

    /// Find the recipient with this email, creating one if none exists.
    ///
    /// Returns the record and whether it was created by this call. An
    /// existing recipient keeps its stored name.
    pub fn resolve_recipient(&self, name: &str, email: &EmailAddress) -> (Recipient, bool) {
        let (recipient, created) = self.recipients.transact(|map| {
            if let Some(existing) = map.values().find(|r| &r.email == email) {
                return (existing.clone(), false);
            }
            let recipient = Recipient {
                id: RecipientId::new(),
                name: name.to_string(),
                email: email.clone(),
                addresses: BTreeMap::new(),
                certificates: Vec::new(),
                created_at: Utc::now(),
            };
            map.insert(recipient.id, recipient.clone());
            (recipient, true)
        });
        if created {
            tracing::info!(recipient_id = %recipient.id, "recipient created");
        }
        (recipient, created)
    }

    /// Fetch a recipient.
    pub fn recipient(&self, id: &RecipientId) -> Result<Recipient, IdentityError> {
        self.recipients
            .get(id)
            .ok_or_else(|| IdentityError::not_found("recipient", id))
    }

    /// Fetch a recipient by exact email.
    pub fn recipient_by_email(&self, email: &EmailAddress) -> Option<Recipient> {
        self.recipients.find(|r| &r.email == email)
    }

    /// All recipients, oldest first.
    pub fn recipients(&self) -> Vec<Recipient> {
        let mut all = self.recipients.list();
        all.sort_by_key(|r| r.created_at);
        all
    }

    /// Record the address a recipient uses with `issuer_id`, replacing any
    /// earlier one.
    pub fn register_address(
        &self,
        recipient_id: &RecipientId,
        issuer_id: &IssuerId,
        address: &str,
    ) -> Result<Recipient, IdentityError> {
        require_non_empty("address", address)?;
        let recipient = self
            .recipients
            .update(recipient_id, |r| {
                r.addresses.insert(*issuer_id, address.to_string());
            })
            .ok_or_else(|| IdentityError::not_found("recipient", recipient_id))?;
        tracing::info!(%recipient_id, %issuer_id, "recipient address registered");
        Ok(recipient)
    }

    /// Append a certificate reference to the recipient's record.
    pub fn append_certificate(
        &self,
        recipient_id: &RecipientId,
        certificate: CertificateRef,
    ) -> Result<Recipient, IdentityError> {
        self.recipients
            .update(recipient_id, |r| r.certificates.push(certificate))
            .ok_or_else(|| IdentityError::not_found("recipient", recipient_id))
    }
}

fn name_taken(kind: &str, name: &str) -> IdentityError {
    IdentityError::Conflict(format!("{kind} name {name} is already taken"))
}
