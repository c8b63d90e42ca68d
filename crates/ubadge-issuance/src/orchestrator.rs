//! # Issuance Orchestrator
//!
//! Drives the directory, the invite book and the assembler for the two
//! entry points of the issuance workflow:
//!
//! - [`IssuanceOrchestrator::issue`]: certify each listed recipient who
//!   already has an address with the issuer, and invite the rest.
//! - [`IssuanceOrchestrator::accept_invite`]: redeem a nonce, register the
//!   recipient's address and certify every badge the invite accumulated.
//!
//! ## Failure isolation
//!
//! Unknown issuer or badge fails the whole call. Past that point each
//! recipient (or each badge, on redemption) succeeds or fails on its own:
//! failures are recorded in the returned report and processing continues
//! with the next one. Certificate issuance is not retried and not
//! deduplicated; issuing the same badge twice to an addressed recipient
//! produces two certificates.

use std::sync::Arc;

use serde::Serialize;

use ubadge_core::{BadgeId, EmailAddress, InviteId, IssuerId, RecipientId};

use crate::artifact::ArtifactStore;
use crate::certificate::{artifact_path, assemble};
use crate::directory::Directory;
use crate::error::IssuanceError;
use crate::invite::{Invite, InviteBook, InviteOutcome};
use crate::notify::{invite_body, EmailDispatcher, EmailMessage};
use crate::records::{Badge, CertificateRef, Issuer, Recipient};
use crate::urls::PublicUrls;

/// Default sender of invite emails.
pub const DEFAULT_MAIL_FROM: &str = "digitalbadges@localhost";

/// Default invite email subject.
pub const DEFAULT_MAIL_SUBJECT: &str = "[DX - uBadge]";

/// Deployment-specific settings for the orchestrator.
#[derive(Debug, Clone)]
pub struct IssuanceSettings {
    pub urls: PublicUrls,
    pub mail_from: String,
    pub mail_subject: String,
}

impl IssuanceSettings {
    /// Settings with the default sender and subject.
    pub fn new(urls: PublicUrls) -> Self {
        Self {
            urls,
            mail_from: DEFAULT_MAIL_FROM.to_string(),
            mail_subject: DEFAULT_MAIL_SUBJECT.to_string(),
        }
    }
}

/// One recipient named in an issue request.
#[derive(Debug, Clone)]
pub struct RecipientInput {
    pub name: String,
    pub email: EmailAddress,
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Whether an invite email reached the mail transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Delivery {
    Sent,
    Failed(String),
}

/// What happened to one recipient of an issue request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientStatus {
    /// A certificate was assembled and stored.
    Certified(CertificateRef),
    /// An invite was opened, or the badge was added to an open one, and an
    /// email was attempted.
    Invited {
        invite_id: InviteId,
        resent: bool,
        delivery: Delivery,
    },
    /// The badge was already pending on the recipient's open invite. The
    /// email was attempted again with the same nonce.
    AlreadyInvited {
        invite_id: InviteId,
        delivery: Delivery,
    },
    /// Processing failed for this recipient only.
    Failed { reason: String },
}

/// Per-recipient result of [`IssuanceOrchestrator::issue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientOutcome {
    pub recipient_id: RecipientId,
    pub email: EmailAddress,
    pub status: RecipientStatus,
}

/// Aggregate result of an issue request, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuanceReport {
    pub issuer_id: IssuerId,
    pub badge_id: BadgeId,
    pub outcomes: Vec<RecipientOutcome>,
}

impl IssuanceReport {
    /// Certificates issued by this request.
    pub fn certificates(&self) -> impl Iterator<Item = &CertificateRef> {
        self.outcomes.iter().filter_map(|o| match &o.status {
            RecipientStatus::Certified(cert) => Some(cert),
            _ => None,
        })
    }

    /// Outcomes that failed.
    pub fn failures(&self) -> impl Iterator<Item = &RecipientOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, RecipientStatus::Failed { .. }))
    }
}

/// Result of certifying one accumulated badge on redemption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BadgeStatus {
    Certified(CertificateRef),
    Failed { reason: String },
}

/// Per-badge result of [`IssuanceOrchestrator::accept_invite`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadgeOutcome {
    pub badge_id: BadgeId,
    pub status: BadgeStatus,
}

/// Aggregate result of an invite redemption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptanceReport {
    pub invite_id: InviteId,
    pub issuer_id: IssuerId,
    pub recipient_id: RecipientId,
    pub outcomes: Vec<BadgeOutcome>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Composes the issuance workflow over injected stores and collaborators.
#[derive(Clone)]
pub struct IssuanceOrchestrator {
    directory: Directory,
    invites: InviteBook,
    artifacts: Arc<dyn ArtifactStore>,
    mailer: Arc<dyn EmailDispatcher>,
    settings: IssuanceSettings,
}

impl std::fmt::Debug for IssuanceOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuanceOrchestrator")
            .field("directory", &self.directory)
            .field("invites", &self.invites)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl IssuanceOrchestrator {
    /// Wire the orchestrator to its stores and collaborators.
    pub fn new(
        directory: Directory,
        invites: InviteBook,
        artifacts: Arc<dyn ArtifactStore>,
        mailer: Arc<dyn EmailDispatcher>,
        settings: IssuanceSettings,
    ) -> Self {
        Self {
            directory,
            invites,
            artifacts,
            mailer,
            settings,
        }
    }

    /// The identity & key store.
    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// The invite store.
    pub fn invites(&self) -> &InviteBook {
        &self.invites
    }

    /// Deployment settings.
    pub fn settings(&self) -> &IssuanceSettings {
        &self.settings
    }

    /// Issue `badge_id` to every recipient in `recipients`.
    ///
    /// Recipients are resolved (or created) by email. Those holding an
    /// address for the issuer are certified immediately; the others get an
    /// invite and an email carrying its nonce, on every request.
    ///
    /// # Errors
    ///
    /// `NotFound` if the issuer or badge is unknown. Per-recipient failures
    /// are reported in the [`IssuanceReport`], not returned.
    pub fn issue(
        &self,
        issuer_id: &IssuerId,
        badge_id: &BadgeId,
        recipients: &[RecipientInput],
    ) -> Result<IssuanceReport, IssuanceError> {
        let issuer = self.directory.issuer(issuer_id)?;
        let badge = self.directory.badge(issuer_id, badge_id)?;

        let outcomes: Vec<RecipientOutcome> = recipients
            .iter()
            .map(|input| {
                let (recipient, _) = self.directory.resolve_recipient(&input.name, &input.email);
                let status = if recipient.is_addressed_for(issuer_id) {
                    self.certify_or_record(&issuer, &recipient, &badge)
                } else {
                    self.invite(&issuer, &badge, &recipient)
                };
                RecipientOutcome {
                    recipient_id: recipient.id,
                    email: recipient.email,
                    status,
                }
            })
            .collect();

        let report = IssuanceReport {
            issuer_id: *issuer_id,
            badge_id: *badge_id,
            outcomes,
        };
        tracing::info!(
            %issuer_id,
            %badge_id,
            recipients = report.outcomes.len(),
            certified = report.certificates().count(),
            failed = report.failures().count(),
            "issuance processed"
        );
        Ok(report)
    }

    /// Redeem `nonce` for `issuer_id`, register `address`, and certify every
    /// badge the invite accumulated. The invite is deleted last.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the issuer is unknown.
    /// - `InvalidNonce` / `IssuerMismatch` from the invite book.
    /// - A failure to delete the invite after replay is returned rather
    ///   than ignored, even though certificates were already issued.
    pub fn accept_invite(
        &self,
        issuer_id: &IssuerId,
        nonce: &str,
        address: &str,
    ) -> Result<AcceptanceReport, IssuanceError> {
        let issuer = self.directory.issuer(issuer_id)?;

        let mut registered: Option<Recipient> = None;
        let invite = self.invites.redeem(nonce, issuer_id, |invite| {
            let recipient =
                self.directory
                    .register_address(&invite.recipient_id, issuer_id, address)?;
            registered = Some(recipient);
            Ok::<(), IssuanceError>(())
        })?;
        let recipient = match registered {
            Some(recipient) => recipient,
            None => self.directory.recipient(&invite.recipient_id)?,
        };

        let outcomes: Vec<BadgeOutcome> = invite
            .badges
            .iter()
            .map(|badge_id| {
                let status = match self.directory.badge(issuer_id, badge_id) {
                    Ok(badge) => match self.certify(&issuer, &recipient, &badge) {
                        Ok(cert) => BadgeStatus::Certified(cert),
                        Err(err) => BadgeStatus::Failed {
                            reason: err.to_string(),
                        },
                    },
                    Err(err) => BadgeStatus::Failed {
                        reason: err.to_string(),
                    },
                };
                if let BadgeStatus::Failed { reason } = &status {
                    tracing::warn!(%issuer_id, %badge_id, recipient_id = %recipient.id, %reason, "badge replay failed");
                }
                BadgeOutcome {
                    badge_id: *badge_id,
                    status,
                }
            })
            .collect();

        self.invites.complete(&invite.id).map_err(|err| {
            tracing::error!(invite_id = %invite.id, error = %err, "redeemed invite could not be deleted");
            err
        })?;

        tracing::info!(
            invite_id = %invite.id,
            %issuer_id,
            recipient_id = %recipient.id,
            badges = outcomes.len(),
            "invite accepted"
        );
        Ok(AcceptanceReport {
            invite_id: invite.id,
            issuer_id: *issuer_id,
            recipient_id: recipient.id,
            outcomes,
        })
    }

    /// Assemble, store and record one certificate.
    fn certify(
        &self,
        issuer: &Issuer,
        recipient: &Recipient,
        badge: &Badge,
    ) -> Result<CertificateRef, IssuanceError> {
        let cert = assemble(issuer, recipient, badge, &self.settings.urls)?;
        let path = artifact_path(cert.issued_on, &issuer.id, &cert.certificate_id());
        let bytes = serde_json::to_vec_pretty(&cert)?;
        let location = self.artifacts.upload(&path, &bytes, true)?;

        let reference = CertificateRef {
            id: cert.certificate_id(),
            issuer_id: issuer.id,
            badge_id: badge.id,
            location,
            issued_on: cert.issued_on,
        };
        self.directory
            .append_certificate(&recipient.id, reference.clone())?;
        tracing::info!(
            certificate_id = %reference.id,
            issuer_id = %issuer.id,
            badge_id = %badge.id,
            recipient_id = %recipient.id,
            "certificate issued"
        );
        Ok(reference)
    }

    fn certify_or_record(&self, issuer: &Issuer, recipient: &Recipient, badge: &Badge) -> RecipientStatus {
        match self.certify(issuer, recipient, badge) {
            Ok(cert) => RecipientStatus::Certified(cert),
            Err(err) => {
                tracing::warn!(
                    issuer_id = %issuer.id,
                    recipient_id = %recipient.id,
                    error = %err,
                    "certificate issuance failed"
                );
                RecipientStatus::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }

    fn invite(&self, issuer: &Issuer, badge: &Badge, recipient: &Recipient) -> RecipientStatus {
        // The snapshot in `recipient` may predate a redemption that finished
        // since; the invite book re-checks the address under its lock.
        let addressed = || {
            self.directory
                .recipient(&recipient.id)
                .map(|current| current.is_addressed_for(&issuer.id))
                .map_err(IssuanceError::from)
        };
        let outcome = match self.invites.create_or_append_unless_addressed(
            issuer.id,
            recipient.id,
            badge.id,
            addressed,
        ) {
            Ok(Some(outcome)) => outcome,
            Ok(None) => return self.certify_current(issuer, recipient, badge),
            Err(err) => return failed_invite(issuer, recipient, err),
        };

        match outcome {
            InviteOutcome::Unchanged(invite) => RecipientStatus::AlreadyInvited {
                invite_id: invite.id,
                delivery: self.notify(issuer, recipient, &invite),
            },
            // Redemption registers the address before it flips the state.
            InviteOutcome::Redeeming(_) => self.certify_current(issuer, recipient, badge),
            InviteOutcome::Send(invite) => RecipientStatus::Invited {
                invite_id: invite.id,
                resent: false,
                delivery: self.notify(issuer, recipient, &invite),
            },
            InviteOutcome::Resend(invite) => RecipientStatus::Invited {
                invite_id: invite.id,
                resent: true,
                delivery: self.notify(issuer, recipient, &invite),
            },
        }
    }

    /// Re-read the recipient and certify if an address has been registered
    /// since `stale` was loaded.
    fn certify_current(&self, issuer: &Issuer, stale: &Recipient, badge: &Badge) -> RecipientStatus {
        match self.directory.recipient(&stale.id) {
            Ok(current) if current.is_addressed_for(&issuer.id) => {
                self.certify_or_record(issuer, &current, badge)
            }
            Ok(_) => RecipientStatus::Failed {
                reason: "invite redemption in progress".to_string(),
            },
            Err(err) => RecipientStatus::Failed {
                reason: err.to_string(),
            },
        }
    }

    fn notify(&self, issuer: &Issuer, recipient: &Recipient, invite: &Invite) -> Delivery {
        let message = EmailMessage {
            from: self.settings.mail_from.clone(),
            to: vec![recipient.email.to_string()],
            subject: self.settings.mail_subject.clone(),
            body: invite_body(
                &issuer.name,
                &self.settings.urls.profile(&issuer.id),
                invite.nonce(),
            ),
            is_html: true,
        };
        match self.mailer.send(&message) {
            Ok(()) => Delivery::Sent,
            Err(err) => {
                tracing::warn!(
                    invite_id = %invite.id,
                    recipient_id = %recipient.id,
                    error = %err,
                    "invite email not dispatched"
                );
                Delivery::Failed(err.to_string())
            }
        }
    }
}

fn failed_invite(issuer: &Issuer, recipient: &Recipient, err: IssuanceError) -> RecipientStatus {
    tracing::warn!(
        issuer_id = %issuer.id,
        recipient_id = %recipient.id,
        error = %err,
        "invite could not be opened"
    );
    RecipientStatus::Failed {
        reason: err.to_string(),
    }
}
