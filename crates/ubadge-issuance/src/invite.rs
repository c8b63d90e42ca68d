//! # Invite State Machine
//!
//! Tracks pending issuance for recipients who have not yet registered an
//! address with an issuer.
//!
//! ## States
//!
//! ```text
//! (none) ──create──▶ OPEN ──append badge──▶ OPEN
//!                     │
//!                     └──redeem──▶ REDEEMING ──complete──▶ (deleted)
//! ```
//!
//! ## Invariants
//!
//! - At most one invite exists per (issuer, recipient) pair.
//! - A badge id appears at most once in an invite's badge set.
//! - No two open invites share a nonce. Redemption removes the nonce from
//!   the index, so a second redemption with the same nonce fails with
//!   [`InviteError::InvalidNonce`] even while the first is still replaying.
//!
//! Every operation runs under one lock over the invite table and its pair
//! and nonce indexes, which serializes invite creation per pair.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand_core::{OsRng, RngCore};
use serde::Serialize;

use ubadge_core::{BadgeId, InviteId, IssuerId, RecipientId};

use crate::error::InviteError;

/// Number of decimal digits in a generated nonce.
pub const NONCE_DIGITS: u32 = 6;

/// Draws attempted before giving up on finding an unused nonce.
pub const MAX_NONCE_ATTEMPTS: usize = 32;

// ---------------------------------------------------------------------------
// Nonce generation
// ---------------------------------------------------------------------------

/// Source of redemption nonces.
pub trait NonceSource: Send + Sync {
    /// Produce a candidate nonce. Uniqueness is checked by the caller.
    fn next_nonce(&self) -> String;
}

/// Uniformly random fixed-width decimal nonces from the OS RNG.
#[derive(Debug, Clone, Copy)]
pub struct DigitNonces {
    digits: u32,
}

impl DigitNonces {
    /// Nonces of `digits` decimal digits (1 to 9).
    pub fn new(digits: u32) -> Self {
        Self {
            digits: digits.clamp(1, 9),
        }
    }
}

impl Default for DigitNonces {
    fn default() -> Self {
        Self::new(NONCE_DIGITS)
    }
}

impl NonceSource for DigitNonces {
    fn next_nonce(&self) -> String {
        let bound = 10u32.pow(self.digits);
        // Rejection sampling keeps the distribution uniform.
        let zone = u32::MAX - (u32::MAX % bound);
        let value = loop {
            let draw = OsRng.next_u32();
            if draw < zone {
                break draw % bound;
            }
        };
        format!("{value:0width$}", width = self.digits as usize)
    }
}

// ---------------------------------------------------------------------------
// Invite record
// ---------------------------------------------------------------------------

/// Invite lifecycle state. A redeemed invite is deleted, not kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum InviteState {
    /// Waiting for the recipient to redeem the nonce.
    Open,
    /// Nonce accepted; certificates are being issued for the badge set.
    Redeeming,
}

impl InviteState {
    /// Canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Redeeming => "REDEEMING",
        }
    }
}

impl fmt::Display for InviteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pending issuance request for one (issuer, recipient) pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Invite {
    pub id: InviteId,
    pub issuer_id: IssuerId,
    pub recipient_id: RecipientId,
    nonce: String,
    /// Badges to certify on redemption, in the order they were requested.
    pub badges: Vec<BadgeId>,
    pub state: InviteState,
    pub created_at: DateTime<Utc>,
}

impl Invite {
    /// The redemption secret. Only the notification email should carry it.
    pub fn nonce(&self) -> &str {
        &self.nonce
    }
}

impl fmt::Debug for Invite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invite")
            .field("id", &self.id)
            .field("issuer_id", &self.issuer_id)
            .field("recipient_id", &self.recipient_id)
            .field("nonce", &"[REDACTED]")
            .field("badges", &self.badges)
            .field("state", &self.state)
            .finish()
    }
}

/// What `create_or_append` did, and whether the caller should notify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InviteOutcome {
    /// A new invite was opened. Send the invite email.
    Send(Invite),
    /// The badge was appended to an open invite. Send the email again.
    Resend(Invite),
    /// The badge was already pending. Send the email again with the same
    /// nonce.
    Unchanged(Invite),
    /// The pair's invite is mid-redemption, so the recipient already has
    /// an address. Certify directly instead.
    Redeeming(Invite),
}

impl InviteOutcome {
    /// The invite the outcome refers to.
    pub fn invite(&self) -> &Invite {
        match self {
            Self::Send(i) | Self::Resend(i) | Self::Unchanged(i) | Self::Redeeming(i) => i,
        }
    }

    /// Whether the recipient should receive an invite email.
    pub fn should_notify(&self) -> bool {
        !matches!(self, Self::Redeeming(_))
    }
}

// ---------------------------------------------------------------------------
// Invite book
// ---------------------------------------------------------------------------

#[derive(Default)]
struct InviteTable {
    by_id: HashMap<InviteId, Invite>,
    by_pair: HashMap<(IssuerId, RecipientId), InviteId>,
    by_nonce: HashMap<String, InviteId>,
}

/// The invite store. Clones share the same table.
#[derive(Clone)]
pub struct InviteBook {
    table: Arc<Mutex<InviteTable>>,
    nonces: Arc<dyn NonceSource>,
}

impl fmt::Debug for InviteBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InviteBook")
            .field("open", &self.table.lock().by_id.len())
            .finish()
    }
}

impl Default for InviteBook {
    fn default() -> Self {
        Self::new()
    }
}

impl InviteBook {
    /// An empty book drawing six-digit nonces.
    pub fn new() -> Self {
        Self::with_nonces(Arc::new(DigitNonces::default()))
    }

    /// An empty book with a custom nonce source.
    pub fn with_nonces(nonces: Arc<dyn NonceSource>) -> Self {
        Self {
            table: Arc::new(Mutex::new(InviteTable::default())),
            nonces,
        }
    }

    /// Open an invite for the pair, or add `badge_id` to the existing one.
    pub fn create_or_append(
        &self,
        issuer_id: IssuerId,
        recipient_id: RecipientId,
        badge_id: BadgeId,
    ) -> Result<InviteOutcome, InviteError> {
        let mut table = self.table.lock();
        if let Some(outcome) = append_to_existing(&mut table, issuer_id, recipient_id, badge_id)? {
            return Ok(outcome);
        }
        self.open(&mut table, issuer_id, recipient_id, badge_id)
    }

    /// Like [`create_or_append`](Self::create_or_append), but when the pair
    /// has no invite, `addressed` is consulted under the invite lock before
    /// one is opened. If it reports that the recipient already holds an
    /// address with the issuer, nothing is opened and `None` is returned.
    ///
    /// Redemption registers the address under the same lock, so a
    /// recipient whose invite was redeemed and deleted between the caller's
    /// own address check and this call is still seen as addressed.
    pub fn create_or_append_unless_addressed<E>(
        &self,
        issuer_id: IssuerId,
        recipient_id: RecipientId,
        badge_id: BadgeId,
        addressed: impl FnOnce() -> Result<bool, E>,
    ) -> Result<Option<InviteOutcome>, E>
    where
        E: From<InviteError>,
    {
        let mut table = self.table.lock();
        if let Some(outcome) = append_to_existing(&mut table, issuer_id, recipient_id, badge_id)? {
            return Ok(Some(outcome));
        }
        if addressed()? {
            tracing::debug!(%issuer_id, %recipient_id, "recipient addressed; no invite opened");
            return Ok(None);
        }
        Ok(Some(self.open(&mut table, issuer_id, recipient_id, badge_id)?))
    }

    fn open(
        &self,
        table: &mut InviteTable,
        issuer_id: IssuerId,
        recipient_id: RecipientId,
        badge_id: BadgeId,
    ) -> Result<InviteOutcome, InviteError> {
        let nonce = self.unused_nonce(table)?;
        let invite = Invite {
            id: InviteId::new(),
            issuer_id,
            recipient_id,
            nonce: nonce.clone(),
            badges: vec![badge_id],
            state: InviteState::Open,
            created_at: Utc::now(),
        };
        table.by_pair.insert((issuer_id, recipient_id), invite.id);
        table.by_nonce.insert(nonce, invite.id);
        table.by_id.insert(invite.id, invite.clone());

        tracing::info!(invite_id = %invite.id, %issuer_id, %recipient_id, "invite opened");
        Ok(InviteOutcome::Send(invite))
    }

    fn unused_nonce(&self, table: &InviteTable) -> Result<String, InviteError> {
        for _ in 0..MAX_NONCE_ATTEMPTS {
            let candidate = self.nonces.next_nonce();
            if !table.by_nonce.contains_key(&candidate) {
                return Ok(candidate);
            }
        }
        tracing::error!(attempts = MAX_NONCE_ATTEMPTS, "nonce space exhausted");
        Err(InviteError::NonceSpaceExhausted {
            attempts: MAX_NONCE_ATTEMPTS,
        })
    }

    /// Claim the invite holding `nonce` on behalf of `issuer_id`.
    ///
    /// `register` runs under the invite lock once the nonce and issuer have
    /// been checked; it is where the caller records the recipient's
    /// address. If it fails the invite stays open and untouched. On success
    /// the invite moves to `REDEEMING`, its nonce stops matching, and the
    /// invite is returned for badge replay. Call [`complete`](Self::complete)
    /// afterwards to delete it.
    pub fn redeem<E>(
        &self,
        nonce: &str,
        issuer_id: &IssuerId,
        register: impl FnOnce(&Invite) -> Result<(), E>,
    ) -> Result<Invite, E>
    where
        E: From<InviteError>,
    {
        let mut table = self.table.lock();

        let invite_id = *table.by_nonce.get(nonce).ok_or(InviteError::InvalidNonce)?;
        let invite = table
            .by_id
            .get(&invite_id)
            .ok_or(InviteError::NotFound(invite_id))?;
        if &invite.issuer_id != issuer_id {
            tracing::warn!(%invite_id, requested = %issuer_id, "nonce presented to wrong issuer");
            return Err(InviteError::IssuerMismatch {
                requested: *issuer_id,
                actual: invite.issuer_id,
            }
            .into());
        }

        register(invite)?;

        table.by_nonce.remove(nonce);
        let invite = table
            .by_id
            .get_mut(&invite_id)
            .ok_or(InviteError::NotFound(invite_id))?;
        invite.state = InviteState::Redeeming;
        tracing::info!(%invite_id, badges = invite.badges.len(), "invite redeemed");
        Ok(invite.clone())
    }

    /// Delete a redeemed invite. This is the terminal transition.
    pub fn complete(&self, invite_id: &InviteId) -> Result<Invite, InviteError> {
        let mut table = self.table.lock();
        let invite = table
            .by_id
            .remove(invite_id)
            .ok_or(InviteError::NotFound(*invite_id))?;
        let pair = (invite.issuer_id, invite.recipient_id);
        if table.by_pair.get(&pair) == Some(invite_id) {
            table.by_pair.remove(&pair);
        }
        if table.by_nonce.get(&invite.nonce) == Some(invite_id) {
            table.by_nonce.remove(&invite.nonce);
        }
        tracing::debug!(%invite_id, "invite deleted");
        Ok(invite)
    }

    /// Fetch an invite by id.
    pub fn get(&self, invite_id: &InviteId) -> Option<Invite> {
        self.table.lock().by_id.get(invite_id).cloned()
    }

    /// The invite for a pair, if one exists.
    pub fn for_pair(&self, issuer_id: &IssuerId, recipient_id: &RecipientId) -> Option<Invite> {
        let table = self.table.lock();
        let invite_id = table.by_pair.get(&(*issuer_id, *recipient_id))?;
        table.by_id.get(invite_id).cloned()
    }

    /// Invites opened by `issuer_id`, oldest first.
    pub fn for_issuer(&self, issuer_id: &IssuerId) -> Vec<Invite> {
        let mut invites: Vec<Invite> = self
            .table
            .lock()
            .by_id
            .values()
            .filter(|i| &i.issuer_id == issuer_id)
            .cloned()
            .collect();
        invites.sort_by_key(|i| i.created_at);
        invites
    }

    /// Number of invites currently held.
    pub fn len(&self) -> usize {
        self.table.lock().by_id.len()
    }

    /// Whether no invites are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Apply a request to the pair's existing invite, if there is one.
fn append_to_existing(
    table: &mut InviteTable,
    issuer_id: IssuerId,
    recipient_id: RecipientId,
    badge_id: BadgeId,
) -> Result<Option<InviteOutcome>, InviteError> {
    let Some(invite_id) = table.by_pair.get(&(issuer_id, recipient_id)).copied() else {
        return Ok(None);
    };
    let invite = table
        .by_id
        .get_mut(&invite_id)
        .ok_or(InviteError::NotFound(invite_id))?;
    if invite.state == InviteState::Redeeming {
        return Ok(Some(InviteOutcome::Redeeming(invite.clone())));
    }
    if invite.badges.contains(&badge_id) {
        return Ok(Some(InviteOutcome::Unchanged(invite.clone())));
    }
    invite.badges.push(badge_id);
    tracing::debug!(%invite_id, %badge_id, "badge appended to open invite");
    Ok(Some(InviteOutcome::Resend(invite.clone())))
}
