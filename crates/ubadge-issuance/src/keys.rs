//! # Issuer Key Ring
//!
//! Each issuer owns an ordered sequence of keys. Keys are never deleted;
//! rotation stamps `date_revoked` on the outgoing key and appends the new
//! one.
//!
//! ## Invariant
//!
//! Exactly one key in a ring has no revocation date. [`KeyRing::rotate`]
//! is the only way to add a key after creation, and it revokes every
//! unrevoked key before appending, so a ring that somehow held several
//! active keys collapses back to one on the next rotation.
//! [`KeyRing::active`] still checks the invariant on every read.

use std::fmt;

use chrono::{DateTime, Utc};
use ed25519_dalek::SigningKey;
use rand_core::OsRng;
use serde::ser::SerializeStruct;
use serde::Serialize;
use thiserror::Error;
use zeroize::Zeroizing;

/// Key ring invariant failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyRingError {
    /// Every key in the ring has been revoked.
    #[error("no active key")]
    NoActiveKey,

    /// More than one key lacks a revocation date.
    #[error("{count} keys are active, expected exactly one")]
    MultipleActiveKeys {
        /// Number of unrevoked keys found.
        count: usize,
    },
}

// ---------------------------------------------------------------------------
// Key material
// ---------------------------------------------------------------------------

/// A public/private key pair as supplied by an operator or generated here.
///
/// The private half is zeroized when dropped and redacted from `Debug`.
#[derive(Clone)]
pub struct KeyMaterial {
    public_key: String,
    private_key: Zeroizing<String>,
}

impl KeyMaterial {
    /// Wrap externally supplied key material.
    pub fn new(public_key: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            private_key: Zeroizing::new(private_key.into()),
        }
    }

    /// Generate a fresh Ed25519 key pair, hex encoded.
    pub fn generate() -> Self {
        let signing = SigningKey::generate(&mut OsRng);
        let secret = Zeroizing::new(signing.to_bytes());
        Self {
            public_key: hex_encode(signing.verifying_key().as_bytes()),
            private_key: Zeroizing::new(hex_encode(&secret[..])),
        }
    }

    /// The public half.
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// The private half.
    pub fn private_key(&self) -> &str {
        &self.private_key
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("public_key", &self.public_key)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Issuer keys
// ---------------------------------------------------------------------------

/// One entry in an issuer's key ring.
///
/// Serializes without the private half.
#[derive(Debug, Clone)]
pub struct IssuerKey {
    material: KeyMaterial,
    /// When this key was registered.
    pub date_created: DateTime<Utc>,
    /// When this key was superseded. `None` for the active key.
    pub date_revoked: Option<DateTime<Utc>>,
}

impl Serialize for IssuerKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("IssuerKey", 3)?;
        state.serialize_field("public_key", self.public_key())?;
        state.serialize_field("date_created", &self.date_created)?;
        state.serialize_field("date_revoked", &self.date_revoked)?;
        state.end()
    }
}

impl IssuerKey {
    fn new(material: KeyMaterial, now: DateTime<Utc>) -> Self {
        Self {
            material,
            date_created: now,
            date_revoked: None,
        }
    }

    /// The public key.
    pub fn public_key(&self) -> &str {
        self.material.public_key()
    }

    /// The full key material, including the private half.
    pub fn material(&self) -> &KeyMaterial {
        &self.material
    }

    /// Whether this key is still active.
    pub fn is_active(&self) -> bool {
        self.date_revoked.is_none()
    }
}

// ---------------------------------------------------------------------------
// Key ring
// ---------------------------------------------------------------------------

/// Ordered key history for one issuer, oldest first.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct KeyRing {
    keys: Vec<IssuerKey>,
}

impl KeyRing {
    /// Start a ring with its initial active key.
    pub fn new(initial: KeyMaterial, now: DateTime<Utc>) -> Self {
        Self {
            keys: vec![IssuerKey::new(initial, now)],
        }
    }

    /// The single unrevoked key.
    pub fn active(&self) -> Result<&IssuerKey, KeyRingError> {
        let mut active = self.keys.iter().filter(|k| k.is_active());
        match (active.next(), active.next()) {
            (Some(key), None) => Ok(key),
            (None, _) => Err(KeyRingError::NoActiveKey),
            (Some(_), Some(_)) => Err(KeyRingError::MultipleActiveKeys {
                count: self.keys.iter().filter(|k| k.is_active()).count(),
            }),
        }
    }

    /// Revoke every active key at `now` and append `material` as the new
    /// active key.
    pub fn rotate(&mut self, material: KeyMaterial, now: DateTime<Utc>) {
        for key in self.keys.iter_mut().filter(|k| k.is_active()) {
            key.date_revoked = Some(now);
        }
        self.keys.push(IssuerKey::new(material, now));
    }

    /// All keys, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &IssuerKey> {
        self.keys.iter()
    }

    /// Number of keys ever registered.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the ring holds no keys.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn keys_mut(&mut self) -> &mut Vec<IssuerKey> {
        &mut self.keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn material(tag: &str) -> KeyMaterial {
        KeyMaterial::new(format!("pub-{tag}"), format!("priv-{tag}"))
    }

    #[test]
    fn new_ring_has_one_active_key() {
        let now = Utc::now();
        let ring = KeyRing::new(material("a"), now);
        let active = ring.active().unwrap();
        assert_eq!(active.public_key(), "pub-a");
        assert_eq!(active.date_created, now);
        assert!(active.date_revoked.is_none());
    }

    #[test]
    fn rotate_revokes_previous_key() {
        let t0 = Utc::now();
        let t1 = t0 + Duration::seconds(10);
        let mut ring = KeyRing::new(material("a"), t0);
        ring.rotate(material("b"), t1);

        assert_eq!(ring.len(), 2);
        assert_eq!(ring.active().unwrap().public_key(), "pub-b");
        let old = ring.iter().next().unwrap();
        assert_eq!(old.date_revoked, Some(t1));
    }

    #[test]
    fn active_detects_multiple_unrevoked_keys() {
        let now = Utc::now();
        let mut ring = KeyRing::new(material("a"), now);
        ring.keys_mut().push(IssuerKey::new(material("b"), now));
        assert_eq!(
            ring.active().unwrap_err(),
            KeyRingError::MultipleActiveKeys { count: 2 }
        );
    }

    #[test]
    fn rotate_collapses_multiple_active_keys() {
        let now = Utc::now();
        let mut ring = KeyRing::new(material("a"), now);
        ring.keys_mut().push(IssuerKey::new(material("b"), now));
        ring.rotate(material("c"), now);
        assert_eq!(ring.active().unwrap().public_key(), "pub-c");
    }

    #[test]
    fn active_detects_fully_revoked_ring() {
        let now = Utc::now();
        let mut ring = KeyRing::new(material("a"), now);
        ring.keys_mut()[0].date_revoked = Some(now);
        assert_eq!(ring.active().unwrap_err(), KeyRingError::NoActiveKey);
    }

    #[test]
    fn generated_material_is_hex_ed25519() {
        let key = KeyMaterial::generate();
        assert_eq!(key.public_key().len(), 64);
        assert_eq!(key.private_key().len(), 64);
        assert!(key.public_key().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key.public_key(), KeyMaterial::generate().public_key());
    }

    #[test]
    fn debug_redacts_private_key() {
        let rendered = format!("{:?}", material("secret"));
        assert!(rendered.contains("pub-secret"));
        assert!(!rendered.contains("priv-secret"));
    }

    #[test]
    fn serialization_omits_private_key() {
        let ring = KeyRing::new(material("a"), Utc::now());
        let json = serde_json::to_value(&ring).unwrap();
        let entry = &json[0];
        assert_eq!(entry["public_key"], "pub-a");
        assert!(entry.get("private_key").is_none());
        assert!(entry["date_revoked"].is_null());
    }

    proptest! {
        #[test]
        fn any_rotation_sequence_keeps_one_active_key(rotations in 0usize..20) {
            let now = Utc::now();
            let mut ring = KeyRing::new(material("0"), now);
            for i in 0..rotations {
                ring.rotate(material(&i.to_string()), now + Duration::seconds(i as i64 + 1));
            }
            prop_assert_eq!(ring.len(), rotations + 1);
            prop_assert_eq!(ring.iter().filter(|k| k.is_active()).count(), 1);
            prop_assert!(ring.active().is_ok());
        }
    }
}
