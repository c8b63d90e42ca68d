//! # Identity Newtypes
//!
//! Typed identifiers for every record in the system, plus the validated
//! [`EmailAddress`] used as the recipient deduplication key.
//!
//! UUID-based identifiers are always valid by construction. Each one can
//! render itself as a `urn:uuid:` string, the form embedded in certificate
//! documents.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// UUID-based identifiers
// ---------------------------------------------------------------------------

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident, $what:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Create a new random ", $what, " identifier.")]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a ", $what, " identifier from an existing UUID.")]
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Render as a `urn:uuid:` string.
            pub fn urn(&self) -> String {
                format!("urn:uuid:{}", self.0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_identifier!(
    /// Identifier of an issuing organization.
    IssuerId,
    "issuer"
);
uuid_identifier!(
    /// Identifier of a badge template defined by an issuer.
    BadgeId,
    "badge"
);
uuid_identifier!(
    /// Identifier of a credential recipient.
    RecipientId,
    "recipient"
);
uuid_identifier!(
    /// Identifier of a pending invite.
    InviteId,
    "invite"
);
uuid_identifier!(
    /// Identifier of an assembled certificate.
    CertificateId,
    "certificate"
);
uuid_identifier!(
    /// Identifier of an authenticated operator account.
    UserId,
    "user"
);

// ---------------------------------------------------------------------------
// Email address
// ---------------------------------------------------------------------------

const MAX_EMAIL_LEN: usize = 254;

/// A syntactically plausible email address.
///
/// Comparison is exact: no case folding is applied, so `A@x.com` and
/// `a@x.com` are different recipients.
///
/// # Validation
///
/// - Surrounding whitespace is trimmed; inner whitespace is rejected
/// - Non-empty local part and domain around the last `@`
/// - Domain contains a `.` that is neither first nor last
/// - At most 254 characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Validate and wrap an email address.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw: String = value.into();
        let trimmed = raw.trim();
        let reject = |reason| ValidationError::InvalidEmail {
            value: raw.clone(),
            reason,
        };

        if trimmed.len() > MAX_EMAIL_LEN {
            return Err(reject("longer than 254 characters"));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(reject("contains whitespace"));
        }
        let (local, domain) = trimmed.rsplit_once('@').ok_or_else(|| reject("missing '@'"))?;
        if local.is_empty() {
            return Err(reject("empty local part"));
        }
        if domain.starts_with('.') || domain.ends_with('.') || !domain.contains('.') {
            return Err(reject("domain must contain an inner '.'"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The address as given.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for EmailAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn identifiers_are_unique() {
        assert_ne!(IssuerId::new(), IssuerId::new());
        assert_ne!(CertificateId::new(), CertificateId::new());
    }

    #[test]
    fn urn_format() {
        let uuid = Uuid::parse_str("93019408-acd8-4420-be5e-0400d643954a").unwrap();
        let id = CertificateId::from_uuid(uuid);
        assert_eq!(id.urn(), "urn:uuid:93019408-acd8-4420-be5e-0400d643954a");
    }

    #[test]
    fn identifier_parses_from_display() {
        let id = BadgeId::new();
        let parsed: BadgeId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<BadgeId>().is_err());
    }

    #[test]
    fn identifier_serializes_as_bare_uuid() {
        let id = RecipientId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }

    #[test]
    fn email_accepts_plain_address() {
        let email = EmailAddress::new("a@x.com").unwrap();
        assert_eq!(email.as_str(), "a@x.com");
    }

    #[test]
    fn email_trims_surrounding_whitespace() {
        let email = EmailAddress::new("  a@x.com\n").unwrap();
        assert_eq!(email.as_str(), "a@x.com");
    }

    #[test]
    fn email_preserves_case() {
        let upper = EmailAddress::new("A@X.com").unwrap();
        let lower = EmailAddress::new("a@x.com").unwrap();
        assert_ne!(upper, lower);
    }

    #[test]
    fn email_rejects_malformed() {
        for bad in ["", "ax.com", "@x.com", "a@", "a@x", "a@.com", "a@x.", "a b@x.com"] {
            assert!(EmailAddress::new(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn email_deserialize_validates() {
        let ok: Result<EmailAddress, _> = serde_json::from_str("\"a@x.com\"");
        assert!(ok.is_ok());
        let bad: Result<EmailAddress, _> = serde_json::from_str("\"nope\"");
        assert!(bad.is_err());
    }

    proptest! {
        #[test]
        fn email_round_trips_simple_addresses(local in "[a-z0-9._]{1,20}", host in "[a-z0-9]{1,20}", tld in "[a-z]{2,6}") {
            let raw = format!("{local}@{host}.{tld}");
            let email = EmailAddress::new(raw.clone()).unwrap();
            prop_assert_eq!(email.as_str(), raw.as_str());
        }
    }
}
