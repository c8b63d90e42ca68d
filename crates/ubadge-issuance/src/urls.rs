//! Public URLs under which issuer documents are served.

use ubadge_core::IssuerId;

/// Builds absolute URLs from the service's public base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicUrls {
    base: String,
}

impl PublicUrls {
    /// `base` is the externally reachable API root, e.g. `https://badges.example.edu`.
    pub fn new(base: impl Into<String>) -> Self {
        let base: String = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    /// The base URL without a trailing slash.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Issuer profile document; also the issuer's identifier in certificates.
    pub fn profile(&self, issuer_id: &IssuerId) -> String {
        format!("{}/issuers/{issuer_id}/profile", self.base)
    }

    /// Issuer revocation list.
    pub fn revocations(&self, issuer_id: &IssuerId) -> String {
        format!("{}/issuers/{issuer_id}/revocations", self.base)
    }

    /// Endpoint wallets post the nonce and address to.
    pub fn introduction(&self, issuer_id: &IssuerId) -> String {
        format!("{}/issuers/{issuer_id}/intro", self.base)
    }
}
