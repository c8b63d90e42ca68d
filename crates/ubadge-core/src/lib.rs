#![deny(missing_docs)]

//! # ubadge-core: Foundational Types for ubadge
//!
//! This crate defines the types every other crate in the workspace builds
//! on. It has no internal crate dependencies.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** Every record identifier is a
//!    distinct type. You cannot pass a [`BadgeId`] where an [`IssuerId`] is
//!    expected, which matters in a domain where almost every operation takes
//!    an issuer id next to some other id.
//!
//! 2. **Validated values at the boundary.** [`EmailAddress`] is the
//!    deduplication key for recipients and checks its format at construction.
//!
//! 3. **One record store.** [`Store`] is the single in-memory keyed store used
//!    by every component. All mutation happens under its lock; compound
//!    read-check-write operations go through [`Store::try_update`] or
//!    [`Store::transact`].

pub mod error;
pub mod identity;
pub mod store;

pub use error::ValidationError;
pub use identity::{
    BadgeId, CertificateId, EmailAddress, InviteId, IssuerId, RecipientId, UserId,
};
pub use store::Store;
