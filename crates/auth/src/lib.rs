//! `agora-auth`: identity verification and ownership authorization.
//!
//! This crate is intentionally decoupled from HTTP and storage: ownership data
//! arrives through the [`OwnershipResolver`] seam.

pub mod authorize;
pub mod claims;
pub mod password;
pub mod principal;
pub mod token;

pub use authorize::{is_owner, AuthorizationGate, AuthzError, OwnershipResolver, ResourceRef};
pub use claims::{validate_claims, TokenClaims};
pub use password::{hash_password, verify_password, PasswordError};
pub use principal::Identity;
pub use token::{SigningError, TokenError, TokenService};
