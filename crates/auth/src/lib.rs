//! `smis-auth` — authentication boundary.
//!
//! Password hashing, user registration rules and JWT issuance/validation.
//! Decoupled from HTTP and storage; the infra layer persists users and the
//! API layer extracts bearer tokens.

pub mod claims;
pub mod error;
pub mod password;
pub mod token;
pub mod user;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use error::AuthError;
pub use password::{hash_password, verify_password};
pub use token::{Hs256JwtValidator, Hs256TokenIssuer, IssuedToken, JwtValidator};
pub use user::{NewUser, Registration, User};
