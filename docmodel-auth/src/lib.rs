//! Token sessions and credential lookup on top of docmodel models.
//!
//! - [`Token`] is the builtin session-token model: subject reference, token
//!   value, type and a sliding expiry
//! - [`TokenModel`] wraps a built token model with session fetch, disposal
//!   and listing
//! - [`Serializer`] authenticates subjects by id, alternate uid, password
//!   and token, and issues and revokes tokens
//! - [`PasswordVerifier`] compares raw passwords with stored hashes;
//!   [`Argon2Verifier`] is the default

mod config;
mod error;
mod serializer;
mod token;
mod verifier;

pub use config::{CredentialFields, SerializerConfig};
pub use error::{AuthError, AuthResult};
pub use serializer::Serializer;
pub use token::{
    DefaultToken, Session, Token, TokenDefinition, TokenModel, TokenRecord, EXPIRES, TOKEN, TYPE,
    UID,
};
pub use verifier::{hash_password, Argon2Verifier, PasswordVerifier};
