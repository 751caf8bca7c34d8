//! Identities, access tokens and the role-requirement table.

/// Method-to-role access rules.
pub mod access;
/// Signed access tokens.
pub mod token;
/// Registered users and their store.
pub mod user;

pub use access::{AccessRules, ROLE_ADMIN, ROLE_USER};
pub use token::{Claims, JwtManager};
pub use user::{InMemoryUserStore, User};

/// Metadata key carrying the raw access token.
pub const AUTHORIZATION_KEY: &str = "authorization";
