//! Client side of the catalog: login, token refresh and the laptop calls.

/// Login against the auth service.
pub mod auth;
/// Outgoing-call interceptors.
pub mod interceptor;
/// Laptop service client.
pub mod laptop;

pub use auth::{AuthClient, Authenticator};
pub use interceptor::{ClientAuthInterceptor, ClientInterceptor, RETRY_DELAY};
pub use laptop::{CALL_TIMEOUT, CHUNK_SIZE, LaptopClient};
