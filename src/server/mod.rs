//! gRPC services, call liveness and the server-side interceptor chain.

/// Login service.
pub mod auth_service;
/// Server configuration.
pub mod config;
/// Per-call cancellation and deadlines.
pub mod context;
/// Interceptor chain and the authorization interceptor.
pub mod interceptor;
/// Laptop service.
pub mod laptop_service;
/// Transport-neutral stream halves.
pub mod stream;

pub use auth_service::AuthServiceImpl;
pub use config::ServerConfig;
pub use context::CallContext;
pub use interceptor::{InterceptorChain, ServerAuthInterceptor, ServerInterceptor};
pub use laptop_service::{LaptopServiceImpl, MAX_IMAGE_SIZE};
pub use stream::{MessageSink, MessageSource};

use tonic::Status;
use tracing::error;

/// Logs a failed request and hands the status back.
pub(crate) fn log_error(status: Status) -> Status {
    error!(code = ?status.code(), message = status.message(), "request failed");
    status
}
