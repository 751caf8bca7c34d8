//! # pcbook
//!
//! A laptop catalog served over gRPC. Callers log in for a short-lived
//! access token, create laptops, search them with a streamed reply, upload
//! images in chunks and rate laptops over a bidirectional stream.
//!
//! ## Layout
//!
//! - [`auth`]: users, password hashing, access tokens and the role table.
//! - [`store`]: in-memory laptop and rating stores plus image stores.
//! - [`server`]: the tonic services, call liveness and the interceptor chain
//!   that authorizes every call before it reaches a handler.
//! - [`client`]: login, background token refresh and the laptop calls.
//! - [`sample`]: random laptops for demos and tests.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use pcbook::proto::laptop_service_server::LaptopServiceServer;
//! use pcbook::server::{InterceptorChain, LaptopServiceImpl, ServerAuthInterceptor, ServerConfig};
//! use pcbook::store::{InMemoryImageStore, InMemoryLaptopStore, InMemoryRatingStore};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::default();
//! let chain = InterceptorChain::new().with(ServerAuthInterceptor::new(
//!     config.jwt_manager(),
//!     config.access_rules(),
//! ));
//! let laptops = LaptopServiceImpl::new(
//!     InMemoryLaptopStore::new(),
//!     Arc::new(InMemoryImageStore::new()),
//!     InMemoryRatingStore::new(),
//! )
//! .with_interceptors(chain);
//!
//! tonic::transport::Server::builder()
//!     .add_service(LaptopServiceServer::new(laptops))
//!     .serve(config.addr()?)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod proto;
pub mod sample;
pub mod server;
pub mod store;

pub use error::{Error, Result};
