//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use pcbook::auth::{AccessRules, InMemoryUserStore};
use pcbook::client::{AuthClient, ClientAuthInterceptor, LaptopClient};
use pcbook::proto::auth_service_server::AuthServiceServer;
use pcbook::proto::laptop_service_server::LaptopServiceServer;
use pcbook::proto::memory::Unit;
use pcbook::proto::{Cpu, Laptop, Memory};
use pcbook::server::{
    AuthServiceImpl, InterceptorChain, LaptopServiceImpl, ServerAuthInterceptor, ServerConfig,
};
use pcbook::store::{InMemoryImageStore, InMemoryLaptopStore, InMemoryRatingStore};
use tonic::transport::{Channel, Server};

/// Initialize test tracing (call once at the beginning of tests).
///
/// Only logs from the library are shown, filtering out HTTP/2 and tower noise.
/// Subsequent calls are safe and will be ignored.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::new("pcbook=debug");

    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(filter)
        .try_init();
}

/// Handles into a server running on an ephemeral port.
pub struct TestServer {
    pub url: String,
    pub config: ServerConfig,
    pub laptops: InMemoryLaptopStore,
    pub images: InMemoryImageStore,
    pub ratings: InMemoryRatingStore,
    _handle: tokio::task::JoinHandle<()>,
}

/// Starts both services behind the authorization interceptor, seeded with
/// the default users.
pub async fn start_test_server() -> TestServer {
    init_tracing();

    let config = ServerConfig::default();
    let users = InMemoryUserStore::new();
    config.seed_users(&users).await.unwrap();

    let laptops = InMemoryLaptopStore::new();
    let images = InMemoryImageStore::new();
    let ratings = InMemoryRatingStore::new();

    let jwt_manager = config.jwt_manager();
    let interceptors = InterceptorChain::new().with(ServerAuthInterceptor::new(
        jwt_manager.clone(),
        config.access_rules(),
    ));
    let auth_service =
        AuthServiceImpl::new(users, jwt_manager).with_interceptors(interceptors.clone());
    let laptop_service =
        LaptopServiceImpl::new(laptops.clone(), Arc::new(images.clone()), ratings.clone())
            .with_interceptors(interceptors);

    let addr: std::net::SocketAddr = "127.0.0.1:0".parse().unwrap();
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    let local_addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        Server::builder()
            .add_service(AuthServiceServer::new(auth_service))
            .add_service(LaptopServiceServer::new(laptop_service))
            .serve_with_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    tokio::time::sleep(Duration::from_millis(100)).await;

    TestServer {
        url: format!("http://{local_addr}"),
        config,
        laptops,
        images,
        ratings,
        _handle: handle,
    }
}

impl TestServer {
    pub async fn channel(&self) -> Channel {
        Channel::from_shared(self.url.clone())
            .unwrap()
            .connect()
            .await
            .unwrap()
    }

    /// A laptop client that never attaches a token.
    pub async fn anonymous_client(&self) -> LaptopClient {
        LaptopClient::new(self.channel().await)
    }

    /// A laptop client logged in as `username`, refreshing its token in the
    /// background.
    pub async fn client_for(&self, username: &str, password: &str) -> LaptopClient {
        let channel = self.channel().await;
        let interceptor = ClientAuthInterceptor::new(
            AuthClient::new(channel.clone(), username, password),
            AccessRules::default().protected_methods(),
            Duration::from_secs(30),
        )
        .await
        .unwrap();

        LaptopClient::new(channel).with_interceptor(Arc::new(interceptor))
    }

    pub async fn admin_client(&self) -> LaptopClient {
        self.client_for("admin", "password").await
    }

    pub async fn user_client(&self) -> LaptopClient {
        self.client_for("user1", "password").await
    }
}

/// A laptop with the given price, CPU and RAM and no id.
pub fn laptop(price_usd: f64, cores: u32, ghz: f64, ram_gb: u64) -> Laptop {
    Laptop {
        brand: "Lenovo".into(),
        name: "Thinkpad".into(),
        cpu: Some(Cpu {
            number_cores: cores,
            min_ghz: ghz,
            ..Default::default()
        }),
        ram: Some(Memory::new(ram_gb, Unit::Gigabyte)),
        price_usd,
        ..Default::default()
    }
}
