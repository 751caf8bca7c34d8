use std::time::Duration;

use clap::Parser;
use pcbook::auth::InMemoryUserStore;
use pcbook::proto::auth_service_server::AuthServiceServer;
use pcbook::proto::laptop_service_server::LaptopServiceServer;
use pcbook::server::{
    AuthServiceImpl, InterceptorChain, LaptopServiceImpl, ServerAuthInterceptor, ServerConfig,
};
use pcbook::store::{InMemoryLaptopStore, InMemoryRatingStore};
use tokio::signal;
use tonic::transport::Server;
use tonic_health::server::{HealthReporter, health_reporter};
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "Laptop catalog gRPC server", long_about = None)]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(short, long, env = "SERVER_CONFIG", default_value = "config/server.toml")]
    config: String,

    /// Host to bind to, overriding the configuration
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Port to listen on, overriding the configuration
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable the Prometheus metrics endpoint
    #[arg(long)]
    metrics: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = ServerConfig::load(&args.config).unwrap_or_else(|e| {
        error!("Failed to load configuration: {e}");
        info!("Using default configuration");
        ServerConfig::default()
    });
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    config.metrics.enabled |= args.metrics;

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {e}");
        return Err(e.into());
    }

    if config.metrics.enabled {
        let metrics_addr = config.metrics.addr()?;
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .install()?;
        info!("Metrics server started on {metrics_addr}");
    }

    let users = InMemoryUserStore::new();
    config.seed_users(&users).await?;

    let jwt_manager = config.jwt_manager();
    let interceptors = InterceptorChain::new().with(ServerAuthInterceptor::new(
        jwt_manager.clone(),
        config.access_rules(),
    ));

    let auth_service =
        AuthServiceImpl::new(users, jwt_manager).with_interceptors(interceptors.clone());
    let laptop_service = LaptopServiceImpl::new(
        InMemoryLaptopStore::new(),
        config.image_store(),
        InMemoryRatingStore::new(),
    )
    .with_interceptors(interceptors);

    let (mut health_reporter, health_service) = health_reporter();
    health_reporter
        .set_serving::<AuthServiceServer<AuthServiceImpl>>()
        .await;
    health_reporter
        .set_serving::<LaptopServiceServer<LaptopServiceImpl>>()
        .await;

    let addr = config.addr()?;
    info!(
        %addr,
        images = ?config.image_dir,
        token_duration_secs = config.auth.token_duration_secs,
        "Server starting"
    );

    Server::builder()
        .add_service(health_service)
        .add_service(AuthServiceServer::new(auth_service))
        .add_service(LaptopServiceServer::new(laptop_service))
        .serve_with_shutdown(addr, shutdown_signal(health_reporter))
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal(mut health_reporter: HealthReporter) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        () = terminate => {
            info!("Received terminate signal");
        },
    }

    health_reporter
        .set_not_serving::<AuthServiceServer<AuthServiceImpl>>()
        .await;
    health_reporter
        .set_not_serving::<LaptopServiceServer<LaptopServiceImpl>>()
        .await;

    info!("Initiating graceful shutdown (allowing in-flight requests to complete)");

    tokio::time::sleep(Duration::from_secs(2)).await;
}
