use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use pcbook::auth::AccessRules;
use pcbook::client::{AuthClient, ClientAuthInterceptor, LaptopClient};
use pcbook::proto::memory::Unit;
use pcbook::proto::{Filter, Memory};
use pcbook::sample;
use tonic::transport::Channel;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "client")]
#[command(about = "Laptop catalog client", long_about = None)]
struct Cli {
    #[arg(short, long, env = "PCBOOK_SERVER", default_value = "http://127.0.0.1:8080")]
    server: String,

    #[arg(short, long, env = "PCBOOK_USERNAME", default_value = "admin")]
    username: String,

    #[arg(short, long, env = "PCBOOK_PASSWORD", default_value = "password")]
    password: String,

    /// Seconds between token refreshes
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..))]
    refresh_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create random laptops
    Create {
        #[arg(short, long, default_value = "1")]
        count: usize,
    },

    /// Create random laptops, then search them
    Search {
        #[arg(long, default_value = "10")]
        seed: usize,

        #[arg(long, default_value = "3000")]
        max_price_usd: f64,

        #[arg(long, default_value = "4")]
        min_cpu_cores: u32,

        #[arg(long, default_value = "2.5")]
        min_cpu_ghz: f64,

        #[arg(long, default_value = "8", help = "Minimum RAM in gigabytes")]
        min_ram_gb: u64,
    },

    /// Create a random laptop and upload an image for it
    Upload {
        #[arg(short, long)]
        image: PathBuf,
    },

    /// Create random laptops and rate them
    Rate {
        #[arg(short, long, default_value = "3")]
        count: usize,

        #[arg(short, long, default_value = "1")]
        rounds: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(server = %cli.server, "dial server");
    let channel = Channel::from_shared(cli.server.clone())?.connect().await?;

    let auth_client = AuthClient::new(channel.clone(), cli.username, cli.password);
    let rules = AccessRules::default();
    let interceptor = Arc::new(
        ClientAuthInterceptor::new(
            auth_client,
            rules.protected_methods(),
            Duration::from_secs(cli.refresh_secs),
        )
        .await?,
    );
    let client = LaptopClient::new(channel).with_interceptor(interceptor.clone());

    let mut rng = rand::thread_rng();

    match cli.command {
        Commands::Create { count } => {
            for _ in 0..count {
                let id = client.create_laptop(sample::new_laptop(&mut rng)).await?;
                println!("Created laptop {id}");
            }
        }

        Commands::Search {
            seed,
            max_price_usd,
            min_cpu_cores,
            min_cpu_ghz,
            min_ram_gb,
        } => {
            for _ in 0..seed {
                client.create_laptop(sample::new_laptop(&mut rng)).await?;
            }

            let filter = Filter {
                max_price_usd,
                min_cpu_cores,
                min_cpu_ghz,
                min_ram: Some(Memory::new(min_ram_gb, Unit::Gigabyte)),
            };

            let laptops = client.search_laptop(filter).await?;
            println!("Found {} laptops", laptops.len());
            for laptop in laptops {
                println!(
                    "  {} {} {} (${:.2})",
                    laptop.id, laptop.brand, laptop.name, laptop.price_usd
                );
            }
        }

        Commands::Upload { image } => {
            let id = client.create_laptop(sample::new_laptop(&mut rng)).await?;
            let response = client.upload_image(&id, &image).await?;
            println!(
                "Uploaded image {} ({} bytes) for laptop {id}",
                response.id, response.size
            );
        }

        Commands::Rate { count, rounds } => {
            let mut ids = Vec::with_capacity(count);
            for _ in 0..count {
                ids.push(client.create_laptop(sample::new_laptop(&mut rng)).await?);
            }

            for round in 1..=rounds {
                let ratings: Vec<_> = ids
                    .iter()
                    .map(|id| (id.clone(), sample::random_score(&mut rng)))
                    .collect();

                println!("Round {round}:");
                for reply in client.rate_laptop(ratings).await? {
                    println!(
                        "  {} rated {} times, average {:.2}",
                        reply.laptop_id, reply.rated_count, reply.average_score
                    );
                }
            }
        }
    }

    interceptor.shutdown();
    Ok(())
}
