//! spanstat aggregator service
//!
//! Accepts trace events over gRPC, buffers them as per-key aggregates and
//! writes them to the configured store. Persists to ClickHouse when built
//! with `clickhouse-storage` and configured with `storage.type = "clickhouse"`.

use anyhow::{Context, Result};
use clap::Parser;
use spanstat_aggregator::{
    config::{AggregatorConfig, StorageConfig},
    server::{auth, grpc, http},
    storage::{memory::InMemoryStore, EventStore},
    Collector,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "spanstat-aggregator")]
#[command(about = "Trace event aggregation service", long_about = None)]
#[command(version)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "SPANSTAT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Print the default configuration as TOML and exit
    #[arg(long)]
    print_default_config: bool,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let json = std::env::var("SPANSTAT_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn build_store(config: &AggregatorConfig) -> Result<Arc<dyn EventStore>> {
    match &config.storage {
        StorageConfig::InMemory => {
            info!("Using in-memory storage (data is lost on restart)");
            Ok(Arc::new(InMemoryStore::new()))
        }
        #[cfg(feature = "clickhouse-storage")]
        StorageConfig::ClickHouse {
            endpoint,
            database,
            user,
            password,
        } => {
            let store = spanstat_aggregator::storage::clickhouse::ClickHouseStore::new(
                endpoint,
                database,
                user.as_deref(),
                password.as_deref(),
            )
            .await
            .context("ClickHouse connection failed")?;
            info!("ClickHouse storage enabled: {} / {}", endpoint, database);
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "clickhouse-storage"))]
        StorageConfig::ClickHouse { .. } => {
            anyhow::bail!("ClickHouse storage requested but built without `clickhouse-storage`")
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_default_config {
        print!("{}", toml::to_string_pretty(&AggregatorConfig::default())?);
        return Ok(());
    }

    init_tracing(args.verbose);

    let config = AggregatorConfig::load(args.config.as_deref())?;
    info!("Starting spanstat aggregator on {}", config.listen_addr);
    info!(
        "Flushing after {} keys or {:?}; records expire after {:?}",
        config.flush.buffer_size, config.flush.interval, config.record_ttl
    );

    let store = build_store(&config).await?;
    let collector = Arc::new(Collector::from_config(store, &config));

    let shutdown = CancellationToken::new();
    let ticker = collector.buffer().spawn_ticker(shutdown.clone());

    let admin_addr = config
        .admin_addr
        .parse()
        .context("Invalid admin address")?;
    let admin = tokio::spawn(http::serve_admin(
        admin_addr,
        collector.clone(),
        shutdown.clone(),
    ));

    let service = grpc::CollectorService::new(collector.clone())
        .into_server()
        .max_decoding_message_size(config.max_message_size)
        .accept_compressed(tonic::codec::CompressionEncoding::Gzip)
        .send_compressed(tonic::codec::CompressionEncoding::Gzip);
    let interceptor = auth::make_auth_interceptor(config.auth_token.clone());

    let addr = config
        .listen_addr
        .parse()
        .context("Invalid listen address")?;

    let signal = shutdown.clone();
    Server::builder()
        .add_service(tonic::service::interceptor::InterceptedService::new(
            service,
            interceptor,
        ))
        .serve_with_shutdown(addr, async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down");
            signal.cancel();
        })
        .await
        .context("gRPC server error")?;

    // Ticker performs the final flush once cancelled.
    shutdown.cancel();
    ticker.await.context("Flush task panicked")?;
    if let Ok(Err(e)) = admin.await {
        tracing::warn!("Admin server error: {}", e);
    }

    Ok(())
}
