//! Revq HTTP server entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tokio::signal;

use revq::cache::CacheGateway;
use revq::config::Config;
use revq::customers::{CustomerDirectory, PgCustomerDirectory, StaticCustomerDirectory};
use revq::generate::{AnswerGenerator, GenAiGenerator, StubGenerator};
use revq::pipeline::Pipeline;
use revq::ranking::RankingConfig;
use revq::reviews::HttpReviewSource;
use revq::scrape::HttpPageScraper;
use revq::store::{MemoryStore, PgStore, QaStore};
use revq_server::gateway::{HandlerState, create_router_with_state};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const PG_MAX_CONNECTIONS: u32 = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!(
        r#"
██████╗ ███████╗██╗   ██╗ ██████╗
██╔══██╗██╔════╝██║   ██║██╔═══██╗
██████╔╝█████╗  ██║   ██║██║   ██║
██╔══██╗██╔══╝  ╚██╗ ██╔╝██║▄▄ ██║
██║  ██║███████╗ ╚████╔╝ ╚██████╔╝
╚═╝  ╚═╝╚══════╝  ╚═══╝   ╚══▀▀═╝

        ASK. RANK. ANSWER.
                                AGPL-3.0
"#
    );

    if std::env::args().any(|arg| arg == "--health-check") {
        std::process::exit(run_health_check());
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    config.validate()?;
    let addr: SocketAddr = config.socket_addr().parse()?;

    tracing::info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        review_api_url = %config.review_api_url,
        "Revq starting"
    );

    let reviews = Arc::new(HttpReviewSource::new(
        config.review_api_url.clone(),
        config.http_timeout,
    ));
    let scraper = Arc::new(HttpPageScraper::new(config.http_timeout));

    let mock_provider = std::env::var_os("REVQ_MOCK_PROVIDER").is_some_and(|v| !v.is_empty());
    let generator: Arc<dyn AnswerGenerator> = if mock_provider {
        tracing::warn!("REVQ_MOCK_PROVIDER set, serving canned answers");
        Arc::new(StubGenerator)
    } else {
        Arc::new(GenAiGenerator::new(config.generation_model.clone()))
    };

    let (store, customers): (Arc<dyn QaStore>, Arc<dyn CustomerDirectory>) =
        match &config.database_url {
            Some(url) => {
                let store = PgStore::connect(url, PG_MAX_CONNECTIONS).await?;
                let customers = PgCustomerDirectory::new(store.pool().clone());
                tracing::info!("Postgres persistence enabled");
                (Arc::new(store), Arc::new(customers))
            }
            None => {
                tracing::warn!(
                    "No REVQ_DATABASE_URL configured, using in-memory persistence and \
                     the REVQ_STATIC_TENANTS directory"
                );
                (
                    Arc::new(MemoryStore::new()),
                    Arc::new(static_directory_from_env()),
                )
            }
        };

    let cache = CacheGateway::in_memory(config.answer_cache_capacity, config.answer_ttl);

    let pipeline = Arc::new(Pipeline::new(
        reviews,
        scraper,
        generator,
        store,
        cache,
        RankingConfig::default(),
    ));

    let state = HandlerState::new(pipeline, customers);
    let app = create_router_with_state(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Revq shutdown complete");
    Ok(())
}

/// Parses `REVQ_STATIC_TENANTS` (`tenant:token,tenant:token,...`) into a
/// directory for development setups without Postgres.
fn static_directory_from_env() -> StaticCustomerDirectory {
    let mut directory = StaticCustomerDirectory::new();

    if let Ok(raw) = std::env::var("REVQ_STATIC_TENANTS") {
        for pair in raw.split(',') {
            if let Some((tenant, token)) = pair.split_once(':') {
                let (tenant, token) = (tenant.trim(), token.trim());
                if !tenant.is_empty() && !token.is_empty() {
                    directory = directory.with_tenant(tenant, token);
                }
            }
        }
    }

    directory
}

fn run_health_check() -> i32 {
    let port = std::env::var("REVQ_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8080);

    let url = format!("http://127.0.0.1:{}/healthz", port);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build runtime");

    rt.block_on(async {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(1))
            .build()
            .expect("failed to build client");

        match client.get(&url).send().await {
            Ok(res) if res.status().is_success() => 0,
            _ => 1,
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
