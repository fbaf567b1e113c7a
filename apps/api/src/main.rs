mod config;
mod db;
mod errors;
mod interview;
mod llm_client;
mod models;
mod routes;
mod state;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::Config;
use crate::db::{create_pool, run_migrations};
use crate::interview::archive::PgS3Archive;
use crate::interview::evaluation::LlmEvaluator;
use crate::interview::questions::QuestionBank;
use crate::interview::store::{
    InMemorySessionStore, RedisSessionStore, SessionLocks, SessionStore,
};
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Excel Interviewer API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    run_migrations(&db).await?;

    // Initialize session store (Redis when configured)
    let sessions: Arc<dyn SessionStore> = match &config.redis_url {
        Some(url) => {
            let redis = redis::Client::open(url.as_str())?;
            Arc::new(RedisSessionStore::connect(&redis, config.session_ttl_secs).await?)
        }
        None => {
            warn!("REDIS_URL not set; interview sessions are kept in memory");
            Arc::new(InMemorySessionStore::new())
        }
    };

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized");

    // Initialize LLM client
    let llm = LlmClient::new(config.openai_api_key.clone());
    info!("LLM client initialized (default model: {})", config.default_model);

    let bank = QuestionBank::default_excel();
    info!("Question bank loaded: {} questions", bank.all().len());

    // Build app state
    let state = AppState {
        config: config.clone(),
        bank: Arc::new(bank),
        sessions,
        locks: SessionLocks::default(),
        evaluator: Arc::new(LlmEvaluator(llm)),
        archive: Arc::new(PgS3Archive {
            db,
            s3,
            bucket: config.s3_bucket.clone(),
        }),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "interviewer-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
