use std::sync::{Arc, Mutex};

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use agendabot::config::AppConfig;
use agendabot::db;
use agendabot::handlers;
use agendabot::services::ai::openai::OpenAiCompatProvider;
use agendabot::services::calendar::google::GoogleCalendarProvider;
use agendabot::services::channel::telegram::TelegramProvider;
use agendabot::services::context::ContextCache;
use agendabot::state::{AppState, TurnLocks};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    anyhow::ensure!(
        !config.telegram_bot_token.is_empty(),
        "TELEGRAM_BOT_TOKEN must be set"
    );

    let conn = db::init_db(&config.database_url)?;
    if config.seed_demo {
        db::seed_demo(&conn)?;
        tracing::info!("demo tenant seeded");
    }

    tracing::info!(
        model = %config.llm_model,
        url = %config.llm_base_url,
        "using OpenAI-compatible LLM provider"
    );
    let llm = OpenAiCompatProvider::new(
        config.llm_base_url.clone(),
        config.llm_api_key.clone(),
        config.llm_model.clone(),
    );
    let calendar = GoogleCalendarProvider::new(config.google_calendar_token.clone());
    let channel = TelegramProvider::new(config.telegram_bot_token.clone());

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        llm: Box::new(llm),
        calendar: Box::new(calendar),
        channel: Box::new(channel),
        context_cache: ContextCache::new(),
        turn_locks: TurnLocks::new(),
    });

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/webhook/telegram/:tenant_id",
            post(handlers::webhook::telegram_webhook),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
