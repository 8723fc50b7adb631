use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chat_relay::config::Config;
use chat_relay::db::access::{ConversationAccess, PgConversationAccess};
use chat_relay::db::messages::{MessageStore, PgMessageStore};
use chat_relay::AppState;

#[tokio::main]
async fn main() {
    // A missing .env is fine; the environment may already be populated.
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;

    tracing::info!(
        strict_persistence = config.strict_persistence,
        outbound_buffer = config.outbound_buffer,
        idle_timeout_secs = config.idle_timeout.as_secs(),
        "chat-relay configured"
    );

    let db = chat_relay::db::pool::connect(&config.database_url);
    let access: Arc<dyn ConversationAccess> = Arc::new(PgConversationAccess::new(db.clone()));
    let messages: Arc<dyn MessageStore> = Arc::new(PgMessageStore::new(db));

    let state = AppState::new(config, access, messages);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(chat_relay::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "chat-relay listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
