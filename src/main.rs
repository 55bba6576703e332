mod ai;
mod auth;
mod config;
mod error;
mod handlers;
mod models;
mod repository;
mod storage;
mod user_models;
mod user_storage;

use ai::AiClient;
use config::Config;
use repository::ComponentRepository;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;
use user_storage::UserStore;

pub struct AppState {
    pub config: Config,
    pub repo: ComponentRepository,
    pub users: Arc<dyn UserStore>,
    pub ai: AiClient,
    pub http: reqwest::Client,
    pub datastore_connected: bool,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env();
    let data_dir = Path::new(&config.data_dir);

    let (components, components_connected) = storage::select_component_store(data_dir);
    let (users, users_connected) = user_storage::select_user_store(data_dir);
    let datastore_connected = components_connected && users_connected;
    if datastore_connected {
        tracing::info!(data_dir = %data_dir.display(), "document store ready");
    } else {
        tracing::warn!("running on the in-memory fallback store, data will not survive a restart");
    }

    let http = reqwest::Client::new();
    let state = Arc::new(AppState {
        repo: ComponentRepository::new(components),
        users,
        ai: AiClient::new(
            http.clone(),
            config.hf_api_key.clone(),
            config.hf_model_url.clone(),
            config.ai_timeout_secs,
        ),
        http,
        datastore_connected,
        config,
    });

    let app = handlers::router(state.clone()).layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {addr}: {e}"));

    tracing::info!(%addr, google_oauth = state.config.google_oauth_configured(), "UI Forge backend listening");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
