//! Trivium Backend Server
//!
//! The real-time engine of a live multiplayer quiz service: session state,
//! WebSocket message dispatch, answer validation and scoring, and a live
//! leaderboard, behind a small HTTP admin surface.

pub mod config;
pub mod handlers;
pub mod messaging;
pub mod services;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use chrono::DateTime;
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;

use trivium::errors::Report;
use trivium::log;

use crate::config::Config;
use crate::messaging::Dispatcher;
use crate::services::{
    GameController, LeaderboardProjection, QuizStore, QuizStoreInMemory, SessionStore,
    SessionStoreInMemory,
};

/// How often the reaper sweeps expired sessions.
const REAPER_INTERVAL: Duration = Duration::from_secs(60);

/// Shared application state containing services and configuration.
///
/// Every collaborator is wired exactly once here and handed down
/// explicitly; handlers never reach for ambient state.
pub struct AppState {
    pub started_at: DateTime<chrono::Utc>,
    pub config: Config,
    pub store: Arc<dyn SessionStore>,
    pub quizzes: Arc<dyn QuizStore>,
    pub game: GameController,
    pub leaderboard: LeaderboardProjection,
    pub dispatcher: Dispatcher,
}

#[tokio::main]
async fn main() -> Result<(), Report> {
    // Setup logging
    trivium::log::setup()?;

    let config = Config::from_env();
    log::info!("Configuration: {config:?}");

    let store: Arc<dyn SessionStore> = Arc::new(SessionStoreInMemory::new(
        config.session_expiry(),
        config.max_participants_per_session,
    ));

    let quizzes_mem = QuizStoreInMemory::new();
    if let Some(path) = &config.quiz_fixtures {
        load_quiz_fixtures(&quizzes_mem, path)?;
    }
    if quizzes_mem.is_empty() {
        log::warn!("Quiz store is empty; session creation will fail until quizzes are loaded");
    }
    let quizzes: Arc<dyn QuizStore> = Arc::new(quizzes_mem);

    // Add application state
    let app_state = Arc::new(AppState {
        started_at: chrono::Utc::now(),
        game: GameController::new(store.clone(), quizzes.clone()),
        leaderboard: LeaderboardProjection::new(store.clone()),
        dispatcher: Dispatcher::default(),
        config,
        store,
        quizzes,
    });

    spawn_session_reaper(app_state.clone());

    // Setup the routes
    let app = setup_routes(app_state.clone());

    // Setup the server
    let listener = TcpListener::bind(app_state.config.bind_addr.as_str()).await?;
    log::info!("Starting server on http://{}", listener.local_addr()?);
    log::info!("Press Ctrl+C to stop the server");

    // Start the server with graceful shutdown
    // IMPORTANT: Use into_make_service_with_connect_info to preserve client connection info
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(app_state))
    .await?;

    log::info!("Shutting down server");
    Ok(())
}

/// Seed the in-memory quiz store from a `{quiz_id: quiz}` JSON file.
fn load_quiz_fixtures(quizzes: &QuizStoreInMemory, path: &str) -> Result<(), Report> {
    let raw = std::fs::read_to_string(path)?;
    let fixtures: std::collections::HashMap<String, trivium::data::Quiz> =
        trivium::serde_json::from_str(&raw)?;

    let count = fixtures.len();
    for (quiz_id, quiz) in fixtures {
        quizzes.insert(quiz_id, quiz);
    }
    log::info!("Loaded {count} quizzes from {path}");
    Ok(())
}

/// Periodically purge expired sessions and their derived keys.
fn spawn_session_reaper(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(REAPER_INTERVAL);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let reaped = state.store.purge_expired().await;
            if reaped > 0 {
                log::info!("Reaped {reaped} expired sessions");
            }
        }
    });
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM), then drain the open
/// WebSocket connections with a Going Away close.
async fn shutdown_signal(state: Arc<AppState>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::SignalKind;

        signal::unix::signal(SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::info!("Signal received, starting graceful shutdown");
    state.dispatcher.close_all().await;
}

/// Setup the application routes
fn setup_routes(app_state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route(
            "/multiplayer/create-session",
            post(handlers::v1::session::create),
        )
        .route("/multiplayer/session/{code}", get(handlers::v1::session::get))
        .route(
            "/multiplayer/session/{code}/participants",
            get(handlers::v1::session::participants),
        )
        .route(
            "/multiplayer/session/{code}/join",
            post(handlers::v1::session::join),
        )
        .route(
            "/multiplayer/session/{code}/start",
            post(handlers::v1::session::start),
        )
        .route(
            "/multiplayer/session/{code}/end",
            post(handlers::v1::session::end),
        )
        .route(
            "/multiplayer/session/{code}/validate",
            post(handlers::v1::session::validate),
        )
        .route("/ws/{code}", get(handlers::v1::websocket::upgrade))
        .with_state(app_state.clone());

    Router::new()
        .route("/health", get(handlers::health::get))
        .merge(api_routes)
        .layer(cors_layer())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(app_state)
}

/// CORS for browser clients during local development: the quiz app's dev
/// server port on both loopback names. Deployments behind a gateway
/// replace this list.
fn cors_layer() -> CorsLayer {
    let origins: Vec<HeaderValue> = ["http://localhost:8080", "http://127.0.0.1:8080"]
        .iter()
        .map(|origin| origin.parse().unwrap())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_headers([header::CONTENT_TYPE])
        .allow_methods([Method::GET, Method::POST])
}
