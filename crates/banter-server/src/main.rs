use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, patch, post, put},
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use banter_api::{AppState, AppStateInner, messages, reactions, rooms};
use banter_gateway::connection;
use banter_gateway::dispatcher::Dispatcher;
use banter_store::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "banter_server=debug,banter_api=debug,banter_gateway=debug,banter_store=debug,tower_http=debug".into()
            }),
        )
        .init();

    // Config
    let host = std::env::var("BANTER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("BANTER_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    // Default matches the file the original desktop app wrote, so existing
    // saves are picked up in place.
    let store_path =
        std::env::var("BANTER_STORE_PATH").unwrap_or_else(|_| "chat_rooms.json".into());

    // Open the room store; a corrupt file is fatal, not repaired
    let store = Arc::new(Store::open(&PathBuf::from(&store_path))?);

    // Shared state
    let dispatcher = Dispatcher::new();
    let app_state: AppState = Arc::new(AppStateInner {
        store: store.clone(),
        dispatcher: dispatcher.clone(),
    });

    // Routes
    let api_routes = Router::new()
        .route("/rooms", get(rooms::list_rooms))
        .route("/rooms", post(rooms::create_room))
        .route("/rooms/{room}", put(rooms::ensure_room))
        .route("/rooms/{room}", delete(rooms::delete_room))
        .route("/rooms/{room}/messages", get(messages::get_messages))
        .route("/rooms/{room}/messages", post(messages::send_message))
        .route("/rooms/{room}/messages/locate", get(messages::locate_message))
        .route("/rooms/{room}/messages/{seq}", patch(messages::edit_message))
        .route("/rooms/{room}/messages/{seq}", delete(messages::delete_message))
        .route(
            "/rooms/{room}/messages/{seq}/reactions",
            post(reactions::toggle_reaction),
        )
        .route("/rooms/{room}/attachments", post(messages::send_attachment))
        .with_state(app_state.clone());

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(app_state);

    let app = Router::new()
        .route("/health", get(health))
        .merge(api_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Banter relay listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[derive(Debug, Deserialize)]
struct ConnectParams {
    name: String,
    room: Option<String>,
}

async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, StatusCode> {
    // Identity is just a display name; the only check is non-empty
    let name = params.name.trim().to_string();
    if name.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    Ok(ws.on_upgrade(move |socket| {
        connection::handle_connection(
            socket,
            state.dispatcher.clone(),
            state.store.clone(),
            name,
            params.room,
        )
    }))
}

async fn health() -> &'static str {
    "ok"
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
