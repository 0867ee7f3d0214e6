mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Query, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::{get, patch, post},
    Router,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use courier_api::error::ApiError;
use courier_api::{messages, poll, quick_replies, relay, rooms, AppState, AppStateInner};
use courier_gateway::connection;
use courier_gateway::dispatcher::Dispatcher;
use courier_gateway::relay::RelayClient;
use courier_gateway::transport::Transport;

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier=debug,tower_http=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env();

    // Init database
    let db = courier_db::Database::open(&config.db_path)?;

    // Delivery paths: a local transport when this process hosts push, a
    // relay client when it only produces events.
    let transport = config.push_enabled.then(Transport::new);
    let relay_client = match (&transport, &config.relay_url) {
        (None, Some(url)) => Some(RelayClient::spawn(
            url.clone(),
            config.relay_secret.clone(),
        )),
        _ => None,
    };
    if transport.is_none() && relay_client.is_none() {
        warn!("push disabled and no relay URL configured; notifications will be dropped");
    }

    let dispatcher = Dispatcher::new(transport, relay_client);
    let state: AppState = Arc::new(AppStateInner {
        db,
        dispatcher,
        relay_secret: config.relay_secret.clone(),
    });

    // Routes
    let api_routes = Router::new()
        .route("/rooms", get(rooms::list_rooms))
        .route("/rooms/{room_id}", patch(rooms::update_room))
        .route("/rooms/{room_id}/read", post(rooms::mark_read))
        .route(
            "/rooms/{room_id}/messages",
            get(messages::get_messages).post(messages::send_message),
        )
        .route(
            "/quick-replies",
            get(quick_replies::list_quick_replies).post(quick_replies::create_quick_reply),
        )
        .route(
            "/quick-replies/{id}",
            patch(quick_replies::update_quick_reply).delete(quick_replies::delete_quick_reply),
        )
        .route("/events/poll", get(poll::poll_events))
        .route("/internal/ingest", post(messages::ingest_message))
        .route(
            "/internal/messages/{message_id}/status",
            post(messages::update_message_status),
        )
        .route("/internal/relay", post(relay::relay_dispatch));

    let app = Router::new()
        .merge(api_routes)
        .route("/gateway", get(ws_upgrade))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Courier server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Debug, Deserialize)]
struct GatewayQuery {
    /// Narrow the push stream to one room; absent means the all-rooms
    /// aggregate.
    room_id: Option<Uuid>,
}

async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<GatewayQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let transport = state
        .dispatcher
        .transport()
        .cloned()
        .ok_or(ApiError::TransportUnavailable)?;

    Ok(ws.on_upgrade(move |socket| connection::handle_connection(socket, transport, query.room_id)))
}
