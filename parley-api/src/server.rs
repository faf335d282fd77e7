use anyhow::Result;
use axum::{
    extract::Extension,
    http::HeaderValue,
    middleware,
    routing::{get, post, put},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::handlers::{self, chat, internal, social};
use crate::state::AppState;
use crate::websocket;

fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    match origins {
        Some(origins) => {
            let allowed: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!("Ignoring malformed CORS origin: {}", origin);
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => {
            tracing::warn!("CORS_ORIGINS not set, using permissive CORS. Set CORS_ORIGINS for production!");
            CorsLayer::permissive()
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(state.ctx.config.server.cors_origins.as_deref());

    Router::new()
        .route("/health", get(handlers::health))
        .route("/ws", get(websocket::websocket_handler))
        .route("/api/v1/relationships/request-friend", post(social::request_friend))
        .route("/api/v1/relationships/accept-request-friend", post(social::accept_friend_request))
        .route("/api/v1/relationships/decline-request-friend", post(social::decline_friend_request))
        .route("/api/v1/relationships/cancel-request-friend", post(social::cancel_friend_request))
        .route("/api/v1/relationships/friend-requests", get(social::friend_requests))
        .route("/api/v1/relationships/friends", get(social::friends))
        .route("/api/v1/relationships/unfriend", post(social::unfriend))
        .route("/api/v1/chat/send-message", post(chat::send_message))
        .route("/api/v1/chat/conversations", get(chat::conversations))
        .route("/api/v1/chat/conversations/:id", get(chat::conversation))
        .route("/api/v1/chat/groups", post(chat::create_group))
        .route("/api/v1/chat/messages/:id", get(chat::messages).delete(chat::delete_for_me))
        .route("/api/v1/chat/messages/:id/seen", post(chat::mark_seen))
        .route("/api/v1/chat/messages/:id/reaction", put(chat::react))
        .route("/internal/v1/accounts/:account_id/provision", post(internal::provision_account))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(Extension(state))
                .layer(middleware::from_fn(auth::auth_middleware))
                .layer(cors),
        )
}

pub async fn run(state: AppState, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
    let host: std::net::IpAddr = state.ctx.config.server.host.parse().unwrap_or_else(|_| {
        tracing::warn!("Invalid SERVER_HOST '{}', binding 0.0.0.0", state.ctx.config.server.host);
        std::net::IpAddr::from([0, 0, 0, 0])
    });
    let addr = SocketAddr::new(host, state.ctx.config.server.api_port);
    let app = router(state);

    tracing::info!("Starting API server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    tracing::info!("API server stopped");
    Ok(())
}
