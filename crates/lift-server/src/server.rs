use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use lift_engine::LiftService;
use lift_settings::ServerSettings;
use lift_telemetry::MetricsRecorder;

use crate::{routes, ws};

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Empty or containing `*` allows any origin.
    pub allowed_origins: Vec<String>,
    pub max_send_queue: usize,
    pub heartbeat_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_settings(&ServerSettings::default())
    }
}

impl ServerConfig {
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            allowed_origins: settings.allowed_origins.clone(),
            max_send_queue: settings.max_send_queue,
            heartbeat_interval: Duration::from_millis(settings.heartbeat_interval_ms.max(1)),
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<LiftService>,
    pub metrics: Arc<MetricsRecorder>,
    pub max_send_queue: usize,
    pub heartbeat_interval: Duration,
    /// Cancelled when the server shuts down; ends open WebSocket sessions.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(service: Arc<LiftService>, metrics: Arc<MetricsRecorder>, config: &ServerConfig) -> Self {
        Self {
            service,
            metrics,
            max_send_queue: config.max_send_queue,
            heartbeat_interval: config.heartbeat_interval,
            shutdown: CancellationToken::new(),
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/session", post(routes::create_session))
        .route("/session/{id}", get(routes::get_session))
        .route(
            "/session/{id}/request",
            post(routes::call_lift).get(routes::list_requests),
        )
        .route("/session/{id}/request/", get(routes::list_requests))
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(routes::health))
        .with_state(state)
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

/// Bind and start serving. Returns a handle to shut it down.
pub async fn start(config: ServerConfig, state: AppState) -> Result<ServerHandle, std::io::Error> {
    let shutdown = state.shutdown.clone();
    let router = build_router(state, &config.allowed_origins);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    info!(addr = %local_addr, "lift server started");

    let signal = shutdown.clone();
    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(signal.cancelled_owned())
            .await
        {
            warn!(error = %e, "server stopped with error");
        }
    });

    Ok(ServerHandle {
        addr: local_addr,
        shutdown,
        task,
    })
}

/// Handle returned by `start()`. Keeps the server task alive.
pub struct ServerHandle {
    pub addr: SocketAddr,
    shutdown: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Stop accepting, close WebSocket sessions and wait for the server task.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "server task failed");
        }
        info!("lift server stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_follows_settings() {
        let settings = ServerSettings {
            port: 7000,
            allowed_origins: vec!["http://a.test".into()],
            heartbeat_interval_ms: 5_000,
            ..Default::default()
        };
        let config = ServerConfig::from_settings(&settings);
        assert_eq!(config.port, 7000);
        assert_eq!(config.allowed_origins, vec!["http://a.test"]);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(5));
    }

    #[test]
    fn cors_layer_accepts_lists_and_wildcards() {
        let _ = cors_layer(&[]);
        let _ = cors_layer(&["*".to_string()]);
        let _ = cors_layer(&["http://a.test".to_string(), "bad\norigin".to_string()]);
    }
}
