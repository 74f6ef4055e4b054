use crate::{
    middleware::{
        cors_layer, error_handling_middleware, request_id_middleware, request_logging_middleware,
        security_headers_middleware,
    },
    routes::create_routes,
    ApiConfig,
};
use axum::Router;
use bearmobile_core::SupportCore;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub struct ApiServer {
    config: ApiConfig,
    core: Arc<SupportCore>,
}

impl ApiServer {
    pub fn new(config: ApiConfig, core: Arc<SupportCore>) -> Self {
        Self { config, core }
    }

    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let app = self.create_app();
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port).parse()?;

        info!("Starting API server on {}", addr);
        info!("CORS origins: {:?}", self.config.cors_origins);
        info!("WebSocket support: {}", self.config.enable_websockets);

        self.start_background_tasks();

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("API server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("API server stopped");
        Ok(())
    }

    pub fn create_app(&self) -> Router {
        create_routes(self.core.clone(), &self.config).layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&self.config))
                .layer(axum::middleware::from_fn(security_headers_middleware))
                .layer(axum::middleware::from_fn(request_id_middleware))
                .layer(axum::middleware::from_fn(request_logging_middleware))
                .layer(axum::middleware::from_fn(error_handling_middleware)),
        )
    }

    fn start_background_tasks(&self) {
        let sessions = self.core.sessions.clone();
        let period = Duration::from_secs(self.config.session_cleanup_interval_secs.max(1));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                if let Err(e) = sessions.write().await.cleanup_expired_sessions().await {
                    error!("Error cleaning up expired sessions: {}", e);
                }
            }
        });

        info!("Background tasks started");
    }

    pub fn get_config(&self) -> &ApiConfig {
        &self.config
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_core;
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    fn create_test_server() -> ApiServer {
        ApiServer::new(ApiConfig::default(), test_core())
    }

    #[test]
    fn test_server_creation() {
        let server = create_test_server();
        assert_eq!(server.get_config().port, 8080);
        assert!(server.get_config().enable_websockets);
    }

    #[tokio::test]
    async fn test_index_page_and_headers() {
        let app = create_test_server().create_app();
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = create_test_server().create_app();
        let response = app
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_metrics_route() {
        let app = create_test_server().create_app();
        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let metrics: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(metrics["cache"]["entries"], 0);
        let threshold = metrics["cache"]["similarity_threshold"].as_f64().unwrap();
        assert!((threshold - 0.95).abs() < 1e-6);
        assert_eq!(metrics["sessions"]["active_count"], 0);
        assert_eq!(metrics["tools"], 0);
    }
}
