use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, routing::get};
use tessera_auth::{InMemoryTicketStore, OAuthState, TicketStore, TokenEngine};
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::bootstrap;
use crate::config::AppConfig;

/// How often expired tickets are purged from the store.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct TesseraServer {
    addr: SocketAddr,
    app: Router,
    tickets: Arc<dyn TicketStore>,
}

pub fn build_app(cfg: &AppConfig, engine: Arc<TokenEngine>) -> Router {
    let body_limit = cfg.server.body_limit_bytes;
    Router::new()
        .route("/healthz", get(healthz))
        .nest(
            "/oauth2.0",
            tessera_auth::router(OAuthState::new(engine)),
        )
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|req: &axum::http::Request<_>| {
                            use tracing::field::Empty;
                            tracing::info_span!(
                                "http.request",
                                http.method = %req.method(),
                                http.target = %req.uri().path(),
                                http.status_code = Empty,
                            )
                        })
                        .on_response(
                            |res: &axum::http::Response<_>,
                             latency: Duration,
                             span: &tracing::Span| {
                                span.record(
                                    "http.status_code",
                                    tracing::field::display(res.status().as_u16()),
                                );
                                tracing::info!(
                                    http.status = %res.status().as_u16(),
                                    elapsed_ms = %latency.as_millis(),
                                    "request handled"
                                );
                            },
                        ),
                )
                .layer(CorsLayer::permissive())
                .layer(axum::extract::DefaultBodyLimit::max(body_limit)),
        )
}

async fn healthz() -> &'static str {
    "ok"
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    /// Registers the bootstrap clients and users and assembles the engine.
    pub fn build(self) -> anyhow::Result<TesseraServer> {
        let clients = bootstrap::client_registry(&self.config.bootstrap)?;
        let users = bootstrap::user_authenticator(&self.config.bootstrap)?;
        let tickets: Arc<dyn TicketStore> = Arc::new(InMemoryTicketStore::new());

        let engine = TokenEngine::new(
            &self.config.auth,
            Arc::new(clients),
            tickets.clone(),
            Arc::new(users),
        )?;
        tracing::info!(
            issuer = %self.config.auth.issuer,
            algorithm = %self.config.auth.signing.algorithm,
            encryption = self.config.auth.crypto.encryption_enabled,
            "Token engine ready"
        );

        Ok(TesseraServer {
            addr: self.addr,
            app: build_app(&self.config, Arc::new(engine)),
            tickets,
        })
    }
}

impl TesseraServer {
    pub fn router(&self) -> Router {
        self.app.clone()
    }

    pub fn tickets(&self) -> Arc<dyn TicketStore> {
        self.tickets.clone()
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        self.serve(listener).await
    }

    /// Serves on an already bound listener until Ctrl+C.
    pub async fn serve(self, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
        tracing::info!("listening on {}", listener.local_addr()?);
        let sweeper = spawn_sweeper(self.tickets.clone(), SWEEP_INTERVAL);
        let result = axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await;
        sweeper.abort();
        result?;
        Ok(())
    }
}

/// Periodically removes expired tickets.
pub fn spawn_sweeper(tickets: Arc<dyn TicketStore>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // the first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            match tickets.cleanup_expired().await {
                Ok(purged) => tracing::debug!(purged, "Expired tickets removed"),
                Err(e) => tracing::warn!(error = %e, "Ticket cleanup failed"),
            }
        }
    })
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use tessera_auth::types::{DeviceUserCode, Ticket};

    use super::*;

    #[tokio::test]
    async fn test_sweeper_purges_expired_tickets() {
        let store = Arc::new(InMemoryTicketStore::new());
        let now = time::OffsetDateTime::now_utc();
        store
            .create(Ticket::from(DeviceUserCode {
                id: "BCDF".into(),
                device_code: "ODT-1".into(),
                created_at: now,
                expires_at: now - time::Duration::seconds(1),
            }))
            .await
            .unwrap();
        assert_eq!(store.len(), 1);

        let sweeper = spawn_sweeper(store.clone(), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(store.len(), 0);
        sweeper.abort();
    }
}
