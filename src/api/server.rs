//! API Server

use super::{
    handlers::AppState,
    middleware::{create_cors_layer, request_id_middleware},
    routes::create_router,
};
use crate::{
    clock::Clock,
    config::FairwayConfig,
    ingest::{HoleScoreIngestor, NotificationSink, ScoreFeed},
    settlement::SettlementCoordinator,
    storage::KvStore,
    wagers::PressBook,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};

pub struct ApiServer {
    config: FairwayConfig,
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
}

impl ApiServer {
    pub fn new(config: FairwayConfig, store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            store,
            clock,
        }
    }

    /// Wire the engine together and build the state shared by handlers
    pub fn build_state(&self) -> Arc<AppState> {
        let feed = ScoreFeed::default();
        let sink: Arc<dyn NotificationSink> = Arc::new(feed.clone());
        let coordinator = Arc::new(SettlementCoordinator::new(
            self.store.clone(),
            self.clock.clone(),
            &self.config.settlement,
        ));
        let ingestor = Arc::new(HoleScoreIngestor::new(
            self.store.clone(),
            coordinator.clone(),
            feed.clone(),
            sink.clone(),
            self.clock.clone(),
        ));
        let presses = Arc::new(PressBook::new(
            self.store.clone(),
            self.clock.clone(),
            self.config.press_window(),
        ));

        Arc::new(AppState {
            store: self.store.clone(),
            ingestor,
            coordinator,
            presses,
            feed,
            sink,
            await_settlement: self.config.await_settlement(),
        })
    }

    /// Router with the middleware stack applied
    pub fn create_app(&self, state: Arc<AppState>) -> axum::Router {
        create_router(state)
            // Request ID middleware (first for tracing)
            .layer(axum::middleware::from_fn(request_id_middleware))
            // CORS layer (before timeout to handle preflight)
            .layer(create_cors_layer(self.config.api.allowed_origins.clone()))
            .layer(TimeoutLayer::new(self.config.request_timeout()))
            .layer(TraceLayer::new_for_http())
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let state = self.build_state();
        let sweeper = state
            .presses
            .clone()
            .spawn_expiry_sweeper(self.config.expiry_sweep_interval());
        let app = self.create_app(state);
        let addr = self.socket_addr()?;

        info!("🌐 Starting fairway API server");
        info!("   Listen: http://{}", addr);
        self.log_server_info();

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("✅ Fairway API server running");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        sweeper.abort();
        info!("🛑 API server stopped gracefully");
        Ok(())
    }

    fn socket_addr(&self) -> Result<SocketAddr, Box<dyn std::error::Error>> {
        Ok(SocketAddr::from((
            self.config.api.host.parse::<std::net::IpAddr>()?,
            self.config.api.port,
        )))
    }

    fn log_server_info(&self) {
        info!("📋 Server Configuration:");
        info!("   Data directory: {}", self.config.storage.data_directory);
        info!("   CORS: {:?}", self.config.api.allowed_origins);
        info!("   Request timeout: {}s", self.config.api.request_timeout_secs);
        info!("   Press window: {}s", self.config.settlement.press_window_secs);
        info!("   Conflict retries: {}", self.config.settlement.max_conflict_retries);

        info!("📊 Available endpoints:");
        info!("   PUT  /rounds/:round_id/holes/:hole     - Enter a score");
        info!("   POST /tournaments/:id/rounds           - Join a tournament");
        info!("   POST /rounds/delegated                 - Open a round for a pending player");
        info!("   POST /presses                          - Propose a press");
        info!("   POST /presses/:id/accept|decline       - Answer a press");
        info!("   POST /presses/:id/measurement          - Settle a measured press");
        info!("   POST /tournaments/:id/holes/:hole/three-putts");
        info!("   POST /tournaments/:id/holes/:hole/settle");
        info!("   GET  /tournaments/:id/skins|snakes");
        info!("   GET  /ws                               - Score feed");
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }

    warn!("🛑 Shutting down gracefully...");
}
