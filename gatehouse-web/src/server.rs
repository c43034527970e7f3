//! Gatehouse Web Server
//!
//! Main web server implementation using Axum.

use crate::{create_app, AppState, WebError, WebResult};
use axum::serve;
use gatehouse_core::GatehouseConfig;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Main Gatehouse web server
pub struct GatehouseServer {
    config: GatehouseConfig,
    state: AppState,
}

impl GatehouseServer {
    /// Create a new server, building all shared state
    pub async fn new(config: GatehouseConfig) -> WebResult<Self> {
        let state = AppState::new(config.clone()).await?;

        Ok(Self { config, state })
    }

    /// Start the web server and run until Ctrl-C
    pub async fn start(self) -> WebResult<()> {
        let address = self.config.server.address();

        info!("Starting Gatehouse web server");
        info!("Server address: http://{}", address);
        info!("Development mode: {}", self.config.server.dev_mode);

        let app = create_app(self.state.clone());

        let listener = TcpListener::bind(&address)
            .await
            .map_err(WebError::Server)?;

        info!("Server listening on http://{}", address);

        if let Err(e) = serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
        {
            error!("Server error: {}", e);
            return Err(WebError::Server(e));
        }

        info!("Server shut down");
        Ok(())
    }

    /// Get server configuration
    pub fn config(&self) -> &GatehouseConfig {
        &self.config
    }

    /// Get application state
    pub fn state(&self) -> &AppState {
        &self.state
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

/// Builder for GatehouseServer
pub struct GatehouseServerBuilder {
    config: GatehouseConfig,
}

impl GatehouseServerBuilder {
    /// Create a new server builder
    pub fn new() -> Self {
        Self {
            config: GatehouseConfig::default(),
        }
    }

    /// Start from an already loaded configuration
    pub fn config(mut self, config: GatehouseConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the server host
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.server.host = host.into();
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    /// Enable development mode
    pub fn dev_mode(mut self, dev_mode: bool) -> Self {
        self.config.server.dev_mode = dev_mode;
        self
    }

    /// Set database URL
    pub fn database_url<S: Into<String>>(mut self, database_url: S) -> Self {
        self.config.server.database_url = Some(database_url.into());
        self
    }

    /// Build the server
    pub async fn build(self) -> WebResult<GatehouseServer> {
        GatehouseServer::new(self.config).await
    }
}

impl Default for GatehouseServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
