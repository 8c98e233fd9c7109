use std::sync::Arc;

use crate::config::{Config, ConfigLoader};
use crate::shutdown::Shutdown;

/// Everything a long-running component needs from its host process: how to
/// read the current configuration and how to find out about shutdown.
///
/// Cloning is cheap; every clone shares the same underlying config loader and
/// subscribes to the same shutdown broadcast.
#[derive(Clone)]
pub struct ServiceContext {
    name: String,
    config_loader: Arc<ConfigLoader>,
    shutdown: Shutdown,
}

impl ServiceContext {
    pub fn new(
        name: String,
        config_loader: Arc<ConfigLoader>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            name,
            config_loader,
            shutdown,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.name
    }

    pub fn config_loader(&self) -> Arc<ConfigLoader> {
        self.config_loader.clone()
    }

    /// Re-reads configuration from source. Cheap enough to call per tick.
    pub fn load_config(&self) -> Config {
        self.config_loader.load().unwrap()
    }

    /// Awaits the shutdown signal.
    pub async fn recv_shutdown_signal(&mut self) {
        self.shutdown.recv().await
    }

    /// Causes all listeners to start the shutdown sequence.
    pub fn broadcast_shutdown(&mut self) {
        self.shutdown.broadcast_shutdown()
    }
}
