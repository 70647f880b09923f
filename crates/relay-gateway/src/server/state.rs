//! Gateway state
//!
//! Application state shared by the health surface and the run loop.

use crate::registry::InstanceRegistry;
use relay_common::AppConfig;
use std::sync::Arc;

/// Gateway application state
#[derive(Clone)]
pub struct GatewayState {
    /// Registry of tenant sessions
    registry: Arc<InstanceRegistry>,
    /// Application configuration
    config: Arc<AppConfig>,
}

impl GatewayState {
    pub fn new(registry: Arc<InstanceRegistry>, config: AppConfig) -> Self {
        Self {
            registry,
            config: Arc::new(config),
        }
    }

    pub fn registry(&self) -> &Arc<InstanceRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("registry", &self.registry)
            .field("config", &"AppConfig")
            .finish()
    }
}
