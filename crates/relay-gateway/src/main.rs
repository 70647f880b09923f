//! Relay Gateway entry point
//!
//! Run with:
//! ```bash
//! cargo run -p relay-gateway
//! ```
//!
//! Configuration is loaded from environment variables.

use relay_common::{try_init_tracing_with_config, AppConfig, TracingConfig};
use relay_gateway::protocol::UnlinkedConnector;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing
    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_environment(config.app.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    info!(
        env = ?config.app.env,
        address = %config.gateway.address(),
        data_dir = %config.storage.data_dir.display(),
        "Starting Relay Gateway..."
    );

    if let Err(e) = relay_gateway::run(config, Arc::new(UnlinkedConnector)).await {
        error!(error = %e, "Gateway failed");
        std::process::exit(1);
    }
}
