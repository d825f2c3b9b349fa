//! Payroll engine HTTP server.

use std::env;

use payroll_engine::api::{create_router, AppState};
use payroll_engine::batch::RetryPolicy;
use payroll_engine::config::ConfigLoader;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_CONFIG_DIR: &str = "./config/default";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_dir = env::var("PAYROLL_CONFIG_DIR").unwrap_or_else(|_| DEFAULT_CONFIG_DIR.to_string());
    let bind_addr = env::var("PAYROLL_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

    let config = match ConfigLoader::load(&config_dir) {
        Ok(config) => config,
        Err(err) => {
            error!(path = %config_dir, error = %err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let state = AppState::from_config(config).with_worker(RetryPolicy::default());
    let router = create_router(state);

    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(addr = %bind_addr, error = %err, "failed to bind");
            std::process::exit(1);
        }
    };
    info!(addr = %bind_addr, config = %config_dir, "payroll engine listening");

    if let Err(err) = axum::serve(listener, router).await {
        error!(error = %err, "server terminated");
        std::process::exit(1);
    }
}
