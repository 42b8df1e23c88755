#![cfg(not(tarpaulin_include))]

use morphboard::app;
use morphboard::config::Config;

/// Main entry point for the analytics backend
///
/// Initializes logging, reads configuration from the environment, and
/// runs the web server.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = Config::from_env();
    app::run(config).await
}
