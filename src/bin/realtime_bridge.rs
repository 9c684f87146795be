//! Headless session bridge over stdin/stdout JSON lines.
//!
//! Usage: `realtime-bridge [CONFIG.toml]`. Without an argument the default
//! config path is used when it exists, otherwise built-in defaults.
//!
//! All tracing/diagnostic output goes to stderr so that stdout remains a
//! clean JSON protocol channel.

use realtime_orchestrator::OrchestratorConfig;
use realtime_orchestrator::bridge::{demo_roster, run_stdio_bridge};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => OrchestratorConfig::from_file(std::path::Path::new(&path))?,
        None => {
            let path = OrchestratorConfig::default_config_path();
            if path.exists() {
                OrchestratorConfig::from_file(&path)?
            } else {
                OrchestratorConfig::default()
            }
        }
    };

    tracing::info!("realtime-bridge starting");

    let roster = demo_roster()?;
    run_stdio_bridge(config, roster).await.map_err(|e| {
        tracing::error!(error = %e, "realtime-bridge exited with error");
        anyhow::anyhow!("realtime-bridge failed: {e}")
    })?;

    tracing::info!("realtime-bridge shut down cleanly");
    Ok(())
}
