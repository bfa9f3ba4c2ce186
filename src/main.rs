//! stream-oracle binary entrypoint.
//! Loads config, wires collectors, store and engine, then runs the
//! collection/analysis scheduler until Ctrl-C.

use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stream_oracle::config::{AppConfig, PlatformCredentials};
use stream_oracle::weights::HotReloadWeights;
use stream_oracle::{
    spawn_scheduler, AnalysisEngine, CollectorRegistry, MemoryStore, Pipeline, TelemetryStore,
};

/// Compact logs by default; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("stream_oracle=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load_default().context("loading configuration")?;

    if let Some(listen) = cfg.metrics.listen.as_deref() {
        let addr = stream_oracle::exporter::install_prometheus(listen)?;
        tracing::info!(%addr, "prometheus listener started");
    }

    let creds = PlatformCredentials::from_env();
    if !creds.has_twitch() {
        tracing::warn!("TWITCH_CLIENT_ID/TWITCH_CLIENT_SECRET not set; twitch collection disabled");
    }
    if !creds.has_youtube() {
        tracing::warn!("YOUTUBE_API_KEY not set; youtube collection disabled");
    }
    let registry = CollectorRegistry::from_credentials(&creds);

    let weights = Arc::new(HotReloadWeights::new(cfg.analyze.weights_path.as_deref()));
    tracing::info!(path = %weights.path().display(), "signal weights source");
    let engine = AnalysisEngine::with_hot_weights(weights);

    let store: Arc<dyn TelemetryStore> = Arc::new(MemoryStore::default());
    let pipeline = Arc::new(
        Pipeline::new(registry, store, engine)
            .with_config(cfg.collect.clone(), cfg.analyze.clone()),
    );

    for seed in &cfg.channels {
        match pipeline.track_channel(seed.platform, &seed.username).await {
            Ok(ch) => tracing::info!(channel = %ch.key, live = ch.is_live, "seeded channel"),
            Err(e) => tracing::warn!(platform = %seed.platform, username = %seed.username, error = %e, "failed to seed channel"),
        }
    }

    let (collect, analyze) = spawn_scheduler(pipeline);

    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    tracing::info!("shutting down");
    collect.abort();
    analyze.abort();
    Ok(())
}
