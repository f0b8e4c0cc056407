use anyhow::Context;
use splitbill_ocr::ReceiptPipeline;
use splitbill_server::{build_engine, router, AppState, LogFormat, ServerConfig};
use std::sync::Arc;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Pretty => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
        LogFormat::Bunyan => {
            let subscriber = Registry::default()
                .with(filter)
                .with(JsonStorageLayer)
                .with(BunyanFormattingLayer::new("splitbill-server".into(), std::io::stdout));
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to install tracing subscriber")?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::load().context("Failed to load configuration")?;
    init_tracing(config.log_format)?;

    let attachments_dir = config.attachments_dir();
    std::fs::create_dir_all(&attachments_dir).with_context(|| {
        format!("Failed to create attachments directory {}", attachments_dir.display())
    })?;

    let db = splitbill_storage::create_db(&config.database_path)
        .await
        .context("Failed to open database")?;

    let pipeline = ReceiptPipeline::new(build_engine(&config.ocr), config.parser.clone());
    let state = AppState { db, pipeline: Arc::new(pipeline), attachments_dir };
    let app = router(state, config.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    tracing::info!("Listening on {}", config.bind);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
