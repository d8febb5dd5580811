use adforge_worker::{build_pipeline, log_events, WorkerSettings};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "adforge_worker=debug,adforge_pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = WorkerSettings::from_env();
    tracing::info!(
        storage_root = %settings.storage_root,
        remote = %settings.remote_base_url,
        "Worker starting"
    );

    let pipeline = build_pipeline(&settings);
    tokio::spawn(log_events(pipeline.clone()));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Worker shutting down");
    Ok(())
}
