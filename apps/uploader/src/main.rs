//! assetlift command-line entry point.

mod app;
mod config;
mod output;

use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting assetlift");

    let config = config::Config::load()?;
    tracing::info!(
        api = %config.api_url,
        release_id = config.release_id,
        asset_key = %config.asset_key,
        file = %config.file_path.display(),
        overwrite = config.overwrite,
        chunk_size = config.chunk_size,
        parallel_chunks = config.parallel_chunks,
        "configuration loaded"
    );

    let rt = tokio::runtime::Runtime::new()?;
    let Some(asset) = rt.block_on(app::run(config))? else {
        tracing::info!("nothing uploaded");
        return Ok(());
    };

    if output::publish(&asset)? {
        tracing::debug!("step outputs written");
    }
    println!("{}", asset.download_url);
    Ok(())
}
