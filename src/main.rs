use imgcdn::config::{Config, DEFAULT_CONFIG_PATH};
use imgcdn::error::StartupError;
use imgcdn::{logger, server, BoundServer};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Optional first argument: config file path (without extension)
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let cfg = Config::load_from(&config_path).map_err(StartupError::Config)?;

    logger::init(&cfg)?;

    // Create Tokio runtime, sizing the worker pool from config
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers.filter(|w| *w > 0) {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    let bound = BoundServer::bind(cfg).await?;
    bound.serve(server::shutdown_signal()).await?;
    Ok(())
}
