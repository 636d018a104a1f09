use anyhow::{Context, Result};
use clap::Args;
use std::{path::PathBuf, sync::Arc, time::Duration};
use stewart::{
    config::Config,
    controller::Controller,
    output::PulseOutput,
    store::{BlobStore, FileStore},
    transport,
};
use tracing_subscriber::EnvFilter;

#[derive(Args)]
pub struct StartArgs {
    /// Path to the configuration file (TOML or JSON).
    pub config: PathBuf,
}

impl StartArgs {
    pub fn run(&self) -> Result<()> {
        // Replies go to stdout, so logs must not
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_writer(std::io::stderr)
            .init();

        let config = Config::from_file(&self.config)?;
        config.validate()?;

        tracing::info!("Starting stewart with config: {}", self.config.display());
        tracing::info!(
            device = %config.device.id,
            transport = ?config.transport,
            "controller configured"
        );

        let store = config.store.dir.as_ref().map(|dir| {
            tracing::info!("Persisting settings under {}", dir.display());
            Arc::new(FileStore::new(dir)) as Arc<dyn BlobStore>
        });

        let output = PulseOutput::new(config.servo);
        let controller = Arc::new(Controller::new(&config, Box::new(output), store)?);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")?;
        let result = runtime.block_on(transport::serve(controller, &config));
        // A pending stdin read cannot be cancelled, so don't wait on it
        runtime.shutdown_timeout(Duration::from_secs(1));

        result
    }
}
