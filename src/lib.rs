pub mod backend;
pub mod capability;
pub mod cli;
pub mod command;
pub mod config;
pub mod container;
pub mod distro;
pub mod error;
pub mod executor;
pub mod find;
pub mod package;
pub mod pipeline;
pub mod user;

mod serde_helpers;

pub use error::RsocistrapError;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{FmtSubscriber, filter::LevelFilter};

use crate::container::ImageStore;
use crate::container::buildah::{BuildahEngine, BuildahStore};
use crate::executor::CommandExecutor;

pub fn init_logging(log_level: cli::LogLevel) -> Result<()> {
    let filter = match log_level {
        cli::LogLevel::Trace => LevelFilter::TRACE,
        cli::LogLevel::Debug => LevelFilter::DEBUG,
        cli::LogLevel::Info => LevelFilter::INFO,
        cli::LogLevel::Warn => LevelFilter::WARN,
        cli::LogLevel::Error => LevelFilter::ERROR,
    };

    tracing::subscriber::set_global_default(
        FmtSubscriber::builder()
            .with_max_level(filter)
            .with_writer(std::io::stderr)
            .finish(),
    )
    .context("failed to set global default tracing subscriber")
}

fn load_validated(file: &camino::Utf8Path) -> Result<config::LoadedProfile> {
    let loaded = config::load_profile(file)
        .with_context(|| format!("failed to load profile from {}", file))?;
    loaded
        .profile
        .validate()
        .context("profile validation failed")?;
    Ok(loaded)
}

fn shutdown_store(store: &dyn ImageStore) {
    match store.shutdown(false) {
        Ok(layers) if layers.is_empty() => {}
        Ok(layers) => warn!("image store still has mounted layers: {}", layers.join(", ")),
        Err(e) => warn!("failed to shut down image store: {:#}", e),
    }
}

/// Builds the image described by the profile in `opts` and returns its ID.
pub fn run_build(opts: &cli::BuildArgs, executor: Arc<dyn CommandExecutor>) -> Result<String> {
    let loaded = load_validated(&opts.common.file)?;
    let profile = &loaded.profile;

    let options = pipeline::BuildOptions {
        digest: opts.hash_spec.then(|| loaded.digest.clone()),
        force: opts.force,
        keep: opts.keep,
        latest: opts.latest,
        log_commands: opts.log_commands,
        pull: opts.pull,
        list_packages: opts.list_packages,
    };

    let engine = Arc::new(BuildahEngine::new(executor.clone(), profile.storage.clone()));
    let store = BuildahStore::new(executor, profile.storage.clone());

    let result = pipeline::build(profile, engine, &store, &options)
        .with_context(|| format!("failed to build {}", profile.image.reference()));
    shutdown_store(&store);
    result
}

pub fn run_validate(opts: &cli::ValidateArgs) -> Result<()> {
    let loaded = load_validated(&opts.common.file)?;
    info!("validation successful:\n{:#?}", loaded.profile);
    Ok(())
}
