//! One-shot isolated build.
//!
//! Runs exactly one build through a single-worker pool, so it gets the same
//! fresh-state guarantee, timeout and panic isolation as builds in serve mode.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};

use crate::actor::fs::normalize_path;
use crate::actor::pool::{PoolConfig, WorkerPool};
use crate::builder::{BuildRequest, BuildResult, BuilderFactory, CommandFactory};
use crate::config::ReloadConfig;
use crate::log;

/// Build `package` into `output` with the configured command.
pub fn build_once(config: &ReloadConfig, package: &str, output: &Path) -> Result<()> {
    let factory: Arc<dyn BuilderFactory> =
        Arc::new(CommandFactory::new(config.build.command.clone()));
    let request = BuildRequest::new(package, normalize_path(output));
    let pool_config = PoolConfig {
        size: 1,
        ..config.pool_config()
    };

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    let started = Instant::now();
    let result = rt.block_on(run(factory, pool_config, request))?;

    match result.error {
        None if result.ok => {
            log!(
                "build";
                "{} -> {} in {}ms",
                package,
                output.display(),
                started.elapsed().as_millis()
            );
            Ok(())
        }
        error => bail!(
            "build of `{}` failed:\n{}",
            package,
            error.unwrap_or_default()
        ),
    }
}

async fn run(
    factory: Arc<dyn BuilderFactory>,
    pool_config: PoolConfig,
    request: BuildRequest,
) -> Result<BuildResult> {
    let pool = WorkerPool::new(factory, pool_config).await;
    let result = pool.submit(request).await;
    pool.shutdown(std::time::Duration::ZERO).await;
    Ok(result?)
}
