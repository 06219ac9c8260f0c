//! Site Builder Interface
//!
//! The build itself (catalog discovery, HTML rendering, asset copying) is an
//! external collaborator. This module defines the seam the worker pool drives:
//!
//! - [`SiteBuilder`]: one builder instance, used for exactly one build
//! - [`BuilderFactory`]: creates a fresh builder inside each worker thread
//! - [`CommandBuilder`]: default builder, runs the configured command as a
//!   child process

mod command;

pub use command::{CommandBuilder, CommandFactory};
pub use tokio_util::sync::CancellationToken;

use std::path::PathBuf;

/// What to build and where to put it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Importable location of the catalog package (e.g. `examples.minimal`).
    pub package_location: String,
    /// Directory the rendered site is written to.
    pub output_dir: PathBuf,
}

impl BuildRequest {
    pub fn new(package_location: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            package_location: package_location.into(),
            output_dir: output_dir.into(),
        }
    }
}

/// Outcome of one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    pub ok: bool,
    pub error: Option<String>,
}

impl BuildResult {
    pub fn success() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
        }
    }
}

/// A builder instance. Never reused across builds.
pub trait SiteBuilder: Send {
    /// Readiness probe, run once right after the worker thread starts.
    fn warm_up(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Build the site. Failures are reported in the result, never panicked.
    fn build(&mut self, request: &BuildRequest, cancel: &CancellationToken) -> BuildResult;
}

/// Creates one fresh [`SiteBuilder`] per worker.
pub trait BuilderFactory: Send + Sync + 'static {
    fn create(&self) -> Box<dyn SiteBuilder>;
}

impl<F> BuilderFactory for F
where
    F: Fn() -> Box<dyn SiteBuilder> + Send + Sync + 'static,
{
    fn create(&self) -> Box<dyn SiteBuilder> {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl SiteBuilder for Echo {
        fn build(&mut self, request: &BuildRequest, _cancel: &CancellationToken) -> BuildResult {
            if request.package_location.is_empty() {
                BuildResult::failure("empty package location")
            } else {
                BuildResult::success()
            }
        }
    }

    #[test]
    fn test_build_result_constructors() {
        assert_eq!(
            BuildResult::success(),
            BuildResult {
                ok: true,
                error: None
            }
        );
        let failed = BuildResult::failure("boom");
        assert!(!failed.ok);
        assert_eq!(failed.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_closure_factory() {
        let factory = || Box::new(Echo) as Box<dyn SiteBuilder>;
        let mut builder = factory.create();
        let cancel = CancellationToken::new();

        assert!(builder.warm_up().is_ok());
        assert!(builder.build(&BuildRequest::new("catalog", "var"), &cancel).ok);
        assert!(!builder.build(&BuildRequest::new("", "var"), &cancel).ok);
    }
}
