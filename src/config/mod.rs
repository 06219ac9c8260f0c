//! Configuration for `storyreload.toml`.
//!
//! Precedence, lowest first:
//!
//! ```text
//! defaults → storyreload.toml → STORYRELOAD_* environment → CLI flags
//! ```
//!
//! | Section       | Purpose                                        |
//! |---------------|------------------------------------------------|
//! | `[build]`     | Package, output, watched content, command      |
//! | `[watch]`     | Debounce window, extra ignore segments         |
//! | `[pool]`      | Warm worker count and timeouts                 |
//! | `[broadcast]` | Per-connection send timeout                    |
//! | `[serve]`     | HTTP and WebSocket binding                     |

mod error;
mod section;
mod util;

pub use error::{ConfigDiagnostic, ConfigDiagnostics, ConfigError};
pub use section::{BroadcastSection, BuildSection, PoolSection, ServeSection, WatchSection};

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::actor::fs::{Debouncer, WatchFilter};
use crate::actor::pool::PoolConfig;
use crate::builder::BuildRequest;
use crate::cli::{Cli, Commands, ServeArgs};
use crate::log;
use util::{find_config_file, resolve_path};

/// Config file looked up when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "storyreload.toml";

/// Root configuration structure representing storyreload.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReloadConfig {
    /// Absolute path to the config file, if one was loaded (internal use only)
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// Project root: config file's directory, else cwd (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub build: BuildSection,

    #[serde(default)]
    pub watch: WatchSection,

    #[serde(default)]
    pub pool: PoolSection,

    #[serde(default)]
    pub broadcast: BroadcastSection,

    #[serde(default)]
    pub serve: ServeSection,
}

impl ReloadConfig {
    /// Load configuration for a CLI invocation.
    ///
    /// An explicit `--config` must exist; the default file is optional.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;

        let config_path = match &cli.config {
            Some(path) => Some(cwd.join(path)),
            None => find_config_file(Path::new(DEFAULT_CONFIG_FILE), &cwd),
        };

        let mut config = match &config_path {
            Some(path) => Self::from_path(path)?,
            None => {
                crate::debug!("config"; "no {} found, using defaults", DEFAULT_CONFIG_FILE);
                Self::default()
            }
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        if let Commands::Serve { args } = &cli.command {
            config.apply_serve_args(args);
        }

        let root = config_path
            .as_deref()
            .and_then(Path::parent)
            .map_or(cwd, Path::to_path_buf);
        config.config_path = config_path;
        config.finalize(&root);
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from file path.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    // ========================================================================
    // overrides
    // ========================================================================

    /// Apply `STORYRELOAD_*` variables.
    ///
    /// `lookup` is `std::env::var` in production.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        fn parse<T: FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
            target: &mut T,
        ) -> Result<(), ConfigError> {
            let Some(raw) = lookup(key) else {
                return Ok(());
            };
            *target = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Validation(format!("{key}: invalid value `{raw}`")))?;
            Ok(())
        }

        parse(&lookup, "STORYRELOAD_DEBOUNCE_MS", &mut self.watch.debounce_ms)?;
        parse(&lookup, "STORYRELOAD_POOL_SIZE", &mut self.pool.size)?;
        parse(&lookup, "STORYRELOAD_BUILD_TIMEOUT", &mut self.pool.build_timeout_secs)?;
        parse(&lookup, "STORYRELOAD_SEND_TIMEOUT", &mut self.broadcast.send_timeout_secs)?;
        Ok(())
    }

    /// Apply serve flags from CLI.
    pub fn apply_serve_args(&mut self, args: &ServeArgs) {
        if let Some(package) = &args.package {
            self.build.package = Some(package.clone());
        }
        Self::update_option(&mut self.build.output, args.output.as_ref());
        Self::update_option(&mut self.build.content, args.content.as_ref());
        Self::update_option(&mut self.serve.interface, args.interface.as_ref());
        Self::update_option(&mut self.serve.port, args.port.as_ref());
        Self::update_option(&mut self.serve.ws_port, args.ws_port.as_ref());
        Self::update_option(&mut self.watch.debounce_ms, args.debounce_ms.as_ref());
        Self::update_option(&mut self.pool.size, args.pool_size.as_ref());
        Self::update_option(&mut self.pool.build_timeout_secs, args.build_timeout.as_ref());
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Anchor every configured path at `root`.
    pub fn finalize(&mut self, root: &Path) {
        self.root = resolve_path(root, root);
        self.build.output = resolve_path(&self.build.output, &self.root);
        self.build.content = resolve_path(&self.build.content, &self.root);
        self.build.extra_watch = self
            .build
            .extra_watch
            .iter()
            .map(|p| resolve_path(p, &self.root))
            .collect();
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Collects all validation errors and returns them at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut diag = ConfigDiagnostics::new();

        if self.pool.size == 0 {
            diag.error("pool.size", "must be at least 1");
        }
        for (field, secs) in [
            ("pool.build_timeout_secs", self.pool.build_timeout_secs),
            ("pool.warmup_timeout_secs", self.pool.warmup_timeout_secs),
            ("broadcast.send_timeout_secs", self.broadcast.send_timeout_secs),
        ] {
            if secs == 0 {
                diag.error(field, "must be greater than 0");
            }
        }
        if self.watch.debounce_ms == 0 {
            diag.error("watch.debounce_ms", "must be greater than 0");
        }

        match self.build.command.first() {
            None => diag.error_with_hint(
                "build.command",
                "is empty",
                r#"e.g. command = ["python", "-m", "storytime.build"]"#,
            ),
            Some(program) if which::which(program).is_err() => {
                log!("config"; "build command `{}` not found in PATH", program);
            }
            Some(_) => {}
        }

        diag.into_result().map_err(ConfigError::Diagnostics)
    }

    // ========================================================================
    // derived settings
    // ========================================================================

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            size: self.pool.size,
            build_timeout: Duration::from_secs(self.pool.build_timeout_secs),
            warmup_timeout: Duration::from_secs(self.pool.warmup_timeout_secs),
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.pool.shutdown_grace_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.broadcast.send_timeout_secs)
    }

    pub fn debouncer(&self) -> Debouncer {
        Debouncer::new(Duration::from_millis(self.watch.debounce_ms))
            .with_ignore(self.watch.ignore.clone())
    }

    pub fn watch_filter(&self) -> WatchFilter {
        WatchFilter::new(&self.build.content, &self.build.extra_watch, &self.build.output)
    }

    /// `None` when no package is configured.
    pub fn build_request(&self) -> Option<BuildRequest> {
        self.build
            .package
            .as_ref()
            .map(|pkg| BuildRequest::new(pkg.clone(), self.build.output.clone()))
    }
}
