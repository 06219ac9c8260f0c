//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

/// Live-reloading build pipeline for component catalogs
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: storyreload.toml, if present)
    #[arg(short = 'C', long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Enable verbose output for debugging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run one isolated build and exit
    #[command(visible_alias = "b")]
    Build {
        /// Package location handed to the build command
        package: String,

        /// Output directory
        #[arg(value_hint = clap::ValueHint::DirPath)]
        output: PathBuf,
    },

    /// Serve the catalog with live reload
    #[command(visible_alias = "s")]
    Serve {
        #[command(flatten)]
        args: ServeArgs,
    },

    /// Print how changes to the given paths would be routed
    #[command(visible_alias = "c")]
    Classify {
        /// Paths relative to the watched content root
        #[arg(required = true, value_hint = clap::ValueHint::AnyPath)]
        paths: Vec<PathBuf>,
    },
}

/// Serve command arguments. Each one overrides config and environment.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Package location (default: `[build] package`)
    pub package: Option<String>,

    /// Output directory path (relative to project root)
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output: Option<PathBuf>,

    /// Content directory to watch (relative to project root)
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub content: Option<PathBuf>,

    /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
    #[arg(short, long)]
    pub interface: Option<IpAddr>,

    /// HTTP port number to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Live reload WebSocket port
    #[arg(short = 'w', long)]
    pub ws_port: Option<u16>,

    /// Quiet window before a rebuild, in milliseconds
    #[arg(short, long)]
    pub debounce_ms: Option<u64>,

    /// Number of warm build workers
    #[arg(short = 'j', long)]
    pub pool_size: Option<usize>,

    /// Seconds before a build is abandoned
    #[arg(short = 't', long)]
    pub build_timeout: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_positionals() {
        let cli = Cli::try_parse_from(["storyreload", "build", "catalog", "var"]).unwrap();
        match cli.command {
            Commands::Build { package, output } => {
                assert_eq!(package, "catalog");
                assert_eq!(output, PathBuf::from("var"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_serve_overrides() {
        let cli = Cli::try_parse_from([
            "storyreload", "-v", "serve", "catalog", "-p", "9000", "--ws-port", "9001", "-j", "4",
            "--debounce-ms", "150",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Commands::Serve { args } = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.package.as_deref(), Some("catalog"));
        assert_eq!(args.port, Some(9000));
        assert_eq!(args.ws_port, Some(9001));
        assert_eq!(args.pool_size, Some(4));
        assert_eq!(args.debounce_ms, Some(150));
        assert_eq!(args.build_timeout, None);
    }

    #[test]
    fn test_classify_requires_paths() {
        assert!(Cli::try_parse_from(["storyreload", "classify"]).is_err());
        let cli = Cli::try_parse_from(["storyreload", "c", "static/app.css", "docs/intro.md"]).unwrap();
        assert!(matches!(cli.command, Commands::Classify { ref paths } if paths.len() == 2));
    }
}
