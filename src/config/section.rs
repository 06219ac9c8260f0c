//! Configuration sections of `storyreload.toml`.
//!
//! ```toml
//! [build]
//! package = "catalog"              # passed to the build command
//! output = "var"                   # built site
//! content = "."                    # watched sources
//! command = ["python", "-m", "storytime.build"]
//! extra_watch = ["../shared"]      # only static assets are relevant here
//!
//! [watch]
//! debounce_ms = 300
//! ignore = ["node_modules"]
//!
//! [pool]
//! size = 2
//! build_timeout_secs = 60
//! warmup_timeout_secs = 10
//! shutdown_grace_secs = 10
//!
//! [broadcast]
//! send_timeout_secs = 5
//!
//! [serve]
//! interface = "127.0.0.1"
//! port = 8080
//! ws_port = 35729
//! ```

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::actor::fs::DEFAULT_DEBOUNCE_MS;

/// `[build]` - what to build and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSection {
    /// Package location handed to the build command.
    pub package: Option<String>,
    pub output: PathBuf,
    pub content: PathBuf,
    /// Program and leading arguments; package and output are appended.
    pub command: Vec<String>,
    pub extra_watch: Vec<PathBuf>,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            package: None,
            output: PathBuf::from("var"),
            content: PathBuf::from("."),
            command: ["python", "-m", "storytime.build"]
                .into_iter()
                .map(String::from)
                .collect(),
            extra_watch: Vec::new(),
        }
    }
}

/// `[watch]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSection {
    pub debounce_ms: u64,
    /// Extra path segments treated as noise.
    pub ignore: Vec<String>,
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            ignore: Vec::new(),
        }
    }
}

/// `[pool]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSection {
    pub size: usize,
    pub build_timeout_secs: u64,
    pub warmup_timeout_secs: u64,
    pub shutdown_grace_secs: u64,
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            size: 2,
            build_timeout_secs: 60,
            warmup_timeout_secs: 10,
            shutdown_grace_secs: 10,
        }
    }
}

/// `[broadcast]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastSection {
    pub send_timeout_secs: u64,
}

impl Default for BroadcastSection {
    fn default() -> Self {
        Self {
            send_timeout_secs: 5,
        }
    }
}

/// `[serve]` - development servers.
///
/// Use `interface = "0.0.0.0"` to make the catalog reachable from the LAN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeSection {
    pub interface: IpAddr,
    /// HTTP port number.
    pub port: u16,
    /// Live reload WebSocket port.
    pub ws_port: u16,
}

impl Default for ServeSection {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8080,
            ws_port: 35729,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReloadConfig;
    use std::net::Ipv6Addr;

    fn parse(content: &str) -> ReloadConfig {
        toml::from_str(content).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse("");
        assert_eq!(config.build.output, PathBuf::from("var"));
        assert_eq!(config.build.content, PathBuf::from("."));
        assert_eq!(config.build.command, ["python", "-m", "storytime.build"]);
        assert_eq!(config.watch.debounce_ms, 300);
        assert_eq!(config.pool, PoolSection::default());
        assert_eq!(config.pool.size, 2);
        assert_eq!(config.broadcast.send_timeout_secs, 5);
        assert_eq!(config.serve.port, 8080);
        assert_eq!(config.serve.ws_port, 35729);
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config = parse("[pool]\nsize = 4\n[serve]\nport = 9000");
        assert_eq!(config.pool.size, 4);
        assert_eq!(config.pool.build_timeout_secs, 60);
        assert_eq!(config.serve.port, 9000);
        assert_eq!(config.serve.interface, IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn test_build_section() {
        let config = parse(
            r#"
            [build]
            package = "catalog"
            output = "dist"
            command = ["uv", "run", "build-catalog"]
            extra_watch = ["../shared"]
            "#,
        );
        assert_eq!(config.build.package.as_deref(), Some("catalog"));
        assert_eq!(config.build.output, PathBuf::from("dist"));
        assert_eq!(config.build.command[0], "uv");
        assert_eq!(config.build.extra_watch, vec![PathBuf::from("../shared")]);
    }

    #[test]
    fn test_interface_variants() {
        let config = parse("[serve]\ninterface = \"::1\"");
        assert_eq!(config.serve.interface, IpAddr::V6(Ipv6Addr::LOCALHOST));
    }

    #[test]
    fn test_invalid_type_rejected() {
        assert!(toml::from_str::<ReloadConfig>("[pool]\nsize = \"two\"").is_err());
    }
}
