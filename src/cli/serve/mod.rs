//! Development server with live reload support.
//!
//! ```text
//! main thread:   tiny_http request loop → rayon pool → files from output dir
//! actor thread:  tokio runtime → Coordinator (watch, build pool, ws)
//! ```

mod content;
mod lifecycle;
mod mime;
mod path;
mod response;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};

use anyhow::{Context, Result};
use crossbeam::channel;
use tiny_http::{Request, Server};

use crate::builder::{BuilderFactory, CommandFactory};
use crate::config::ReloadConfig;
use crate::{debug, log};

/// Worker threads answering HTTP requests.
const REQUEST_THREADS: usize = 4;

/// Actual WebSocket port (may differ from the configured one after retry)
/// Updated by coordinator after WebSocket server binds successfully
static ACTUAL_WS_PORT: AtomicU16 = AtomicU16::new(0);

/// Update the actual WebSocket port (called by coordinator after binding)
pub fn set_actual_ws_port(port: u16) {
    ACTUAL_WS_PORT.store(port, Ordering::Relaxed);
}

/// Get the actual WebSocket port, `0` until bound.
pub fn actual_ws_port() -> u16 {
    ACTUAL_WS_PORT.load(Ordering::Relaxed)
}

/// Serve the output directory and run the live reload pipeline until Ctrl+C.
pub fn serve(config: ReloadConfig) -> Result<()> {
    config
        .build_request()
        .context("no package to build; pass one to `serve` or set [build] package")?;
    std::fs::create_dir_all(&config.build.output)
        .with_context(|| format!("Failed to create {}", config.build.output.display()))?;

    let (server, addr) = lifecycle::bind_with_retry(config.serve.interface, config.serve.port)?;
    let server = Arc::new(server);

    let (shutdown_tx, shutdown_rx) = channel::unbounded::<()>();
    crate::core::register_server(Arc::clone(&server), shutdown_tx);

    log!("serve"; "http://{}", addr);
    debug!("serve"; "output: {}", config.build.output.display());

    let config = Arc::new(config);
    let factory: Arc<dyn BuilderFactory> =
        Arc::new(CommandFactory::new(config.build.command.clone()));
    let actor_handle = lifecycle::spawn_actors(Arc::clone(&config), factory, shutdown_rx);

    run_request_loop(&server, &config.build.output, addr)?;
    lifecycle::wait_for_shutdown(actor_handle, config.shutdown_grace());
    Ok(())
}

fn run_request_loop(server: &Server, output: &Path, addr: SocketAddr) -> Result<()> {
    // Slow clients must not hold up other requests
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(REQUEST_THREADS)
        .thread_name(|i| format!("http-{i}"))
        .build()
        .context("failed to create request thread pool")?;

    let output = Arc::new(output.to_path_buf());
    for request in server.incoming_requests() {
        let output = Arc::clone(&output);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &output, addr) {
                log!("serve"; "request error: {e}");
            }
        });
    }
    Ok(())
}

/// Handle a single HTTP request
fn handle_request(request: Request, output: &Path, addr: SocketAddr) -> Result<()> {
    if crate::core::is_shutdown() {
        return response::respond_unavailable(request);
    }

    let ws = match actual_ws_port() {
        0 => None,
        port => {
            let host = request
                .headers()
                .iter()
                .find(|h| h.field.equiv("Host"))
                .map(|h| h.value.as_str());
            Some(reload_endpoint(host, addr, port))
        }
    };

    match path::resolve_path(request.url(), output) {
        Some(file) => response::respond_file(request, &file, ws.as_deref()),
        None => response::respond_not_found(request, output, ws.as_deref()),
    }
}

/// Reload socket URL as the browser should dial it.
///
/// Uses the host the browser asked for, so a server bound to `0.0.0.0` still
/// hands out a reachable address.
fn reload_endpoint(host_header: Option<&str>, addr: SocketAddr, ws_port: u16) -> String {
    match host_header.and_then(host_name) {
        Some(host) => format!("ws://{host}:{ws_port}"),
        None => {
            let ip = match addr.ip() {
                ip if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
                ip => ip,
            };
            format!("ws://{}", SocketAddr::new(ip, ws_port))
        }
    }
}

/// Host part of a `Host` header, without the port.
fn host_name(header: &str) -> Option<&str> {
    let header = header.trim();
    let host = match header.strip_prefix('[') {
        // [v6]:port
        Some(rest) => &header[..rest.find(']')? + 2],
        None => header.split(':').next()?,
    };
    let valid = !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '[' | ']'));
    valid.then_some(host)
}
