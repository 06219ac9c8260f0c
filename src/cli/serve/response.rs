//! HTTP response handlers.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tiny_http::{Header, Method, Request, Response, StatusCode};

use super::content::maybe_inject_endpoint;
use super::mime::{self, types};

/// Respond with a static file, injecting the reload endpoint into HTML.
pub fn respond_file(request: Request, path: &Path, ws_url: Option<&str>) -> Result<()> {
    let content_type = mime::from_path(path);

    if is_head_request(&request) {
        return send_head(request, 200, content_type);
    }

    let body = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let body = maybe_inject_endpoint(body, content_type, ws_url);
    send_body(request, 200, content_type, body)
}

/// Respond with 404 page (the catalog's own `404.html` if it has one).
pub fn respond_not_found(request: Request, output: &Path, ws_url: Option<&str>) -> Result<()> {
    let custom_404 = output.join("404.html");
    let has_custom = custom_404.is_file();

    if is_head_request(&request) {
        let mime = if has_custom { types::HTML } else { types::PLAIN };
        return send_head(request, 404, mime);
    }

    if has_custom && let Ok(body) = fs::read(&custom_404) {
        let body = maybe_inject_endpoint(body, types::HTML, ws_url);
        return send_body(request, 404, types::HTML, body);
    }

    send_body(request, 404, types::PLAIN, b"404 Not Found".to_vec())
}

/// Respond with 503 Service Unavailable (server shutting down).
pub fn respond_unavailable(request: Request) -> Result<()> {
    send_body(request, 503, types::PLAIN, b"503 Service Unavailable".to_vec())
}

fn is_head_request(request: &Request) -> bool {
    request.method() == &Method::Head
}

fn send_head(request: Request, status: u16, content_type: &'static str) -> Result<()> {
    let response =
        Response::empty(StatusCode(status)).with_header(make_header("Content-Type", content_type)?);
    request.respond(response)?;
    Ok(())
}

fn send_body(request: Request, status: u16, content_type: &'static str, body: Vec<u8>) -> Result<()> {
    // Rebuilt files must never be served stale
    let response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(make_header("Content-Type", content_type)?)
        .with_header(make_header("Cache-Control", "no-store")?);
    request.respond(response)?;
    Ok(())
}

fn make_header(key: &'static str, value: &'static str) -> Result<Header> {
    Header::from_bytes(key, value).map_err(|()| anyhow!("invalid header {key}: {value}"))
}

#[cfg(test)]
mod tests {
    use super::super::path::resolve_path;
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tiny_http::Server;

    /// Serve exactly one request from `output` and return the raw response.
    fn roundtrip(output: &Path, raw_request: &str) -> String {
        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let port = server.server_addr().to_ip().unwrap().port();

        let handle = std::thread::spawn({
            let server = Arc::clone(&server);
            let output = output.to_path_buf();
            move || {
                let request = server.recv().unwrap();
                let ws = Some("ws://127.0.0.1:35729");
                match resolve_path(request.url(), &output) {
                    Some(file) => respond_file(request, &file, ws).unwrap(),
                    None => respond_not_found(request, &output, ws).unwrap(),
                }
            }
        });

        let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
        stream.write_all(raw_request.as_bytes()).unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        handle.join().unwrap();
        response
    }

    fn get(path: &str) -> String {
        format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
    }

    #[test]
    fn test_html_gets_endpoint() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("index.html"), "<body>hi</body>").unwrap();

        let response = roundtrip(temp.path(), &get("/"));
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("text/html"));
        assert!(response.contains("STORYRELOAD_WS"));
    }

    #[test]
    fn test_css_untouched() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("static")).unwrap();
        std::fs::write(temp.path().join("static/main.css"), "p{}").unwrap();

        let response = roundtrip(temp.path(), &get("/static/main.css"));
        assert!(response.contains("text/css"));
        assert!(response.ends_with("p{}"));
    }

    #[test]
    fn test_not_found() {
        let temp = TempDir::new().unwrap();
        let response = roundtrip(temp.path(), &get("/missing.html"));
        assert!(response.starts_with("HTTP/1.1 404"));
        assert!(response.ends_with("404 Not Found"));
    }
}
