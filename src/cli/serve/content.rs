//! Reload endpoint injection for served HTML.
//!
//! The built catalog ships its own reload client; it only needs to know
//! where the reload socket lives, since it is not on the HTTP port.

/// Global the client reads the socket address from.
pub const WS_GLOBAL: &str = "STORYRELOAD_WS";

/// Inject the reload endpoint if content is HTML and the socket is up
pub fn maybe_inject_endpoint(body: Vec<u8>, content_type: &str, ws_url: Option<&str>) -> Vec<u8> {
    match (content_type.starts_with("text/html"), ws_url) {
        (true, Some(url)) => inject_before_body_end(&body, &endpoint_script(url)),
        _ => body,
    }
}

fn endpoint_script(ws_url: &str) -> String {
    // serde_json escapes quotes and `</` cannot appear in a ws:// URL we build
    let url = serde_json::to_string(ws_url).unwrap_or_else(|_| "null".into());
    format!("<script>window.{WS_GLOBAL}={url};</script>")
}

/// Insert `snippet` before the last `</body>`, or append if there is none
fn inject_before_body_end(content: &[u8], snippet: &str) -> Vec<u8> {
    const PATTERN: &[u8] = b"</body>";

    let snippet = snippet.as_bytes();
    let mut result = Vec::with_capacity(content.len() + snippet.len());

    match content
        .windows(PATTERN.len())
        .rposition(|w| w.eq_ignore_ascii_case(PATTERN))
    {
        Some(pos) => {
            result.extend_from_slice(&content[..pos]);
            result.extend_from_slice(snippet);
            result.extend_from_slice(&content[pos..]);
        }
        // Browsers handle trailing scripts fine
        None => {
            result.extend_from_slice(content);
            result.extend_from_slice(snippet);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::serve::mime::types::{CSS, HTML};

    const WS: Option<&str> = Some("ws://127.0.0.1:35729");

    #[test]
    fn test_injects_before_body_end() {
        let out = maybe_inject_endpoint(b"<html><BODY>x</BODY></html>".to_vec(), HTML, WS);
        let out = String::from_utf8(out).unwrap();
        assert_eq!(
            out,
            "<html><BODY>x<script>window.STORYRELOAD_WS=\"ws://127.0.0.1:35729\";</script></BODY></html>"
        );
    }

    #[test]
    fn test_appends_without_body() {
        let out = maybe_inject_endpoint(b"<p>frag</p>".to_vec(), HTML, WS);
        assert!(String::from_utf8(out).unwrap().ends_with("</script>"));
    }

    #[test]
    fn test_leaves_other_content_alone() {
        let css = b"body{color:red}".to_vec();
        assert_eq!(maybe_inject_endpoint(css.clone(), CSS, WS), css);

        let html = b"<body></body>".to_vec();
        assert_eq!(maybe_inject_endpoint(html.clone(), HTML, None), html);
    }
}
