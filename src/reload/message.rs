//! Live Reload Message Protocol
//!
//! JSON text frames exchanged over the reload WebSocket.
//!
//! # Server → client
//!
//! Every frame has `"type": "reload"` and a `change_type` naming the strategy:
//!
//! - `morph_html`: replace one story's markup in place (`story_id`, `html`)
//! - `iframe_reload`: reload the story iframe, keep the surrounding shell
//! - `full_reload`: reload the whole page
//!
//! Fields irrelevant to a variant are omitted, never sent as `null`.
//!
//! # Client → server
//!
//! - `page_info`: the page a tab is currently showing

use serde::{Deserialize, Serialize};

/// Reload strategy sent to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change_type", rename_all = "snake_case")]
pub enum ReloadMessage {
    /// Patch a single story's DOM with freshly rendered HTML.
    MorphHtml { story_id: String, html: String },
    /// Reload the story iframe only.
    IframeReload,
    /// Reload the entire page.
    FullReload,
}

/// Top-level server frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Reload(ReloadMessage),
}

impl ReloadMessage {
    pub fn morph(story_id: impl Into<String>, html: impl Into<String>) -> Self {
        Self::MorphHtml {
            story_id: story_id.into(),
            html: html.into(),
        }
    }

    pub fn change_type(&self) -> &'static str {
        match self {
            Self::MorphHtml { .. } => "morph_html",
            Self::IframeReload => "iframe_reload",
            Self::FullReload => "full_reload",
        }
    }

    /// Serialize as a complete server frame.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&ServerMessage::Reload(self.clone()))
            .unwrap_or_else(|_| r#"{"type":"reload","change_type":"full_reload"}"#.to_string())
    }

    /// Parse a server frame.
    pub fn from_json(s: &str) -> Option<Self> {
        match serde_json::from_str(s).ok()? {
            ServerMessage::Reload(msg) => Some(msg),
        }
    }
}

/// Client frame.
///
/// `page_type` is kept as a raw string so unknown values can fall back to
/// URL inference instead of rejecting the whole message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    PageInfo {
        #[serde(default)]
        page_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        page_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        story_id: Option<String>,
    },
}

impl ClientMessage {
    pub fn from_json(s: &str) -> Option<Self> {
        serde_json::from_str(s).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn as_value(msg: &ReloadMessage) -> Value {
        serde_json::from_str(&msg.to_json()).unwrap()
    }

    #[test]
    fn test_morph_html_wire_shape() {
        let msg = ReloadMessage::morph("components/heading/story-0", "<h1>Hi</h1>");
        let value = as_value(&msg);

        assert_eq!(value["type"], "reload");
        assert_eq!(value["change_type"], "morph_html");
        assert_eq!(value["story_id"], "components/heading/story-0");
        assert_eq!(value["html"], "<h1>Hi</h1>");
        assert_eq!(value.as_object().unwrap().len(), 4);
    }

    #[test]
    fn test_iframe_and_full_reload_omit_story_fields() {
        for msg in [ReloadMessage::IframeReload, ReloadMessage::FullReload] {
            let value = as_value(&msg);
            let obj = value.as_object().unwrap();
            assert_eq!(obj.len(), 2, "unexpected fields in {value}");
            assert_eq!(value["type"], "reload");
            assert_eq!(value["change_type"], msg.change_type());
            assert!(!obj.contains_key("story_id"));
            assert!(!obj.contains_key("html"));
        }
    }

    #[test]
    fn test_parse_preserves_fields() {
        let msg = ReloadMessage::morph("ui/buttons/story-2", "<button>ok</button>");
        assert_eq!(ReloadMessage::from_json(&msg.to_json()), Some(msg));
        assert_eq!(
            ReloadMessage::from_json(r#"{"type":"reload","change_type":"iframe_reload"}"#),
            Some(ReloadMessage::IframeReload)
        );
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(ReloadMessage::from_json(r#"{"type":"reload","change_type":"css"}"#).is_none());
        assert!(ReloadMessage::from_json(r#"{"type":"patch"}"#).is_none());
        assert!(ReloadMessage::from_json("not json").is_none());
    }

    #[test]
    fn test_client_page_info() {
        let msg = ClientMessage::from_json(
            r#"{"type":"page_info","page_url":"/a/story-0/index.html","page_type":"story","story_id":"a/story-0"}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::PageInfo {
                page_url: "/a/story-0/index.html".into(),
                page_type: Some("story".into()),
                story_id: Some("a/story-0".into()),
            }
        );
    }

    #[test]
    fn test_client_page_info_null_and_missing() {
        let msg =
            ClientMessage::from_json(r#"{"type":"page_info","page_url":"/docs/","story_id":null}"#)
                .unwrap();
        let ClientMessage::PageInfo {
            page_type,
            story_id,
            ..
        } = msg;
        assert!(page_type.is_none());
        assert!(story_id.is_none());

        assert!(ClientMessage::from_json(r#"{"type":"hello"}"#).is_none());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn reload_message() -> impl Strategy<Value = ReloadMessage> {
            prop_oneof![
                (any::<String>(), any::<String>()).prop_map(|(id, html)| ReloadMessage::morph(id, html)),
                Just(ReloadMessage::IframeReload),
                Just(ReloadMessage::FullReload),
            ]
        }

        proptest! {
            #[test]
            fn wire_round_trip(msg in reload_message()) {
                prop_assert_eq!(ReloadMessage::from_json(&msg.to_json()), Some(msg));
            }

            #[test]
            fn wire_has_only_variant_fields(msg in reload_message()) {
                let value = as_value(&msg);
                let expected = match &msg {
                    ReloadMessage::MorphHtml { .. } => 4,
                    _ => 2,
                };
                prop_assert_eq!(value.as_object().unwrap().len(), expected);
                prop_assert_eq!(&value["change_type"], msg.change_type());
            }
        }
    }
}

