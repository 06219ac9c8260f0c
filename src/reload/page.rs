//! Page Metadata
//!
//! What a connected tab reports it is looking at. The story id exists only
//! on story pages, so it lives inside the `Story` variant.

use percent_encoding::percent_decode_str;

use super::classify::{INDEX_FILE, STORY_CONTAINER_FILE, is_story_segment};
use super::message::ClientMessage;

/// Kind of page a client is viewing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageType {
    Story,
    StoryContainer,
    NonStory,
}

impl PageType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "story" => Some(Self::Story),
            "story_container" => Some(Self::StoryContainer),
            "non_story" => Some(Self::NonStory),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Story => "story",
            Self::StoryContainer => "story_container",
            Self::NonStory => "non_story",
        }
    }

    /// Infer the page type from its URL.
    pub fn infer(url: &str) -> Self {
        let trimmed = url.split(['?', '#']).next().unwrap_or_default();
        let has_story_segment = trimmed.split('/').any(is_story_segment);
        let is_index = trimmed.ends_with(&format!("/{INDEX_FILE}")) || trimmed.ends_with('/');

        if has_story_segment && is_index {
            Self::Story
        } else if trimmed.contains(STORY_CONTAINER_FILE) {
            Self::StoryContainer
        } else {
            Self::NonStory
        }
    }
}

/// Page a connection currently reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageMetadata {
    Story { page_url: String, story_id: String },
    StoryContainer { page_url: String },
    NonStory { page_url: String },
}

impl PageMetadata {
    pub fn story(page_url: impl Into<String>, story_id: impl Into<String>) -> Self {
        Self::Story {
            page_url: page_url.into(),
            story_id: story_id.into(),
        }
    }

    pub fn non_story(page_url: impl Into<String>) -> Self {
        Self::NonStory {
            page_url: page_url.into(),
        }
    }

    pub fn container(page_url: impl Into<String>) -> Self {
        Self::StoryContainer {
            page_url: page_url.into(),
        }
    }

    /// Build metadata from a client report.
    ///
    /// Missing or unknown page types are inferred from the URL; a story page
    /// without an explicit id takes it from the URL. A story with no id at
    /// all degrades to a non-story page.
    pub fn from_report(page_url: &str, page_type: Option<&str>, story_id: Option<&str>) -> Self {
        let url = percent_decode_str(page_url).decode_utf8_lossy().into_owned();

        let page_type = page_type
            .filter(|s| !s.is_empty())
            .and_then(PageType::parse)
            .unwrap_or_else(|| PageType::infer(&url));

        match page_type {
            PageType::Story => {
                let story_id = story_id
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .or_else(|| story_id_from_url(&url));
                match story_id {
                    Some(story_id) => Self::Story {
                        page_url: url,
                        story_id,
                    },
                    None => Self::NonStory { page_url: url },
                }
            }
            PageType::StoryContainer => Self::StoryContainer { page_url: url },
            PageType::NonStory => Self::NonStory { page_url: url },
        }
    }

    pub fn from_client(msg: &ClientMessage) -> Self {
        match msg {
            ClientMessage::PageInfo {
                page_url,
                page_type,
                story_id,
            } => Self::from_report(page_url, page_type.as_deref(), story_id.as_deref()),
        }
    }

    pub fn page_type(&self) -> PageType {
        match self {
            Self::Story { .. } => PageType::Story,
            Self::StoryContainer { .. } => PageType::StoryContainer,
            Self::NonStory { .. } => PageType::NonStory,
        }
    }

    pub fn page_url(&self) -> &str {
        match self {
            Self::Story { page_url, .. }
            | Self::StoryContainer { page_url }
            | Self::NonStory { page_url } => page_url,
        }
    }

    pub fn story_id(&self) -> Option<&str> {
        match self {
            Self::Story { story_id, .. } => Some(story_id),
            _ => None,
        }
    }

    pub fn is_story(&self) -> bool {
        matches!(self, Self::Story { .. })
    }
}

/// Derive a story id from a page URL.
///
/// `/components/heading/story-0/index.html` → `components/heading/story-0`
fn story_id_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let path = path.strip_suffix(INDEX_FILE).unwrap_or(path);

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let story_idx = segments.iter().position(|s| is_story_segment(s))?;
    Some(segments[..=story_idx].join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_page_type() {
        assert_eq!(
            PageType::infer("/components/heading/story-0/index.html"),
            PageType::Story
        );
        assert_eq!(PageType::infer("/components/heading/story-0/"), PageType::Story);
        assert_eq!(
            PageType::infer("/components/heading/story-0/themed_story.html"),
            PageType::StoryContainer
        );
        assert_eq!(PageType::infer("/docs/index.html"), PageType::NonStory);
        assert_eq!(PageType::infer("/components/heading/"), PageType::NonStory);
        assert_eq!(PageType::infer(""), PageType::NonStory);
    }

    #[test]
    fn test_explicit_story_report() {
        let page = PageMetadata::from_report(
            "/components/heading/story-0/index.html",
            Some("story"),
            Some("components/heading/story-0"),
        );
        assert_eq!(
            page,
            PageMetadata::story(
                "/components/heading/story-0/index.html",
                "components/heading/story-0"
            )
        );
        assert!(page.is_story());
    }

    #[test]
    fn test_story_id_derived_from_url() {
        let page = PageMetadata::from_report("/ui/buttons/story-2/index.html", None, None);
        assert_eq!(page.page_type(), PageType::Story);
        assert_eq!(page.story_id(), Some("ui/buttons/story-2"));

        let page = PageMetadata::from_report("/ui/buttons/story-2/", Some("story"), None);
        assert_eq!(page.story_id(), Some("ui/buttons/story-2"));
    }

    #[test]
    fn test_unknown_page_type_falls_back_to_inference() {
        let page = PageMetadata::from_report("/docs/guide.html", Some("dashboard"), None);
        assert_eq!(page.page_type(), PageType::NonStory);

        let page = PageMetadata::from_report("/a/story-3/index.html", Some(""), None);
        assert_eq!(page.story_id(), Some("a/story-3"));
    }

    #[test]
    fn test_story_without_id_degrades() {
        let page = PageMetadata::from_report("/docs/intro.html", Some("story"), None);
        assert_eq!(page, PageMetadata::non_story("/docs/intro.html"));
        assert_eq!(page.story_id(), None);
    }

    #[test]
    fn test_non_story_ignores_story_id() {
        let page = PageMetadata::from_report("/docs/", Some("non_story"), Some("a/story-1"));
        assert_eq!(page.story_id(), None);
        assert_eq!(page.page_url(), "/docs/");
    }

    #[test]
    fn test_url_is_percent_decoded() {
        let page = PageMetadata::from_report("/my%20section/story-1/index.html", None, None);
        assert_eq!(page.page_url(), "/my section/story-1/index.html");
        assert_eq!(page.story_id(), Some("my section/story-1"));
    }

    #[test]
    fn test_query_string_ignored() {
        let page = PageMetadata::from_report("/a/b/story-4/index.html?theme=dark", None, None);
        assert_eq!(page.story_id(), Some("a/b/story-4"));
    }

    #[test]
    fn test_from_client_message() {
        let msg = ClientMessage::PageInfo {
            page_url: "/x/story-9/themed_story.html".into(),
            page_type: None,
            story_id: None,
        };
        assert_eq!(
            PageMetadata::from_client(&msg),
            PageMetadata::container("/x/story-9/themed_story.html")
        );
    }
}
