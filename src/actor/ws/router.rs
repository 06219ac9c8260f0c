//! Broadcast Router
//!
//! Decides which connections get which reload strategy and sends it.
//!
//! | change          | message                  | recipients                   |
//! |-----------------|--------------------------|------------------------------|
//! | global asset    | `iframe_reload`          | every story page             |
//! | story (html ok) | `morph_html`             | pages showing that story     |
//! | story (no html) | `iframe_reload`          | every story page             |
//! | non-story       | `full_reload`            | every page that isn't a story|
//!
//! Connections that never reported a page receive nothing.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;

use super::registry::{Connection, ConnectionId, ConnectionRegistry};
use crate::builder::BuildResult;
use crate::reload::classify::Classification;
use crate::reload::content::ContentReader;
use crate::reload::message::ReloadMessage;
use crate::reload::page::PageMetadata;

pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// What one `route` call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteReport {
    /// `None` when nothing was broadcast (failed build)
    pub change_type: Option<&'static str>,
    /// Story HTML was unavailable, iframe reload used instead
    pub fell_back: bool,
    pub targeted: usize,
    pub delivered: usize,
    /// Connections removed after a failed or timed-out send
    pub dropped: Vec<ConnectionId>,
}

pub struct BroadcastRouter {
    registry: Arc<ConnectionRegistry>,
    reader: Arc<dyn ContentReader>,
    send_timeout: Duration,
}

impl BroadcastRouter {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        reader: Arc<dyn ContentReader>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            reader,
            send_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Broadcast the reload a successful build calls for.
    pub async fn route(&self, classification: &Classification, result: &BuildResult) -> RouteReport {
        if !result.ok {
            crate::debug!("route"; "build failed, not broadcasting {}", classification);
            return RouteReport::default();
        }

        let mut fell_back = false;
        let message = match classification {
            Classification::GlobalAsset => ReloadMessage::IframeReload,
            Classification::StorySpecific { story_id } => {
                match self.reader.read_story_html(story_id) {
                    Some(html) => ReloadMessage::morph(story_id.as_str(), html),
                    None => {
                        crate::log!("route"; "no html for {}, falling back to iframe reload", story_id);
                        fell_back = true;
                        ReloadMessage::IframeReload
                    }
                }
            }
            Classification::NonStory => ReloadMessage::FullReload,
        };

        let mut report = self.deliver(&message).await;
        report.fell_back = fell_back;
        report
    }

    /// Send `message` to every connection it targets, concurrently.
    pub async fn deliver(&self, message: &ReloadMessage) -> RouteReport {
        let targets: Vec<Connection> = self
            .registry
            .snapshot()
            .into_iter()
            .filter(|conn| is_target(message, conn.page.as_ref()))
            .collect();

        let json = message.to_json();
        let timeout = self.send_timeout;
        let sends = targets.iter().map(|conn| {
            let frame = json.clone();
            async move {
                let outcome = tokio::time::timeout(timeout, conn.outbox.send(frame)).await;
                (conn.id, outcome)
            }
        });

        let mut report = RouteReport {
            change_type: Some(message.change_type()),
            targeted: targets.len(),
            ..RouteReport::default()
        };

        for (id, outcome) in join_all(sends).await {
            match outcome {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(_)) => {
                    crate::debug!("route"; "{} closed, removing", id);
                    self.registry.unregister(id);
                    report.dropped.push(id);
                }
                Err(_) => {
                    crate::log!("route"; "{} send timed out after {:?}, removing", id, timeout);
                    self.registry.unregister(id);
                    report.dropped.push(id);
                }
            }
        }

        crate::debug!(
            "route";
            "{} to {}/{} connection(s)",
            message.change_type(),
            report.delivered,
            report.targeted
        );
        report
    }
}

/// Whether a page should receive `message`.
fn is_target(message: &ReloadMessage, page: Option<&PageMetadata>) -> bool {
    let Some(page) = page else {
        return false;
    };
    match message {
        ReloadMessage::MorphHtml { story_id, .. } => page.story_id() == Some(story_id.as_str()),
        ReloadMessage::IframeReload => page.is_story(),
        ReloadMessage::FullReload => !page.is_story(),
    }
}

/// Merge the classifications of one trigger into the broadcasts to make.
///
/// A global change already reloads every story, so individual stories are
/// absorbed. Distinct stories are kept in first-seen order; a non-story
/// change is routed once, last.
pub fn coalesce(classifications: impl IntoIterator<Item = Classification>) -> Vec<Classification> {
    let mut global = false;
    let mut non_story = false;
    let mut stories: Vec<Classification> = Vec::new();

    for classification in classifications {
        match classification {
            Classification::GlobalAsset => global = true,
            Classification::NonStory => non_story = true,
            story @ Classification::StorySpecific { .. } => {
                if !stories.contains(&story) {
                    stories.push(story);
                }
            }
        }
    }

    let mut plan = if global {
        vec![Classification::GlobalAsset]
    } else {
        stories
    };
    if non_story {
        plan.push(Classification::NonStory);
    }
    plan
}
