//! User feedback intake
//!
//! Bug reports and suggestions posted from the app, each kept as its own
//! record in a [`CacheStore`] with an id index alongside.

use crate::cache::{CacheStore, Clock, SystemClock};
use crate::config::FeedbackSettings;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info};

const INDEX_KEY: &str = "feedback_ids";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeedbackError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("screenshot is {size} bytes, limit is {max}")]
    ScreenshotTooLarge { size: usize, max: usize },
    #[error("feedback could not be stored")]
    NotStored,
}

/// Feedback as submitted
#[derive(Debug, Clone, Deserialize)]
pub struct NewFeedback {
    /// "bug", "request", ... free text
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub details: String,
    /// Data URL of a screenshot
    #[serde(default)]
    pub screenshot: Option<String>,
}

impl NewFeedback {
    pub fn new(kind: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            details: details.into(),
            screenshot: None,
        }
    }

    pub fn with_screenshot(mut self, screenshot: impl Into<String>) -> Self {
        self.screenshot = Some(screenshot.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub details: String,
    #[serde(default)]
    pub screenshot: Option<String>,
    /// Epoch milliseconds
    pub created_at: i64,
}

pub struct FeedbackInbox {
    store: Arc<CacheStore>,
    clock: Arc<dyn Clock>,
    retention: Duration,
    max_screenshot_bytes: usize,
    write_lock: Mutex<()>,
}

impl FeedbackInbox {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self::with_settings(store, &FeedbackSettings::default())
    }

    pub fn with_settings(store: Arc<CacheStore>, settings: &FeedbackSettings) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            retention: settings.retention(),
            max_screenshot_bytes: settings.max_screenshot_bytes,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        Self { clock, ..self }
    }

    /// Validate and store a submission, returning the stored record
    pub async fn submit(&self, feedback: NewFeedback) -> Result<Feedback, FeedbackError> {
        if feedback.kind.trim().is_empty() {
            return Err(FeedbackError::MissingField("type"));
        }
        if feedback.details.trim().is_empty() {
            return Err(FeedbackError::MissingField("details"));
        }
        let screenshot = feedback.screenshot.filter(|s| !s.trim().is_empty());
        if let Some(size) = screenshot.as_ref().map(String::len) {
            if size > self.max_screenshot_bytes {
                return Err(FeedbackError::ScreenshotTooLarge {
                    size,
                    max: self.max_screenshot_bytes,
                });
            }
        }

        let _guard = self.write_lock.lock().await;
        let created_at = self.clock.now_ms();
        let mut ids = self.ids().await;

        let mut id = format!("fb-{}", created_at);
        let mut n = 1;
        while ids.contains(&id) {
            id = format!("fb-{}-{}", created_at, n);
            n += 1;
        }

        let record = Feedback {
            id,
            kind: feedback.kind.trim().to_string(),
            details: feedback.details,
            screenshot,
            created_at,
        };
        let key = record_key(&record.id);
        self.store.set(&key, &record, self.retention).await;
        if !self.store.contains(&key).await {
            error!("Feedback {} was dropped by the store", record.id);
            return Err(FeedbackError::NotStored);
        }

        ids.push(record.id.clone());
        self.store.set(INDEX_KEY, &ids, self.retention).await;
        info!("Feedback saved with id {}", record.id);
        Ok(record)
    }

    pub async fn get(&self, id: &str) -> Option<Feedback> {
        self.store.get(&record_key(id)).await
    }

    /// Stored feedback, newest first. Records the store has since
    /// evicted are skipped.
    pub async fn list(&self) -> Vec<Feedback> {
        let mut items = Vec::new();
        for id in self.ids().await.iter().rev() {
            if let Some(item) = self.get(id).await {
                items.push(item);
            }
        }
        items
    }

    async fn ids(&self) -> Vec<String> {
        self.store.get(INDEX_KEY).await.unwrap_or_default()
    }
}

fn record_key(id: &str) -> String {
    format!("feedback:{}", id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheLimits, ManualClock, MemoryMedium};
    use tokio_test::assert_ok;

    async fn open_inbox(limits: CacheLimits) -> (FeedbackInbox, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let store = CacheStore::open("feedback", Arc::new(MemoryMedium::new()), limits, clock.clone())
            .await
            .unwrap();
        (FeedbackInbox::new(Arc::new(store)).with_clock(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_submit_and_list() {
        let (inbox, clock) = open_inbox(CacheLimits::default()).await;

        let first = assert_ok!(inbox.submit(NewFeedback::new("bug", "map does not load")).await);
        let second = assert_ok!(
            inbox
                .submit(NewFeedback::new("bug", "same millisecond").with_screenshot("data:image/png;base64,AA"))
                .await
        );
        clock.advance(Duration::from_secs(1));
        let third = assert_ok!(inbox.submit(NewFeedback::new("request", "dark mode")).await);

        assert_ne!(first.id, second.id);
        assert_eq!(inbox.get(&second.id).await, Some(second.clone()));

        let ids: Vec<_> = inbox.list().await.into_iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);
    }

    #[tokio::test]
    async fn test_type_and_details_required() {
        let (inbox, _) = open_inbox(CacheLimits::default()).await;

        assert_eq!(
            inbox.submit(NewFeedback::new("", "details")).await,
            Err(FeedbackError::MissingField("type"))
        );
        assert_eq!(
            inbox.submit(NewFeedback::new("bug", "  ")).await,
            Err(FeedbackError::MissingField("details"))
        );
        assert!(inbox.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_screenshot_limits() {
        let (inbox, _) = open_inbox(CacheLimits::default()).await;
        let huge = "x".repeat(FeedbackSettings::default().max_screenshot_bytes + 1);
        assert!(matches!(
            inbox.submit(NewFeedback::new("bug", "big").with_screenshot(huge)).await,
            Err(FeedbackError::ScreenshotTooLarge { .. })
        ));

        // Within the screenshot limit but above the store ceiling
        let tight = CacheLimits {
            max_bytes: 1024,
            ..Default::default()
        };
        let (inbox, _) = open_inbox(tight).await;
        let err = inbox
            .submit(NewFeedback::new("bug", "big").with_screenshot("y".repeat(4096)))
            .await
            .unwrap_err();
        assert_eq!(err, FeedbackError::NotStored);
        assert!(inbox.list().await.is_empty());
    }
}
