use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;

use crate::models::{ContentChanges, ContentItem};

#[derive(Error, Debug)]
pub enum StoreError {
    /// A second in-progress item was written for a url that already has one.
    #[error("in-progress content already exists for this url")]
    UniqueViolation,

    #[error("database error: {0}")]
    Database(#[source] diesel::result::Error),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Bounds a query to items published at or before, or strictly after, an instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishWindow {
    AtOrBefore(NaiveDateTime),
    After(NaiveDateTime),
}

impl PublishWindow {
    fn contains(&self, publish_date: Option<NaiveDateTime>) -> bool {
        match (self, publish_date) {
            (PublishWindow::AtOrBefore(limit), Some(date)) => date <= *limit,
            (PublishWindow::After(limit), Some(date)) => date > *limit,
            (_, None) => false,
        }
    }
}

/// Equality filter over content items. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentFilter {
    pub id: Option<String>,
    pub url: Option<String>,
    pub collection_id: Option<String>,
    pub approved: Option<bool>,
    pub publish_window: Option<PublishWindow>,
}

impl ContentFilter {
    pub fn id(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            ..Default::default()
        }
    }

    pub fn url(url: &str) -> Self {
        Self {
            url: Some(url.to_string()),
            ..Default::default()
        }
    }

    pub fn in_collection(mut self, collection_id: &str) -> Self {
        self.collection_id = Some(collection_id.to_string());
        self
    }

    pub fn approved(mut self, approved: bool) -> Self {
        self.approved = Some(approved);
        self
    }

    pub fn published(mut self, window: PublishWindow) -> Self {
        self.publish_window = Some(window);
        self
    }

    pub fn matches(&self, item: &ContentItem) -> bool {
        self.id.as_ref().is_none_or(|id| *id == item.id)
            && self.url.as_ref().is_none_or(|url| *url == item.url)
            && self
                .collection_id
                .as_ref()
                .is_none_or(|collection_id| item.collection_id.as_ref() == Some(collection_id))
            && self.approved.is_none_or(|approved| approved == item.approved)
            && self
                .publish_window
                .is_none_or(|window| window.contains(item.publish_date))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sort {
    PublishDateAscending,
    PublishDateDescending,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub sort: Option<Sort>,
    pub limit: Option<u32>,
}

/// The document operations content lifecycle logic is built on.
///
/// Implementations must reject a write that would leave two unapproved items
/// with the same url with [`StoreError::UniqueViolation`].
#[async_trait]
pub trait DocumentStore: Clone + Send + Sync + 'static {
    /// Inserts the item, or replaces every field of the item with the same id
    /// except `last_updated`, which keeps its first-insert value.
    async fn upsert_by_id(&self, item: &ContentItem) -> Result<(), StoreError>;

    async fn find_one(&self, filter: &ContentFilter) -> Result<Option<ContentItem>, StoreError>;

    async fn find_many(
        &self,
        filter: &ContentFilter,
        options: &FindOptions,
    ) -> Result<Vec<ContentItem>, StoreError>;

    /// Confirms the backing store can serve content queries.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Applies `changes` to every matching item atomically and returns how
    /// many were updated.
    async fn update_where(
        &self,
        filter: &ContentFilter,
        changes: &ContentChanges,
    ) -> Result<usize, StoreError>;
}
