use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::traits::{ContentFilter, DocumentStore, FindOptions, Sort, StoreError};
use crate::models::{ContentChanges, ContentItem};

/// Process-local document store with the same constraint semantics as the
/// SQLite store. Used by tests and local experiments.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    items: Arc<RwLock<BTreeMap<String, ContentItem>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Connection("in-memory store lock poisoned".to_string())
}

/// The in-progress url constraint: no other unapproved item may share the url.
fn conflicts(items: &BTreeMap<String, ContentItem>, candidate: &ContentItem) -> bool {
    !candidate.approved
        && items.values().any(|existing| {
            existing.id != candidate.id && !existing.approved && existing.url == candidate.url
        })
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn upsert_by_id(&self, item: &ContentItem) -> Result<(), StoreError> {
        let mut items = self.items.write().map_err(poisoned)?;

        if conflicts(&items, item) {
            return Err(StoreError::UniqueViolation);
        }

        let mut record = item.clone();
        if let Some(existing) = items.get(&item.id) {
            record.last_updated = existing.last_updated;
        }
        items.insert(record.id.clone(), record);
        Ok(())
    }

    async fn find_one(&self, filter: &ContentFilter) -> Result<Option<ContentItem>, StoreError> {
        let items = self.items.read().map_err(poisoned)?;
        Ok(items.values().find(|item| filter.matches(item)).cloned())
    }

    async fn find_many(
        &self,
        filter: &ContentFilter,
        options: &FindOptions,
    ) -> Result<Vec<ContentItem>, StoreError> {
        let items = self.items.read().map_err(poisoned)?;
        let mut found: Vec<ContentItem> = items
            .values()
            .filter(|item| filter.matches(item))
            .cloned()
            .collect();

        // Missing publish dates sort first ascending and last descending,
        // matching SQLite's NULL ordering.
        match options.sort {
            Some(Sort::PublishDateAscending) => found.sort_by_key(|item| item.publish_date),
            Some(Sort::PublishDateDescending) => {
                found.sort_by(|a, b| b.publish_date.cmp(&a.publish_date))
            }
            None => {}
        }
        if let Some(limit) = options.limit {
            found.truncate(limit as usize);
        }

        Ok(found)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.items.read().map(|_| ()).map_err(poisoned)
    }

    async fn update_where(
        &self,
        filter: &ContentFilter,
        changes: &ContentChanges,
    ) -> Result<usize, StoreError> {
        let mut items = self.items.write().map_err(poisoned)?;

        let mut updated: Vec<ContentItem> = items
            .values()
            .filter(|item| filter.matches(item))
            .cloned()
            .collect();
        for item in &mut updated {
            changes.apply_to(item);
        }

        let mut next = items.clone();
        for item in &updated {
            next.insert(item.id.clone(), item.clone());
        }
        if updated.iter().any(|item| conflicts(&next, item)) {
            return Err(StoreError::UniqueViolation);
        }

        *items = next;
        Ok(updated.len())
    }
}
