use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::clock::Clock;
use crate::errors::ContentError;
use crate::models::{ContentItem, NewContentItem};
use crate::patch::{Patch, changes_from_patches};
use crate::repositories::{ContentFilter, DocumentStore, FindOptions, PublishWindow, Sort, StoreError};

/// Lifecycle operations over persisted content: drafting within a collection,
/// approval through patches, and the publish-date views.
#[derive(Clone)]
pub struct ContentStore<S> {
    store: S,
    clock: Arc<dyn Clock>,
    query_timeout: Duration,
}

impl<S: DocumentStore> ContentStore<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>, query_timeout: Duration) -> Self {
        Self {
            store,
            clock,
            query_timeout,
        }
    }

    pub fn document_store(&self) -> &S {
        &self.store
    }

    fn now(&self) -> NaiveDateTime {
        self.clock.now().naive_utc()
    }

    /// Bounds a single store round-trip by the query timeout. Dropping the
    /// returned future abandons the wait.
    async fn run<T>(
        &self,
        op: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.query_timeout, op)
            .await
            .map_err(|_| StoreError::Timeout(self.query_timeout))?
    }

    async fn write(&self, item: &NewContentItem) -> Result<ContentItem, ContentError> {
        let record = item.clone().into_record(self.now());
        self.run(self.store.upsert_by_id(&record)).await?;
        Ok(record)
    }

    /// Inserts or fully replaces the item with this id. `last_updated` is only
    /// assigned on first insert.
    #[instrument(skip_all, fields(id = %item.id, url = %item.url))]
    pub async fn upsert_content(&self, item: &NewContentItem) -> Result<(), ContentError> {
        self.write(item).await?;
        debug!("Upserted content item");
        Ok(())
    }

    /// The unapproved item for `url`, whichever collection holds it.
    pub async fn find_in_progress(&self, url: &str) -> Result<Option<ContentItem>, ContentError> {
        let filter = ContentFilter::url(url).approved(false);
        Ok(self.run(self.store.find_one(&filter)).await?)
    }

    /// Adds a new draft, refusing if the url is already in progress in any
    /// collection.
    #[instrument(skip_all, fields(id = %item.id, url = %item.url, collection_id = ?item.collection_id))]
    pub async fn add_draft(&self, item: &NewContentItem) -> Result<ContentItem, ContentError> {
        if let Some(existing) = self.find_in_progress(&item.url).await? {
            warn!(
                existing_id = %existing.id,
                existing_collection_id = ?existing.collection_id,
                "Content for url is already in progress"
            );
            return Err(ContentError::AlreadyInProgress);
        }

        // A concurrent draft that slipped past the lookup is rejected by the
        // store's in-progress constraint and surfaces as AlreadyInProgress.
        let stored = self.write(item).await?;
        info!("Added draft content");
        Ok(stored)
    }

    /// The in-progress item for `url`, provided it belongs to `collection_id`.
    #[instrument(skip(self))]
    pub async fn get_in_progress_by_url(
        &self,
        url: &str,
        collection_id: &str,
    ) -> Result<ContentItem, ContentError> {
        match self.find_in_progress(url).await? {
            None => Err(ContentError::NotFound),
            Some(item) if item.collection_id.as_deref() == Some(collection_id) => Ok(item),
            Some(item) => {
                debug!(
                    other_collection_id = ?item.collection_id,
                    "Content is in progress in another collection"
                );
                Err(ContentError::InProgressInOtherCollection)
            }
        }
    }

    /// Applies the whitelisted fields of `patches` to the in-progress item for
    /// `url` in `collection_id`, in a single write.
    #[instrument(skip(self, patches), fields(patch_count = patches.len()))]
    pub async fn patch_content(
        &self,
        url: &str,
        collection_id: &str,
        patches: &[Patch],
    ) -> Result<(), ContentError> {
        let changes = changes_from_patches(patches)?;
        let filter = ContentFilter::url(url)
            .in_collection(collection_id)
            .approved(false);

        if changes.is_empty() {
            // Nothing to write, but the target must still exist.
            return match self.run(self.store.find_one(&filter)).await? {
                Some(_) => {
                    debug!("No mutable fields in patch set");
                    Ok(())
                }
                None => Err(ContentError::NotFound),
            };
        }

        let changes = changes.touched(self.now());
        let updated = self.run(self.store.update_where(&filter, &changes)).await?;
        if updated == 0 {
            debug!("No in-progress content matched patch target");
            return Err(ContentError::NotFound);
        }

        info!(updated, "Patched content");
        Ok(())
    }

    /// Fails when the document store cannot answer a query within the
    /// query timeout.
    pub async fn check_health(&self) -> Result<(), ContentError> {
        self.run(self.store.ping()).await?;
        Ok(())
    }

    /// The approved item for `url` with the latest publish date at or before now.
    #[instrument(skip(self))]
    pub async fn get_published_by_url(&self, url: &str) -> Result<ContentItem, ContentError> {
        let filter = ContentFilter::url(url)
            .approved(true)
            .published(PublishWindow::AtOrBefore(self.now()));
        let options = FindOptions {
            sort: Some(Sort::PublishDateDescending),
            limit: Some(1),
        };

        self.run(self.store.find_many(&filter, &options))
            .await?
            .into_iter()
            .next()
            .ok_or(ContentError::NotFound)
    }

    /// The pending publish date for `url`, if one is scheduled.
    ///
    /// More than one approved item scheduled after now is an integrity
    /// violation and is reported rather than resolved.
    #[instrument(skip(self))]
    pub async fn get_next_publish_date(
        &self,
        url: &str,
    ) -> Result<Option<DateTime<Utc>>, ContentError> {
        let filter = ContentFilter::url(url)
            .approved(true)
            .published(PublishWindow::After(self.now()));
        let options = FindOptions {
            sort: Some(Sort::PublishDateAscending),
            limit: None,
        };

        let scheduled = self.run(self.store.find_many(&filter, &options)).await?;
        match scheduled.as_slice() {
            [] => Ok(None),
            [next] => Ok(next.publish_date.map(|date| date.and_utc())),
            _ => {
                warn!(count = scheduled.len(), "Multiple scheduled publish dates");
                Err(ContentError::IntegrityViolation {
                    url: url.to_string(),
                    count: scheduled.len(),
                })
            }
        }
    }
}
