use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sqlite::{Sqlite, SqliteConnection};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::debug;

use super::traits::{ContentFilter, DocumentStore, FindOptions, PublishWindow, Sort, StoreError};
use crate::models::{ContentChanges, ContentItem};
use crate::schema::content_items;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Brings the schema up to date, including the in-progress url index.
pub fn run_migrations(conn: &mut SqliteConnection) -> Result<(), StoreError> {
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|err| StoreError::Connection(format!("failed to run migrations: {err}")))?;
    Ok(())
}

impl From<DieselError> for StoreError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                StoreError::UniqueViolation
            }
            other => StoreError::Database(other),
        }
    }
}

#[derive(Clone)]
pub struct SqliteDocumentStore {
    db: Arc<Mutex<SqliteConnection>>,
}

impl SqliteDocumentStore {
    pub fn new(db: Arc<Mutex<SqliteConnection>>) -> Self {
        Self { db }
    }

    /// Runs a blocking diesel operation off the async executor.
    async fn with_connection<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T, StoreError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut conn = db
                .lock()
                .map_err(|_| StoreError::Connection("connection lock poisoned".to_string()))?;
            op(&mut *conn)
        })
        .await
        .map_err(|err| StoreError::Connection(format!("store task failed: {err}")))?
    }
}

fn filtered(filter: &ContentFilter) -> content_items::BoxedQuery<'static, Sqlite> {
    let mut query = content_items::table.into_boxed();

    if let Some(id) = &filter.id {
        query = query.filter(content_items::id.eq(id.clone()));
    }
    if let Some(url) = &filter.url {
        query = query.filter(content_items::url.eq(url.clone()));
    }
    if let Some(collection_id) = &filter.collection_id {
        query = query.filter(content_items::collection_id.eq(collection_id.clone()));
    }
    if let Some(approved) = filter.approved {
        query = query.filter(content_items::approved.eq(approved));
    }
    match filter.publish_window {
        Some(PublishWindow::AtOrBefore(limit)) => {
            query = query.filter(content_items::publish_date.le(limit));
        }
        Some(PublishWindow::After(limit)) => {
            query = query.filter(content_items::publish_date.gt(limit));
        }
        None => {}
    }

    query
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn upsert_by_id(&self, item: &ContentItem) -> Result<(), StoreError> {
        let item = item.clone();
        self.with_connection(move |conn| {
            diesel::insert_into(content_items::table)
                .values(&item)
                .on_conflict(content_items::id)
                .do_update()
                .set((
                    content_items::url.eq(&item.url),
                    content_items::collection_id.eq(item.collection_id.clone()),
                    content_items::content_type.eq(&item.content_type),
                    content_items::content.eq(&item.content),
                    content_items::approved.eq(item.approved),
                    content_items::publish_date.eq(item.publish_date),
                ))
                .execute(conn)?;
            debug!(id = %item.id, "upserted content item");
            Ok(())
        })
        .await
    }

    async fn find_one(&self, filter: &ContentFilter) -> Result<Option<ContentItem>, StoreError> {
        let query = filtered(filter);
        self.with_connection(move |conn| {
            let result = query.first::<ContentItem>(conn).optional()?;
            Ok(result)
        })
        .await
    }

    async fn find_many(
        &self,
        filter: &ContentFilter,
        options: &FindOptions,
    ) -> Result<Vec<ContentItem>, StoreError> {
        let mut query = filtered(filter);
        query = match options.sort {
            Some(Sort::PublishDateAscending) => query.order(content_items::publish_date.asc()),
            Some(Sort::PublishDateDescending) => query.order(content_items::publish_date.desc()),
            None => query,
        };
        if let Some(limit) = options.limit {
            query = query.limit(i64::from(limit));
        }

        self.with_connection(move |conn| {
            let result = query.load::<ContentItem>(conn)?;
            Ok(result)
        })
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.with_connection(|conn| {
            content_items::table
                .select(content_items::id)
                .first::<String>(conn)
                .optional()?;
            Ok(())
        })
        .await
    }

    async fn update_where(
        &self,
        filter: &ContentFilter,
        changes: &ContentChanges,
    ) -> Result<usize, StoreError> {
        let query = filtered(filter).select(content_items::id);
        let changes = changes.clone();
        self.with_connection(move |conn| {
            conn.immediate_transaction(|conn| {
                let ids = query.load::<String>(conn)?;
                if ids.is_empty() {
                    return Ok(0);
                }

                let updated = diesel::update(content_items::table)
                    .filter(content_items::id.eq_any(ids))
                    .set(&changes)
                    .execute(conn)?;
                Ok(updated)
            })
        })
        .await
    }
}
