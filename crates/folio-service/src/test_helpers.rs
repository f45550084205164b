use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::ServiceState;
use crate::clock::FixedClock;
use crate::content_store::ContentStore;
use crate::ids::{IdError, IdGenerator};
use crate::repositories::sqlite::run_migrations;
use crate::repositories::{InMemoryDocumentStore, SqliteDocumentStore};

pub fn establish_test_connection() -> SqliteConnection {
    let mut connection =
        SqliteConnection::establish(":memory:").expect("Failed to create in-memory database");

    run_migrations(&mut connection).expect("Failed to run migrations");

    connection
}

/// Deterministic ids: `id-1`, `id-2`, ...
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: AtomicUsize,
}

impl IdGenerator for SequentialIds {
    fn new_id(&self) -> Result<String, IdError> {
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("id-{n}"))
    }
}

/// An id generator whose randomness source is always broken.
#[derive(Debug, Default)]
pub struct FailingIds;

impl IdGenerator for FailingIds {
    fn new_id(&self) -> Result<String, IdError> {
        Err(IdError(rand::Error::new(std::io::Error::other(
            "entropy source unavailable",
        ))))
    }
}

/// The instant test clocks start at.
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub fn memory_state() -> (ServiceState<InMemoryDocumentStore>, FixedClock) {
    let clock = FixedClock::new(test_now());
    let content = ContentStore::new(
        InMemoryDocumentStore::new(),
        Arc::new(clock.clone()),
        Duration::from_secs(5),
    );
    let state = ServiceState::new(content, Arc::new(SequentialIds::default()));
    (state, clock)
}

pub fn sqlite_state() -> (
    ServiceState<SqliteDocumentStore>,
    Arc<Mutex<SqliteConnection>>,
    FixedClock,
) {
    let db = Arc::new(Mutex::new(establish_test_connection()));
    let clock = FixedClock::new(test_now());
    let content = ContentStore::new(
        SqliteDocumentStore::new(db.clone()),
        Arc::new(clock.clone()),
        Duration::from_secs(5),
    );
    let state = ServiceState::new(content, Arc::new(SequentialIds::default()));
    (state, db, clock)
}

pub mod test_utils {
    use super::*;
    use crate::models::ContentItem;
    use crate::schema::content_items;

    pub fn count_content_items(conn: &mut SqliteConnection) -> i64 {
        content_items::table
            .count()
            .get_result(conn)
            .expect("Failed to count content items")
    }

    pub fn get_content_items_by_url(conn: &mut SqliteConnection, url: &str) -> Vec<ContentItem> {
        content_items::table
            .filter(content_items::url.eq(url))
            .load::<ContentItem>(conn)
            .expect("Failed to query content items by URL")
    }

    pub fn insert_content_item(conn: &mut SqliteConnection, item: &ContentItem) {
        diesel::insert_into(content_items::table)
            .values(item)
            .execute(conn)
            .expect("Failed to insert content item");
    }
}
