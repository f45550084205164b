use std::sync::{Arc, Mutex};

use diesel::sqlite::SqliteConnection;

pub mod clock;
pub mod config;
pub mod content_store;
pub mod errors;
pub mod ids;
pub mod models;
pub mod patch;
pub mod repositories;
pub mod routes;
pub mod schema;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
pub mod validation;

use clock::SystemClock;
use config::Config;
use content_store::ContentStore;
use ids::{IdGenerator, UuidGenerator};
use repositories::{DocumentStore, SqliteDocumentStore};

pub trait AppState: Clone + Send + Sync + 'static {
    type Store: DocumentStore;

    fn content_store(&self) -> &ContentStore<Self::Store>;
    fn id_generator(&self) -> &dyn IdGenerator;
}

#[derive(Clone)]
pub struct ServiceState<S> {
    content: ContentStore<S>,
    ids: Arc<dyn IdGenerator>,
}

impl<S: DocumentStore> ServiceState<S> {
    pub fn new(content: ContentStore<S>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { content, ids }
    }
}

impl<S: DocumentStore> AppState for ServiceState<S> {
    type Store = S;

    fn content_store(&self) -> &ContentStore<S> {
        &self.content
    }

    fn id_generator(&self) -> &dyn IdGenerator {
        self.ids.as_ref()
    }
}

pub type DefaultAppState = ServiceState<SqliteDocumentStore>;

impl DefaultAppState {
    /// Production wiring: SQLite storage, the system clock and random ids.
    pub fn from_connection(db: Arc<Mutex<SqliteConnection>>, config: &Config) -> Self {
        let content = ContentStore::new(
            SqliteDocumentStore::new(db),
            Arc::new(SystemClock),
            config.query_timeout,
        );
        Self::new(content, Arc::new(UuidGenerator))
    }
}
