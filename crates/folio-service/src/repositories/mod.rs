pub mod memory;
pub mod sqlite;
pub mod traits;

pub use memory::InMemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;
pub use traits::{ContentFilter, DocumentStore, FindOptions, PublishWindow, Sort, StoreError};
