#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use diesel::sqlite::SqliteConnection;
use folio_service::clock::FixedClock;

pub use folio_service::test_helpers::{test_now, test_utils};

pub mod server_utils {
    use super::*;
    use axum_test::TestServer;
    use folio_service::{routes, test_helpers};

    pub fn create_test_server() -> (TestServer, Arc<Mutex<SqliteConnection>>, FixedClock) {
        let (state, db, clock) = test_helpers::sqlite_state();
        let app = routes::create_router().with_state(state);

        let server = TestServer::new(app).unwrap();
        (server, db, clock)
    }

    pub fn create_memory_test_server() -> (TestServer, FixedClock) {
        let (state, clock) = test_helpers::memory_state();
        let app = routes::create_router().with_state(state);

        let server = TestServer::new(app).unwrap();
        (server, clock)
    }
}
