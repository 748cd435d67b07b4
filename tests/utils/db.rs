/// Database test utilities with singleton pattern
///
/// Postgres-backed tests only run when TEST_DATABASE_URL is set; otherwise
/// `test_database()` returns `None` and the test returns early.
use diesel::prelude::*;
use enhance_queue::shared::Database;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

static TEST_DB: OnceLock<Option<Arc<Database>>> = OnceLock::new();

/// Shared, migrated database for the whole test binary
pub fn test_database() -> Option<Arc<Database>> {
    TEST_DB
        .get_or_init(|| {
            dotenvy::dotenv().ok();
            let url = std::env::var("TEST_DATABASE_URL").ok()?;

            let database = Database::new(&url).expect("Failed to create test database pool");
            database
                .run_migrations()
                .expect("Failed to run migrations on test database");
            Some(Arc::new(database))
        })
        .clone()
}

/// Clean all test tables - use at the start of each test
pub fn clean_test_db(database: &Database) {
    let mut conn = database
        .get_connection()
        .expect("Failed to get DB connection");

    diesel::sql_query("TRUNCATE TABLE image_processing_queue RESTART IDENTITY CASCADE")
        .execute(&mut conn)
        .expect("Failed to clean image_processing_queue");

    diesel::sql_query("TRUNCATE TABLE articles RESTART IDENTITY CASCADE")
        .execute(&mut conn)
        .expect("Failed to clean articles");
}

/// Move a queue row's timestamps into the past
pub fn backdate_queue_item(database: &Database, id: i64, days: i32) {
    let mut conn = database
        .get_connection()
        .expect("Failed to get DB connection");

    diesel::sql_query(
        "UPDATE image_processing_queue
         SET enqueued_at = enqueued_at - INTERVAL '1 day' * $2,
             started_at = started_at - INTERVAL '1 day' * $2,
             completed_at = completed_at - INTERVAL '1 day' * $2
         WHERE id = $1",
    )
    .bind::<diesel::sql_types::BigInt, _>(id)
    .bind::<diesel::sql_types::Integer, _>(days)
    .execute(&mut conn)
    .expect("Failed to backdate queue item");
}

/// Global test mutex for serialization
static TEST_LOCK: Mutex<()> = Mutex::new(());

/// Acquire test lock to ensure tests run serially
/// Returns a guard that releases the lock when dropped
pub fn acquire_test_lock() -> MutexGuard<'static, ()> {
    // Handle poisoned mutex by recovering from panic
    match TEST_LOCK.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
