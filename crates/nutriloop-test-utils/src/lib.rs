//! Shared test utilities for nutriloop integration tests.
//!
//! Each test gets its own in-memory SQLite database with migrations
//! applied. Databases are private to their pool, so tests are fully
//! isolated and nothing needs to be torn down.

use sqlx::SqlitePool;

use nutriloop_db::pool;

/// Create a fresh in-memory database with migrations applied.
///
/// The pool holds the single connection that owns the database; dropping
/// the pool discards the database.
pub async fn create_test_db() -> SqlitePool {
    let pool = pool::create_memory_pool()
        .await
        .expect("failed to open in-memory database");

    pool::run_migrations(&pool)
        .await
        .expect("migrations should succeed");

    pool
}
