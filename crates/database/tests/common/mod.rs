//! Shared fixtures for the database integration tests.

#![allow(dead_code)]

use database::{DatabaseService, FutureExt, PoolSettings};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

pub const ITEMS_DDL: &str = "CREATE TABLE IF NOT EXISTS items (
    id INTEGER NOT NULL,
    label TEXT NOT NULL,
    price TEXT,
    PRIMARY KEY (id)
);";

/// A file-backed SQLite database in a temporary directory.
///
/// The directory is removed when the fixture is dropped.
pub struct TestDatabase {
    pub temp_dir: TempDir,
    pub db_path: PathBuf,
    pub service: DatabaseService,
}

impl TestDatabase {
    pub async fn new(capacity: u32, acquire_timeout: Duration) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        let url = format!("sqlite:///{}", db_path.display());
        let settings = PoolSettings {
            capacity,
            acquire_timeout,
            ..PoolSettings::default()
        };
        let service = database::connect(&url, &settings)
            .await
            .expect("failed to open test database");
        service
            .execute_ddl(ITEMS_DDL)
            .await
            .expect("failed to create items table");
        Self {
            temp_dir,
            db_path,
            service,
        }
    }

    pub async fn count_items(&self) -> i64 {
        let rows = self
            .service
            .run_in_transaction(|tx| {
                async move { tx.execute("SELECT COUNT(*) AS n FROM items", &[]).await }.boxed()
            })
            .await
            .expect("count query failed");
        rows[0].get_i64("n").expect("count column")
    }
}
