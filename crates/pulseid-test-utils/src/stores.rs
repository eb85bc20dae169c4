use chrono::{DateTime, Utc};
use tempfile::TempDir;

use pulseid_storage_sqlite::SqliteAccountStore;

pub struct TestStores {
    pub account_store: SqliteAccountStore,
    /// Hold the TempDir to keep it alive for the test's duration.
    pub _tempdir: TempDir,
}

/// Create a fresh tempdir-backed SQLite account store.
pub async fn create_test_stores() -> TestStores {
    let tempdir = TempDir::new().expect("failed to create tempdir");
    let db_path = tempdir.path().join("test.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    let account_store = SqliteAccountStore::connect(&db_url)
        .await
        .expect("failed to connect account store");

    TestStores {
        account_store,
        _tempdir: tempdir,
    }
}

impl TestStores {
    /// Rewrite a column holding a datetime, for simulating the passage of
    /// time (idle accounts, expired codes and tokens).
    pub async fn set_datetime(&self, id: &str, column: &str, when: DateTime<Utc>) {
        let formatted = when.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
        let sql = format!("UPDATE users SET {column} = ? WHERE id = ?");
        sqlx::query(&sql)
            .bind(formatted)
            .bind(id)
            .execute(self.account_store.pool())
            .await
            .expect("test datetime rewrite failed");
    }
}
