//! libSQL-backed session store.
//!
//! The [`SessionStore`] holds one working item list per opaque session key.
//! Every write refreshes the key's expiry; reads never return expired rows.
//!
//! **Write serialization:** [`SessionStore::update`] holds a per-key async
//! lock across its read-modify-write, so concurrent merges into the same
//! session within one process never lose updates. Separate processes sharing
//! a database file are still last-writer-wins.

mod merge;
mod migrations;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use budgetlens_shared::{BudgetLensError, Item, Result};
use chrono::Utc;
use libsql::{Connection, Database, params};
use tokio::sync::OwnedMutexGuard;

pub use merge::{dedupe_by_name, merge_items};

type KeyLocks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

fn storage_err(e: impl std::fmt::Display) -> BudgetLensError {
    BudgetLensError::Storage(e.to_string())
}

/// TTL-bounded session store over a local libSQL database.
pub struct SessionStore {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    ttl: Duration,
    locks: KeyLocks,
}

impl SessionStore {
    /// Open or create a database at `path`; sessions expire `ttl` after their last write.
    pub async fn open(path: &Path, ttl: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BudgetLensError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let store = Self {
            db,
            conn,
            ttl,
            locks: Mutex::new(HashMap::new()),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    BudgetLensError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // -----------------------------------------------------------------------
    // Session operations
    // -----------------------------------------------------------------------

    /// Store `items` under `key`, replacing any prior value and resetting expiry.
    pub async fn put(&self, key: &str, items: &[Item]) -> Result<()> {
        let items_json = serde_json::to_string(items).map_err(storage_err)?;
        let now = Utc::now();
        let expires_at = now.timestamp() + self.ttl.as_secs() as i64;

        self.conn
            .execute(
                "INSERT INTO sessions (key, items_json, updated_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(key) DO UPDATE SET
                    items_json = excluded.items_json,
                    updated_at = excluded.updated_at,
                    expires_at = excluded.expires_at",
                params![key, items_json, now.to_rfc3339(), expires_at],
            )
            .await
            .map_err(storage_err)?;

        tracing::debug!(key, items = items.len(), "session stored");
        Ok(())
    }

    /// The stored list, or an empty list if the key is absent or expired.
    pub async fn get(&self, key: &str) -> Result<Vec<Item>> {
        let now = Utc::now().timestamp();
        let mut rows = self
            .conn
            .query(
                "SELECT items_json FROM sessions WHERE key = ?1 AND expires_at > ?2",
                params![key, now],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => {
                let json = row.get::<String>(0).map_err(storage_err)?;
                serde_json::from_str(&json).map_err(|e| {
                    BudgetLensError::Storage(format!("corrupt session '{key}': {e}"))
                })
            }
            None => Ok(Vec::new()),
        }
    }

    /// Whether `key` holds an unexpired session.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let now = Utc::now().timestamp();
        let mut rows = self
            .conn
            .query(
                "SELECT 1 FROM sessions WHERE key = ?1 AND expires_at > ?2",
                params![key, now],
            )
            .await
            .map_err(storage_err)?;
        Ok(rows.next().await.map_err(storage_err)?.is_some())
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM sessions WHERE key = ?1", params![key])
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Delete every expired session. Returns the number removed.
    pub async fn purge_expired(&self) -> Result<u64> {
        let now = Utc::now().timestamp();
        let removed = self
            .conn
            .execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])
            .await
            .map_err(storage_err)?;
        tracing::info!(removed, "purged expired sessions");
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Serialized read-modify-write
    // -----------------------------------------------------------------------

    /// Acquire the write lock for `key`.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // Drop locks nobody is holding or waiting on.
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Apply `f` to the current list under the key's lock and store the result.
    pub async fn update<F>(&self, key: &str, f: F) -> Result<Vec<Item>>
    where
        F: FnOnce(Vec<Item>) -> Result<Vec<Item>>,
    {
        let _guard = self.lock(key).await;
        let current = self.get(key).await?;
        let next = f(current)?;
        self.put(key, &next).await?;
        Ok(next)
    }
}
