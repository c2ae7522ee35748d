//! libSQL-backed resolution store mapping resource URIs to page ids.
//!
//! Consulted before any remote id lookup; a hit never touches the network.

use std::path::Path;

use chrono::Utc;
use libsql::{Connection, Database, params};
use qexp_shared::{QexpError, Result};

use crate::migrations;

/// Local fast key-value store for resource → page id resolutions.
pub struct IdStore {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl IdStore {
    /// Open or create a database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| QexpError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| QexpError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| QexpError::Storage(e.to_string()))?;

        let store = Self { db, conn };
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
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        QexpError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Look up the page id resolved for `resource`.
    pub async fn get(&self, resource: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT page_id FROM resource_ids WHERE resource = ?1",
                params![resource],
            )
            .await
            .map_err(|e| QexpError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let page_id: String = row
                    .get(0)
                    .map_err(|e| QexpError::Storage(e.to_string()))?;
                Ok(Some(page_id))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(QexpError::Storage(e.to_string())),
        }
    }

    /// Record a resolution (upserts).
    pub async fn set(&self, resource: &str, page_id: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO resource_ids (resource, page_id, resolved_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(resource) DO UPDATE SET
                   page_id = excluded.page_id,
                   resolved_at = excluded.resolved_at",
                params![resource, page_id, now.as_str()],
            )
            .await
            .map_err(|e| QexpError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Number of stored resolutions.
    pub async fn count(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM resource_ids", params![])
            .await
            .map_err(|e| QexpError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get::<i64>(0)
                .map(|count| count as u64)
                .map_err(|e| QexpError::Storage(e.to_string())),
            Ok(None) => Ok(0),
            Err(e) => Err(QexpError::Storage(e.to_string())),
        }
    }
}
