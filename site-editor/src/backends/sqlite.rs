//! SQLite-backed document store.
//!
//! A batch runs in one transaction, so either every patch lands or none
//! does. Patches are merged with `json_patch`, leaving fields that are not
//! in the patch untouched; `updatedAt` is taken from SQLite's clock.

use async_trait::async_trait;
use serde_json::{Map, Value};
use shared_types::{FIELD_UPDATED_AT, FIELD_UPDATED_BY};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::DocumentStoreError;
use crate::ports::{CommitBatch, DocumentStore};

const NOW_UTC: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    pub collection: String,
    pub document_id: String,
    pub fields: Map<String, Value>,
    pub updated_at: String,
    pub updated_by: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database at `database_url` and run migrations.
    /// Accepts both "sqlite:./site.db" and bare paths.
    pub async fn connect(database_url: &str) -> Result<Self, DocumentStoreError> {
        let file_path = database_url.strip_prefix("sqlite:").unwrap_or(database_url);
        let path = std::path::PathBuf::from(file_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DocumentStoreError::Backend(e.to_string()))?;
        }

        let pool = SqlitePool::connect_with(
            SqliteConnectOptions::new()
                .filename(&path)
                .create_if_missing(true),
        )
        .await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    /// Private in-memory database. A single connection, since every SQLite
    /// in-memory connection is its own database.
    pub async fn in_memory() -> Result<Self, DocumentStoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with("sqlite::memory:".parse::<SqliteConnectOptions>()?)
            .await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    async fn migrate(pool: &SqlitePool) -> Result<(), DocumentStoreError> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(|e| DocumentStoreError::Backend(format!("migration failed: {e}")))
    }

    pub async fn fetch(
        &self,
        collection: &str,
        document_id: &str,
    ) -> Result<Option<DocumentRecord>, DocumentStoreError> {
        let row = sqlx::query(
            "SELECT collection, document_id, fields, updated_at, updated_by
             FROM documents WHERE collection = ? AND document_id = ?",
        )
        .bind(collection)
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let raw_fields: String = row.try_get("fields")?;
        let fields = match serde_json::from_str::<Value>(&raw_fields)? {
            Value::Object(map) => map,
            other => {
                return Err(DocumentStoreError::Serialization(format!(
                    "document fields are not an object: {other}"
                )))
            }
        };

        Ok(Some(DocumentRecord {
            collection: row.try_get("collection")?,
            document_id: row.try_get("document_id")?,
            fields,
            updated_at: row.try_get("updated_at")?,
            updated_by: row.try_get("updated_by")?,
        }))
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn commit_batch(&self, batch: &CommitBatch) -> Result<(), DocumentStoreError> {
        let upsert = format!(
            "INSERT INTO documents (collection, document_id, fields, updated_at, updated_by)
             VALUES (?1, ?2, json_set(?3, '$.{FIELD_UPDATED_AT}', {NOW_UTC}, '$.{FIELD_UPDATED_BY}', ?4), {NOW_UTC}, ?4)
             ON CONFLICT (collection, document_id) DO UPDATE SET
                fields = json_patch(documents.fields, excluded.fields),
                updated_at = excluded.updated_at,
                updated_by = excluded.updated_by"
        );

        // Dropping the transaction without commit rolls everything back.
        let mut tx = self.pool.begin().await?;
        for patch in &batch.patches {
            let fields = serde_json::to_string(&patch.fields)?;
            sqlx::query(&upsert)
                .bind(&patch.collection)
                .bind(&patch.document_id)
                .bind(fields)
                .bind(&batch.updated_by)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        debug!(documents = batch.patches.len(), "committed document batch");
        Ok(())
    }
}
