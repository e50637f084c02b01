use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

use shared::{
    domain::RecordId,
    error::{BackendError, ErrorCode},
};

/// Field of every document body that mirrors the document key.
pub const DOCUMENT_KEY_FIELD: &str = "id";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredDocument {
    pub id: RecordId,
    pub collection: String,
    pub body: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        let storage = Self { pool };
        storage.ensure_documents_table().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn ensure_documents_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection  TEXT NOT NULL,
                id          TEXT NOT NULL,
                body        TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure documents table exists")?;
        Ok(())
    }

    /// Stores a new document and returns the key assigned to it. The key is
    /// also written into the body's `id` field, replacing whatever was there.
    pub async fn insert_document(&self, collection: &str, mut body: Value) -> Result<RecordId> {
        let id = RecordId::new_v4();
        let Some(fields) = body.as_object_mut() else {
            return Err(BackendError::new(
                ErrorCode::Validation,
                format!("document body for {collection} must be a JSON object"),
            )
            .into());
        };
        fields.insert(
            DOCUMENT_KEY_FIELD.to_string(),
            Value::String(id.0.clone()),
        );

        let now = Utc::now();
        sqlx::query(
            "INSERT INTO documents (collection, id, body, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(collection)
        .bind(id.as_str())
        .bind(body.to_string())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to insert document into {collection}"))?;

        debug!(collection, id = %id, "storage: document inserted");
        Ok(id)
    }

    /// Lists a collection newest first.
    pub async fn list_documents(&self, collection: &str) -> Result<Vec<StoredDocument>> {
        let rows = sqlx::query(
            "SELECT collection, id, body, created_at, updated_at
             FROM documents
             WHERE collection = ?
             ORDER BY created_at DESC, rowid DESC",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("failed to list documents in {collection}"))?;

        rows.iter().map(document_from_row).collect()
    }

    pub async fn get_document(
        &self,
        collection: &str,
        id: &RecordId,
    ) -> Result<Option<StoredDocument>> {
        let row = sqlx::query(
            "SELECT collection, id, body, created_at, updated_at
             FROM documents
             WHERE collection = ? AND id = ?",
        )
        .bind(collection)
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(document_from_row).transpose()
    }

    /// Overwrites the body of an existing document. The body's `id` field is
    /// forced to the document key.
    pub async fn replace_document(
        &self,
        collection: &str,
        id: &RecordId,
        mut body: Value,
    ) -> Result<()> {
        let Some(fields) = body.as_object_mut() else {
            return Err(BackendError::new(
                ErrorCode::Validation,
                format!("document body for {collection} must be a JSON object"),
            )
            .into());
        };
        fields.insert(
            DOCUMENT_KEY_FIELD.to_string(),
            Value::String(id.0.clone()),
        );

        let result = sqlx::query(
            "UPDATE documents SET body = ?, updated_at = ? WHERE collection = ? AND id = ?",
        )
        .bind(body.to_string())
        .bind(Utc::now())
        .bind(collection)
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to replace document {id} in {collection}"))?;

        if result.rows_affected() == 0 {
            return Err(BackendError::not_found(collection, id.as_str()).into());
        }
        debug!(collection, id = %id, "storage: document replaced");
        Ok(())
    }

    pub async fn delete_document(&self, collection: &str, id: &RecordId) -> Result<()> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete document {id} from {collection}"))?;

        if result.rows_affected() == 0 {
            return Err(BackendError::not_found(collection, id.as_str()).into());
        }
        debug!(collection, id = %id, "storage: document deleted");
        Ok(())
    }

    pub async fn count_documents(&self, collection: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE collection = ?")
            .bind(collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn document_from_row(row: &SqliteRow) -> Result<StoredDocument> {
    let id: String = row.try_get("id")?;
    let raw_body: String = row.try_get("body")?;
    let body = serde_json::from_str(&raw_body)
        .with_context(|| format!("stored document {id} has a malformed body"))?;
    Ok(StoredDocument {
        id: RecordId(id),
        collection: row.try_get("collection")?,
        body,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
