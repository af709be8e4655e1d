//! Postgres-backed document store.
//!
//! Every document is one row in `documents` holding its JSONB field map.
//! Merge writes lock the row for the duration of the read-modify-write, which
//! makes each per-document merge atomic. Nothing spans more than one document.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use sqlx::types::Json;
use sqlx::PgPool;

use super::document::{apply_write, CollectionPath, Document, DocumentPath, FieldFilter, Fields};
use super::traits::BaseDocumentStore;

#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the bundled migrations (creates the `documents` table).
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run document store migrations")?;
        Ok(())
    }
}

fn into_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[async_trait]
impl BaseDocumentStore for PgDocumentStore {
    async fn get_document(&self, path: &DocumentPath) -> Result<Option<Document>> {
        let row: Option<(String, Json<Value>)> =
            sqlx::query_as("SELECT doc_id, data FROM documents WHERE path = $1")
                .bind(path.to_string())
                .fetch_optional(&self.pool)
                .await
                .with_context(|| format!("failed to read {}", path))?;

        Ok(row.map(|(id, Json(data))| Document {
            id,
            data: into_object(data),
        }))
    }

    async fn set_document(&self, path: &DocumentPath, fields: Fields, merge: bool) -> Result<()> {
        let key = path.to_string();
        let mut tx = self
            .pool
            .begin()
            .await
            .with_context(|| format!("failed to write {}", key))?;

        let existing: Option<(Json<Value>,)> = if merge {
            sqlx::query_as("SELECT data FROM documents WHERE path = $1 FOR UPDATE")
                .bind(&key)
                .fetch_optional(&mut *tx)
                .await
                .with_context(|| format!("failed to lock {}", key))?
        } else {
            None
        };

        let data = apply_write(
            existing.map(|(Json(data),)| into_object(data)),
            fields,
            merge,
            Utc::now(),
        );

        sqlx::query(
            r#"
            INSERT INTO documents (path, collection, doc_id, data)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (path) DO UPDATE
            SET data = EXCLUDED.data, updated_at = NOW()
            "#,
        )
        .bind(&key)
        .bind(path.parent().to_string())
        .bind(path.id())
        .bind(Json(Value::Object(data)))
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to write {}", key))?;

        tx.commit()
            .await
            .with_context(|| format!("failed to commit {}", key))?;
        Ok(())
    }

    async fn query_collection(
        &self,
        path: &CollectionPath,
        filter: &FieldFilter,
    ) -> Result<Vec<Document>> {
        let collection = path.to_string();

        let rows: Vec<(String, Json<Value>)> = match filter {
            FieldFilter::All => {
                sqlx::query_as(
                    "SELECT doc_id, data FROM documents WHERE collection = $1 ORDER BY doc_id",
                )
                .bind(&collection)
                .fetch_all(&self.pool)
                .await
            }
            FieldFilter::Equals { field, value } => {
                sqlx::query_as(
                    r#"
                    SELECT doc_id, data FROM documents
                    WHERE collection = $1 AND data -> $2 = $3
                    ORDER BY doc_id
                    "#,
                )
                .bind(&collection)
                .bind(field)
                .bind(Json(value.clone()))
                .fetch_all(&self.pool)
                .await
            }
            FieldFilter::ArrayContains { field, value } => {
                sqlx::query_as(
                    r#"
                    SELECT doc_id, data FROM documents
                    WHERE collection = $1
                      AND jsonb_typeof(data -> $2) = 'array'
                      AND data -> $2 @> $3
                    ORDER BY doc_id
                    "#,
                )
                .bind(&collection)
                .bind(field)
                .bind(Json(json!([value])))
                .fetch_all(&self.pool)
                .await
            }
        }
        .with_context(|| format!("failed to query {}", collection))?;

        Ok(rows
            .into_iter()
            .map(|(id, Json(data))| Document {
                id,
                data: into_object(data),
            })
            .collect())
    }
}
