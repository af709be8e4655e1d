//! In-memory document store.
//!
//! Used by the test harness and the `manage_dev` runner, and by the worker
//! when no `DATABASE_URL` is configured. Documents are keyed by their full
//! path, so a collection scan is a prefix range over the map.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::document::{apply_write, CollectionPath, Document, DocumentPath, FieldFilter, Fields};
use super::traits::BaseDocumentStore;

#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<BTreeMap<String, Map<String, Value>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents across every collection.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl BaseDocumentStore for MemoryDocumentStore {
    async fn get_document(&self, path: &DocumentPath) -> Result<Option<Document>> {
        let documents = self.documents.read().await;
        Ok(documents.get(&path.to_string()).map(|data| Document {
            id: path.id().to_string(),
            data: data.clone(),
        }))
    }

    async fn set_document(&self, path: &DocumentPath, fields: Fields, merge: bool) -> Result<()> {
        let key = path.to_string();
        // The write lock makes each merge atomic per document.
        let mut documents = self.documents.write().await;
        let existing = documents.remove(&key);
        let data = apply_write(existing, fields, merge, Utc::now());
        documents.insert(key, data);
        Ok(())
    }

    async fn query_collection(
        &self,
        path: &CollectionPath,
        filter: &FieldFilter,
    ) -> Result<Vec<Document>> {
        let prefix = format!("{}/", path);
        let documents = self.documents.read().await;

        Ok(documents
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(key, data)| {
                let id = &key[prefix.len()..];
                // Skip documents in nested sub-collections
                if id.contains('/') || !filter.matches(data) {
                    return None;
                }
                Some(Document {
                    id: id.to_string(),
                    data: data.clone(),
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::document::{fields_from, FieldValue, MESSAGES};
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        fields_from(value.as_object().cloned().unwrap())
    }

    #[tokio::test]
    async fn get_returns_none_for_missing_document() {
        let store = MemoryDocumentStore::new();
        let found = store.get_document(&DocumentPath::room("nope")).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn set_then_get_roundtrip() {
        let store = MemoryDocumentStore::new();
        let path = DocumentPath::room("r1");

        store
            .set_document(&path, fields(json!({ "name": "Launch" })), false)
            .await
            .unwrap();

        let doc = store.get_document(&path).await.unwrap().unwrap();
        assert_eq!(doc.id, "r1");
        assert_eq!(doc.data["name"], "Launch");
    }

    #[tokio::test]
    async fn query_only_returns_direct_children() {
        let store = MemoryDocumentStore::new();
        let room = DocumentPath::room("r1");
        let instance = DocumentPath::instance("r1", "i1");

        store.set_document(&room, fields(json!({})), false).await.unwrap();
        store.set_document(&instance, fields(json!({})), false).await.unwrap();
        store
            .set_document(&room.collection(MESSAGES).doc("m1"), fields(json!({ "text": "a" })), false)
            .await
            .unwrap();
        store
            .set_document(
                &instance.collection(MESSAGES).doc("m2"),
                fields(json!({ "text": "b" })),
                false,
            )
            .await
            .unwrap();
        // Sibling room whose id shares a prefix
        store
            .set_document(
                &DocumentPath::room("r10").collection(MESSAGES).doc("m3"),
                fields(json!({})),
                false,
            )
            .await
            .unwrap();

        let messages = store
            .query_collection(&room.collection(MESSAGES), &FieldFilter::All)
            .await
            .unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "m1");
    }

    #[tokio::test]
    async fn query_applies_filter() {
        let store = MemoryDocumentStore::new();
        let instances = DocumentPath::room("r1").collection("instances");

        store
            .set_document(&instances.doc("a"), fields(json!({ "participants": ["u1"] })), false)
            .await
            .unwrap();
        store
            .set_document(&instances.doc("b"), fields(json!({ "participants": ["u2"] })), false)
            .await
            .unwrap();

        let joined = store
            .query_collection(&instances, &FieldFilter::array_contains("participants", "u2"))
            .await
            .unwrap();

        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].id, "b");
    }

    #[tokio::test]
    async fn concurrent_array_unions_do_not_lose_members() {
        let store = std::sync::Arc::new(MemoryDocumentStore::new());
        let path = DocumentPath::instance("r1", "i1");

        let mut handles = Vec::new();
        for n in 0..16 {
            let store = store.clone();
            let path = path.clone();
            handles.push(tokio::spawn(async move {
                let mut write = Fields::new();
                write.insert(
                    "participants".into(),
                    FieldValue::ArrayUnion(vec![json!(format!("u{}", n))]),
                );
                store.set_document(&path, write, true).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let doc = store.get_document(&path).await.unwrap().unwrap();
        assert_eq!(doc.data["participants"].as_array().unwrap().len(), 16);
    }
}
