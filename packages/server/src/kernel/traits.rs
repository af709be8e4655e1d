// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Conversation rules (participants, visibility) live in domains/rooms and use these traits.
//
// Naming convention: Base* for trait names (e.g., BaseDocumentStore, BaseEventPublisher)

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use super::document::{CollectionPath, Document, DocumentPath, FieldFilter, Fields};

// =============================================================================
// Document Store Trait (Infrastructure - hierarchical collections)
// =============================================================================

#[async_trait]
pub trait BaseDocumentStore: Send + Sync {
    /// Fetch a document, `None` when it does not exist
    async fn get_document(&self, path: &DocumentPath) -> Result<Option<Document>>;

    /// Create or replace a document; with `merge` only the given fields change
    async fn set_document(&self, path: &DocumentPath, fields: Fields, merge: bool) -> Result<()>;

    /// All documents directly under `path` matching `filter`, ordered by id
    async fn query_collection(
        &self,
        path: &CollectionPath,
        filter: &FieldFilter,
    ) -> Result<Vec<Document>>;

    /// Identifier for a document the store assigns (rooms on `create`)
    fn new_document_id(&self) -> String {
        Uuid::now_v7().simple().to_string()
    }
}

// =============================================================================
// Event Publisher Trait (Infrastructure - result fan-out)
// =============================================================================

#[async_trait]
pub trait BaseEventPublisher: Send + Sync {
    /// Publish a JSON payload to a named channel, returning a delivery id
    async fn publish(&self, channel: &str, payload: &Value) -> Result<String>;
}
