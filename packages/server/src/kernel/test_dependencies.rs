// TestDependencies - mock implementations for testing
//
// Provides failing adapters that can be injected into ServerDeps to exercise
// the error path of the command router.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{
    BaseDocumentStore, BaseEventPublisher, CollectionPath, Document, DocumentPath, FieldFilter,
    Fields, MemoryDocumentStore,
};

// =============================================================================
// Failing Document Store
// =============================================================================

/// Reads pass through to an in-memory store, writes are rejected.
pub struct ReadOnlyDocumentStore {
    inner: Arc<MemoryDocumentStore>,
    rejected_writes: AtomicUsize,
}

impl ReadOnlyDocumentStore {
    pub fn new(inner: Arc<MemoryDocumentStore>) -> Self {
        Self {
            inner,
            rejected_writes: AtomicUsize::new(0),
        }
    }

    /// Number of writes refused so far
    pub fn rejected_writes(&self) -> usize {
        self.rejected_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BaseDocumentStore for ReadOnlyDocumentStore {
    async fn get_document(&self, path: &DocumentPath) -> Result<Option<Document>> {
        self.inner.get_document(path).await
    }

    async fn set_document(&self, path: &DocumentPath, _fields: Fields, _merge: bool) -> Result<()> {
        self.rejected_writes.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("store is read-only: refused write to {}", path))
    }

    async fn query_collection(
        &self,
        path: &CollectionPath,
        filter: &FieldFilter,
    ) -> Result<Vec<Document>> {
        self.inner.query_collection(path, filter).await
    }
}

// =============================================================================
// Flaky Event Publisher
// =============================================================================

/// Rejects the first `failures` publishes, then delegates.
pub struct FlakyPublisher<P> {
    inner: Arc<P>,
    remaining_failures: AtomicUsize,
}

impl<P: BaseEventPublisher> FlakyPublisher<P> {
    pub fn new(inner: Arc<P>, failures: usize) -> Self {
        Self {
            inner,
            remaining_failures: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl<P: BaseEventPublisher> BaseEventPublisher for FlakyPublisher<P> {
    async fn publish(&self, channel: &str, payload: &Value) -> Result<String> {
        let failed = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(anyhow!("broker unavailable"));
        }
        self.inner.publish(channel, payload).await
    }
}
