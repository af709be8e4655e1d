//! Kernel module - server infrastructure and dependencies.

pub mod deps;
pub mod document;
pub mod memory_store;
pub mod nats;
pub mod pg_store;
pub mod test_dependencies;
pub mod traits;

pub use deps::{ChannelConfig, ServerDeps};
pub use document::{
    fields_from, CollectionPath, Document, DocumentPath, FieldFilter, FieldValue, Fields,
};
pub use memory_store::MemoryDocumentStore;
pub use nats::{NatsClientPublisher, PublishedMessage, TestNats};
pub use pg_store::PgDocumentStore;
pub use test_dependencies::{FlakyPublisher, ReadOnlyDocumentStore};
pub use traits::*;
