//! Kernel module - engine infrastructure and dependencies.

pub mod deps;
pub mod memory_store;
pub mod profile_cache;
pub mod store;
pub mod stream_hub;
pub mod test_dependencies;
pub mod traits;

pub use deps::EngineDeps;
pub use memory_store::InMemoryDocumentStore;
pub use profile_cache::MemoryProfileCache;
pub use store::{
    Collection, Document, FieldOp, Fields, Filter, Query, SnapshotEvent, Subscription, Update,
    Write,
};
pub use stream_hub::{Change, StreamHub};
pub use test_dependencies::TestDependencies;
pub use traits::*;
