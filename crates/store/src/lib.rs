//! Remote workspace task store boundary.
//!
//! This crate provides:
//! - `RemoteTaskStore` trait for pluggable remote task backends
//! - Explicit tagged property variants and the task property schema
//! - `NotionStore`, an HTTP client for Notion-style databases
//! - `MemoryStore`, an in-process store for tests and dry runs

pub mod error;
pub mod memory;
pub mod notion;
pub mod patch;
pub mod property;
pub mod query;
pub mod schema;
pub mod traits;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use notion::NotionStore;
pub use patch::TaskPatch;
pub use property::{PropertyKind, PropertyMap, PropertyValue};
pub use query::{ListQuery, RejectedRow, TaskPage};
pub use traits::RemoteTaskStore;
