//! Instance registry
//!
//! The registry is the service's source of truth for which instances exist.
//! [`MemoryRegistry`] keeps records for the life of the process;
//! [`DatabaseRegistry`] persists them through sea-orm so they survive restarts.

use async_trait::async_trait;

use crate::error::InstanceError;
use crate::types::InstanceRecord;

pub mod database;
pub mod entity;
pub mod memory;
pub mod migration;

pub use self::database::DatabaseRegistry;
pub use self::memory::MemoryRegistry;

#[async_trait]
pub trait InstanceRegistry: Send + Sync {
    /// Insert a new record. Fails with `Conflict` if the id is already present.
    async fn put(&self, record: InstanceRecord) -> Result<(), InstanceError>;

    async fn get(&self, id: &str) -> Result<Option<InstanceRecord>, InstanceError>;

    /// All records in insertion order
    async fn list(&self) -> Result<Vec<InstanceRecord>, InstanceError>;

    /// Remove a record, returning it if it was present
    async fn delete(&self, id: &str) -> Result<Option<InstanceRecord>, InstanceError>;

    async fn contains(&self, id: &str) -> Result<bool, InstanceError> {
        Ok(self.get(id).await?.is_some())
    }
}
