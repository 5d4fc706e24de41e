use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::InstanceRegistry;
use crate::error::InstanceError;
use crate::types::InstanceRecord;

#[derive(Default)]
struct Entries {
    records: HashMap<String, InstanceRecord>,
    order: Vec<String>,
}

/// Process-local registry; contents are lost on restart
#[derive(Default)]
pub struct MemoryRegistry {
    entries: RwLock<Entries>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InstanceRegistry for MemoryRegistry {
    async fn put(&self, record: InstanceRecord) -> Result<(), InstanceError> {
        let mut entries = self.entries.write().await;
        if entries.records.contains_key(&record.id) {
            return Err(InstanceError::Conflict { id: record.id });
        }
        entries.order.push(record.id.clone());
        entries.records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<InstanceRecord>, InstanceError> {
        Ok(self.entries.read().await.records.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<InstanceRecord>, InstanceError> {
        let entries = self.entries.read().await;
        Ok(entries
            .order
            .iter()
            .filter_map(|id| entries.records.get(id).cloned())
            .collect())
    }

    async fn delete(&self, id: &str) -> Result<Option<InstanceRecord>, InstanceError> {
        let mut entries = self.entries.write().await;
        let removed = entries.records.remove(id);
        if removed.is_some() {
            entries.order.retain(|existing| existing != id);
        }
        Ok(removed)
    }

    async fn contains(&self, id: &str) -> Result<bool, InstanceError> {
        Ok(self.entries.read().await.records.contains_key(id))
    }
}
