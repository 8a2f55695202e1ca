// ABOUTME: In-memory correlation store for tests and single-process deployments

use crate::client::traits::CorrelationStore;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// `CorrelationStore` backed by a `HashMap`. Entries live until their request
/// finishes; nothing is persisted.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<u32, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

impl CorrelationStore for InMemoryStore {
    async fn put(&self, sequence_number: u32, message_id: String) -> Result<(), crate::Error> {
        self.entries.lock().await.insert(sequence_number, message_id);
        Ok(())
    }

    async fn get(&self, sequence_number: u32) -> Result<Option<String>, crate::Error> {
        Ok(self.entries.lock().await.get(&sequence_number).cloned())
    }

    async fn remove(&self, sequence_number: u32) -> Result<Option<String>, crate::Error> {
        Ok(self.entries.lock().await.remove(&sequence_number))
    }
}
