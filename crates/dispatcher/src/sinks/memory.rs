//! MemorySink - keeps every publication in a shared vector

use std::sync::{Arc, Mutex, PoisonError};

use contracts::{ContractError, DataSink, Publication};

/// Shared view of what a [`MemorySink`] received
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Vec<Publication>>>,
}

impl MemoryStore {
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<Publication> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Publications of one kind, in arrival order
    pub fn of_kind(&self, kind: &str) -> Vec<Publication> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|p| p.kind() == kind)
            .cloned()
            .collect()
    }

    fn push(&self, publication: Publication) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(publication);
    }
}

pub struct MemorySink {
    name: String,
    store: MemoryStore,
}

impl MemorySink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            store: MemoryStore::default(),
        }
    }

    pub fn store(&self) -> MemoryStore {
        self.store.clone()
    }
}

impl DataSink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, publication: &Publication) -> Result<(), ContractError> {
        self.store.push(publication.clone());
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}
