//! In-memory object store, used by tests and for scratch computation.

use super::{ObjectId, ObjectStore};
use crate::errors::{ExError, ExErrorKind, ExResult};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<ObjectId, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct objects held
    pub fn len(&self) -> usize {
        self.objects.lock().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> ExError {
    ExError::new(ExErrorKind::Internal)
        .with_op("memory_object_store")
        .with_message("object map lock poisoned")
}

impl ObjectStore for MemoryObjectStore {
    fn read_raw(&self, id: &ObjectId) -> ExResult<Option<Vec<u8>>> {
        let objects = self.objects.lock().map_err(|_| poisoned())?;
        Ok(objects.get(id).cloned())
    }

    fn write_raw(&self, id: &ObjectId, framed: &[u8]) -> ExResult<()> {
        let mut objects = self.objects.lock().map_err(|_| poisoned())?;
        objects.entry(id.clone()).or_insert_with(|| framed.to_vec());
        Ok(())
    }
}
