//! Memory store
//!
//! Will be destroyed on shutdown

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Result;

use super::LocalStore;

/// An in-memory local store
#[derive(Clone, Debug, Default)]
pub struct Memory {
    /// All values by key
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl Memory {
    /// Create a new empty Memory store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalStore for Memory {
    async fn get(&self, key: &str) -> Option<String> {
        self.values.lock().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .await
            .insert(key.to_string(), value.to_string());

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values.lock().await.remove(key);

        Ok(())
    }
}
