// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Scripted in-memory object store for tests

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::gateway::{ObjectReference, SourceEnumerator};
use crate::errors::PipelineError;

#[derive(Clone, Default)]
pub struct MockSourceEnumerator {
    objects: Arc<Mutex<Vec<String>>>,
    injected_error: Arc<Mutex<Option<String>>>,
}

impl MockSourceEnumerator {
    pub fn new(keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            objects: Arc::new(Mutex::new(keys.into_iter().map(Into::into).collect())),
            injected_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Make the next list call fail with a transport error.
    pub async fn inject_transport_error(&self, message: impl Into<String>) {
        *self.injected_error.lock().await = Some(message.into());
    }
}

#[async_trait]
impl SourceEnumerator for MockSourceEnumerator {
    async fn list(
        &self,
        collection_id: &str,
        limit: usize,
    ) -> Result<Vec<ObjectReference>, PipelineError> {
        if let Some(message) = self.injected_error.lock().await.take() {
            return Err(PipelineError::Transport(message));
        }
        let objects = self.objects.lock().await;
        Ok(objects
            .iter()
            .take(limit)
            .map(|key| ObjectReference::new(collection_id, key))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_respects_limit_and_order() {
        let source = MockSourceEnumerator::new(["a.jpg", "b.jpg", "c.jpg"]);
        let refs = source.list("bucket", 2).await.unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0], ObjectReference::new("bucket", "a.jpg"));
        assert_eq!(refs[1], ObjectReference::new("bucket", "b.jpg"));
    }
}
