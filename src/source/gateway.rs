// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Object-store enumeration trait

use async_trait::async_trait;

use crate::errors::PipelineError;

/// One image in the source collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectReference {
    pub collection_id: String,
    pub object_key: String,
}

impl ObjectReference {
    pub fn new(collection_id: impl Into<String>, object_key: impl Into<String>) -> Self {
        Self {
            collection_id: collection_id.into(),
            object_key: object_key.into(),
        }
    }
}

#[async_trait]
pub trait SourceEnumerator: Send + Sync {
    /// List up to `limit` object references from the named collection, in
    /// the store's listing order.
    async fn list(
        &self,
        collection_id: &str,
        limit: usize,
    ) -> Result<Vec<ObjectReference>, PipelineError>;
}
