// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP client for the object store's listing API

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use super::gateway::{ObjectReference, SourceEnumerator};
use crate::errors::PipelineError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpSourceEnumerator {
    base_url: String,
    client: Client,
}

#[derive(Deserialize)]
struct ListObjectsResponse {
    objects: Vec<String>,
}

impl HttpSourceEnumerator {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            base_url: base_url.into(),
            client,
        }
    }
}

#[async_trait]
impl SourceEnumerator for HttpSourceEnumerator {
    async fn list(
        &self,
        collection_id: &str,
        limit: usize,
    ) -> Result<Vec<ObjectReference>, PipelineError> {
        let response = self
            .client
            .get(format!(
                "{}/collections/{}/objects",
                self.base_url, collection_id
            ))
            .query(&[("limit", limit.to_string())])
            .send()
            .await
            .map_err(|e| PipelineError::Transport(format!("list objects: {}", e)))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(PipelineError::NotFound(format!(
                "collection {}",
                collection_id
            )));
        }
        if !status.is_success() {
            return Err(PipelineError::Transport(format!(
                "list objects: status {}",
                status
            )));
        }
        let data: ListObjectsResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Validation(format!("list objects response: {}", e)))?;
        Ok(data
            .objects
            .into_iter()
            .take(limit)
            .map(|key| ObjectReference::new(collection_id, key))
            .collect())
    }
}
