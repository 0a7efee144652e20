// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP client for the classification service

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::gateway::{DetectionGateway, Label, TextToken};
use crate::errors::PipelineError;
use crate::source::ObjectReference;

// Detection calls carry image analysis; give them a longer window than the
// queue's short polls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpDetectionGateway {
    base_url: String,
    client: Client,
}

#[derive(Serialize)]
struct DetectLabelsRequest<'a> {
    collection_id: &'a str,
    object_key: &'a str,
    min_confidence: f32,
}

#[derive(Deserialize)]
struct DetectLabelsResponse {
    labels: Vec<Label>,
}

#[derive(Serialize)]
struct DetectTextRequest<'a> {
    collection_id: &'a str,
    object_key: &'a str,
}

#[derive(Deserialize)]
struct DetectTextResponse {
    tokens: Vec<TextToken>,
}

impl HttpDetectionGateway {
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

    fn check_status(context: &str, status: StatusCode, object_key: &str) -> Result<(), PipelineError> {
        if status == StatusCode::NOT_FOUND {
            return Err(PipelineError::NotFound(format!("object {}", object_key)));
        }
        if !status.is_success() {
            return Err(PipelineError::Transport(format!(
                "{}: status {}",
                context, status
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DetectionGateway for HttpDetectionGateway {
    async fn detect_labels(
        &self,
        object: &ObjectReference,
        min_confidence: f32,
    ) -> Result<Vec<Label>, PipelineError> {
        let response = self
            .client
            .post(format!("{}/v1/detect-labels", self.base_url))
            .json(&DetectLabelsRequest {
                collection_id: &object.collection_id,
                object_key: &object.object_key,
                min_confidence,
            })
            .send()
            .await
            .map_err(|e| PipelineError::Transport(format!("detect labels: {}", e)))?;
        Self::check_status("detect labels", response.status(), &object.object_key)?;
        let data: DetectLabelsResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Validation(format!("detect labels response: {}", e)))?;
        Ok(data.labels)
    }

    async fn detect_text(
        &self,
        object: &ObjectReference,
    ) -> Result<Vec<TextToken>, PipelineError> {
        let response = self
            .client
            .post(format!("{}/v1/detect-text", self.base_url))
            .json(&DetectTextRequest {
                collection_id: &object.collection_id,
                object_key: &object.object_key,
            })
            .send()
            .await
            .map_err(|e| PipelineError::Transport(format!("detect text: {}", e)))?;
        Self::check_status("detect text", response.status(), &object.object_key)?;
        let data: DetectTextResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Validation(format!("detect text response: {}", e)))?;
        Ok(data.tokens)
    }
}
