// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Scripted detection gateway for tests
//!
//! Responses are keyed by object key. Failures can be injected per key with
//! a count, so retry budgets can be exercised: the call fails `n` times and
//! then succeeds (or keeps failing if scripted with `u32::MAX`).

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::gateway::{DetectionGateway, Label, TextToken};
use crate::errors::PipelineError;
use crate::source::ObjectReference;

#[derive(Default)]
struct MockState {
    labels: HashMap<String, Vec<Label>>,
    tokens: HashMap<String, Vec<TextToken>>,
    label_failures: HashMap<String, u32>,
    text_failures: HashMap<String, u32>,
    label_calls: u32,
    text_calls: u32,
    text_call_log: Vec<String>,
}

#[derive(Clone, Default)]
pub struct MockDetectionGateway {
    state: Arc<Mutex<MockState>>,
}

impl MockDetectionGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_labels(&self, object_key: impl Into<String>, labels: Vec<Label>) {
        self.state.lock().await.labels.insert(object_key.into(), labels);
    }

    pub async fn set_tokens(&self, object_key: impl Into<String>, tokens: Vec<TextToken>) {
        self.state.lock().await.tokens.insert(object_key.into(), tokens);
    }

    /// Fail the next `times` label-detection calls for this key.
    pub async fn fail_labels(&self, object_key: impl Into<String>, times: u32) {
        self.state
            .lock()
            .await
            .label_failures
            .insert(object_key.into(), times);
    }

    /// Fail the next `times` text-detection calls for this key.
    pub async fn fail_text(&self, object_key: impl Into<String>, times: u32) {
        self.state
            .lock()
            .await
            .text_failures
            .insert(object_key.into(), times);
    }

    pub async fn label_calls(&self) -> u32 {
        self.state.lock().await.label_calls
    }

    pub async fn text_calls(&self) -> u32 {
        self.state.lock().await.text_calls
    }

    /// Object keys text detection was called for, in call order.
    pub async fn text_call_keys(&self) -> Vec<String> {
        self.state.lock().await.text_call_log.clone()
    }

    fn take_failure(failures: &mut HashMap<String, u32>, key: &str) -> bool {
        match failures.get_mut(key) {
            Some(remaining) if *remaining > 0 => {
                *remaining = remaining.saturating_sub(1);
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl DetectionGateway for MockDetectionGateway {
    async fn detect_labels(
        &self,
        object: &ObjectReference,
        min_confidence: f32,
    ) -> Result<Vec<Label>, PipelineError> {
        let mut state = self.state.lock().await;
        state.label_calls += 1;
        if Self::take_failure(&mut state.label_failures, &object.object_key) {
            return Err(PipelineError::Transport(format!(
                "detect labels {}: injected failure",
                object.object_key
            )));
        }
        Ok(state
            .labels
            .get(&object.object_key)
            .map(|labels| {
                labels
                    .iter()
                    .filter(|l| l.confidence >= min_confidence)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn detect_text(
        &self,
        object: &ObjectReference,
    ) -> Result<Vec<TextToken>, PipelineError> {
        let mut state = self.state.lock().await;
        state.text_calls += 1;
        state.text_call_log.push(object.object_key.clone());
        if Self::take_failure(&mut state.text_failures, &object.object_key) {
            return Err(PipelineError::Transport(format!(
                "detect text {}: injected failure",
                object.object_key
            )));
        }
        Ok(state
            .tokens
            .get(&object.object_key)
            .cloned()
            .unwrap_or_default())
    }
}
