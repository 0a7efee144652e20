// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection gateway trait and classification result types
//!
//! Two operations against the external classification service: label
//! detection (used by the producer to qualify images) and text detection
//! (used by the consumer to extract recognized words). Images are passed by
//! store reference; the service fetches the bytes itself.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;
use crate::source::ObjectReference;

/// One labeled region with its confidence score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub confidence: f32,
}

impl Label {
    pub fn new(name: impl Into<String>, confidence: f32) -> Self {
        Self {
            name: name.into(),
            confidence,
        }
    }
}

/// Granularity of a recognized text token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenKind {
    Word,
    Line,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextToken {
    pub text: String,
    pub kind: TokenKind,
}

impl TextToken {
    pub fn word(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: TokenKind::Word,
        }
    }

    pub fn line(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: TokenKind::Line,
        }
    }
}

#[async_trait]
pub trait DetectionGateway: Send + Sync {
    /// Detect labels at or above `min_confidence`, in service order.
    async fn detect_labels(
        &self,
        object: &ObjectReference,
        min_confidence: f32,
    ) -> Result<Vec<Label>, PipelineError>;

    /// Detect text tokens, in detection order.
    async fn detect_text(&self, object: &ObjectReference)
        -> Result<Vec<TextToken>, PipelineError>;
}
