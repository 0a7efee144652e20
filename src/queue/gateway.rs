// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Queue gateway trait and wire types
//!
//! The queue is the only coordination channel between the two stages. The
//! trait is deliberately narrow (create-or-discover, send, short-poll
//! receive, delete) so protocol tests can substitute an in-memory fake with
//! the same FIFO + dedup + delete semantics.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;

/// Reserved terminator of the legacy string protocol. Rejected as an object
/// key so an envelope-unaware sender can never smuggle a false end-of-stream.
pub const LEGACY_SENTINEL: &str = "-1";

/// Opaque handle to a resolved queue (a queue URL in practice).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueHandle(String);

impl QueueHandle {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn url(&self) -> &str {
        &self.0
    }
}

/// Message envelope. End-of-stream is a tagged variant, not a magic string,
/// so it cannot collide with a real object key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MessagePayload {
    Data { object_key: String },
    End,
}

impl MessagePayload {
    /// Wrap an object key, rejecting keys that could not survive the wire.
    pub fn data(object_key: impl Into<String>) -> Result<Self, PipelineError> {
        let object_key = object_key.into();
        if object_key.is_empty() {
            return Err(PipelineError::Validation("empty object key".to_string()));
        }
        if object_key == LEGACY_SENTINEL {
            return Err(PipelineError::Validation(format!(
                "object key collides with reserved terminator {:?}",
                LEGACY_SENTINEL
            )));
        }
        Ok(MessagePayload::Data { object_key })
    }

    pub fn encode(&self) -> Result<String, PipelineError> {
        serde_json::to_string(self)
            .map_err(|e| PipelineError::Validation(format!("encode payload: {}", e)))
    }

    pub fn decode(body: &str) -> Result<Self, PipelineError> {
        serde_json::from_str(body)
            .map_err(|e| PipelineError::Validation(format!("malformed message body: {}", e)))
    }
}

/// One received message. The receipt handle is the sole token authorizing
/// deletion and is only valid until the visibility window expires.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub group_id: String,
    pub body: String,
    pub receipt_handle: String,
}

impl QueueMessage {
    pub fn payload(&self) -> Result<MessagePayload, PipelineError> {
        MessagePayload::decode(&self.body)
    }
}

#[async_trait]
pub trait QueueGateway: Send + Sync {
    /// Idempotent create-or-discover of a FIFO queue with content-based
    /// deduplication. Both stages may race on this; "already exists" resolves
    /// to the existing queue, never to an error or a second queue.
    async fn ensure_queue(&self, name: &str) -> Result<QueueHandle, PipelineError>;

    /// Discovery without creation; `None` while the queue does not exist yet.
    async fn find_queue(&self, name: &str) -> Result<Option<QueueHandle>, PipelineError>;

    /// Append to the ordered group. `Transport` on service failure.
    async fn send(
        &self,
        queue: &QueueHandle,
        group_id: &str,
        payload: &MessagePayload,
    ) -> Result<(), PipelineError>;

    /// Short poll: at most one message, the oldest undelivered in its group,
    /// or `None` if nothing is currently available. Never blocks indefinitely.
    async fn receive_one(&self, queue: &QueueHandle) -> Result<Option<QueueMessage>, PipelineError>;

    /// Acknowledge by permanently removing the message. A stale or expired
    /// receipt handle means "already gone" and is a silent no-op.
    async fn delete(&self, queue: &QueueHandle, receipt_handle: &str) -> Result<(), PipelineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_wire_format() {
        let data = MessagePayload::data("img1.jpg").unwrap();
        assert_eq!(
            data.encode().unwrap(),
            r#"{"kind":"data","object_key":"img1.jpg"}"#
        );
        assert_eq!(MessagePayload::End.encode().unwrap(), r#"{"kind":"end"}"#);
    }

    #[test]
    fn test_payload_decode() {
        let payload = MessagePayload::decode(r#"{"kind":"data","object_key":"a.png"}"#).unwrap();
        assert_eq!(
            payload,
            MessagePayload::Data {
                object_key: "a.png".to_string()
            }
        );
        assert_eq!(
            MessagePayload::decode(r#"{"kind":"end"}"#).unwrap(),
            MessagePayload::End
        );
    }

    #[test]
    fn test_malformed_body_is_validation_error() {
        let err = MessagePayload::decode("-1").unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[test]
    fn test_reserved_and_empty_keys_rejected() {
        assert!(matches!(
            MessagePayload::data("-1"),
            Err(PipelineError::Validation(_))
        ));
        assert!(matches!(
            MessagePayload::data(""),
            Err(PipelineError::Validation(_))
        ));
    }
}
