// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! In-memory queue fake for protocol tests
//!
//! Implements the full external contract the stages rely on: per-group FIFO
//! delivery, content-based deduplication within a window, visibility timeout
//! with redelivery of unacknowledged messages, and delete-by-receipt-handle
//! where stale handles are silently ignored. Cloning shares the underlying
//! state, so a producer and a consumer can be wired to the same instance.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::gateway::{MessagePayload, QueueGateway, QueueHandle, QueueMessage};
use crate::errors::PipelineError;

const MEM_SCHEME: &str = "mem://";

#[derive(Debug)]
struct StoredMessage {
    group_id: String,
    body: String,
    receipt_handle: Option<String>,
    invisible_until: Option<Instant>,
}

impl StoredMessage {
    fn in_flight(&self, now: Instant) -> bool {
        matches!(self.invisible_until, Some(until) if until > now)
    }
}

#[derive(Debug, Default)]
struct QueueState {
    messages: VecDeque<StoredMessage>,
    // body -> time last accepted, for content-based dedup
    dedup: HashMap<String, Instant>,
}

#[derive(Debug, Default)]
struct Inner {
    queues: HashMap<String, QueueState>,
    injected_error: Option<String>,
}

#[derive(Clone)]
pub struct InMemoryQueue {
    inner: Arc<Mutex<Inner>>,
    visibility: Duration,
    dedup_window: Duration,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::with_timings(Duration::from_secs(30), Duration::from_secs(300))
    }

    pub fn with_timings(visibility: Duration, dedup_window: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            visibility,
            dedup_window,
        }
    }

    /// Make the next gateway operation fail with a transport error.
    pub async fn inject_transport_error(&self, message: impl Into<String>) {
        self.inner.lock().await.injected_error = Some(message.into());
    }

    /// Bodies still sitting in the queue, in arrival order. Test helper.
    pub async fn pending_bodies(&self, name: &str) -> Vec<String> {
        let inner = self.inner.lock().await;
        inner
            .queues
            .get(name)
            .map(|q| q.messages.iter().map(|m| m.body.clone()).collect())
            .unwrap_or_default()
    }

    fn queue_name(handle: &QueueHandle) -> &str {
        handle.url().strip_prefix(MEM_SCHEME).unwrap_or(handle.url())
    }

    fn check_injected(inner: &mut Inner) -> Result<(), PipelineError> {
        match inner.injected_error.take() {
            Some(message) => Err(PipelineError::Transport(message)),
            None => Ok(()),
        }
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueGateway for InMemoryQueue {
    async fn ensure_queue(&self, name: &str) -> Result<QueueHandle, PipelineError> {
        let mut inner = self.inner.lock().await;
        Self::check_injected(&mut inner)?;
        inner.queues.entry(name.to_string()).or_default();
        Ok(QueueHandle::new(format!("{}{}", MEM_SCHEME, name)))
    }

    async fn find_queue(&self, name: &str) -> Result<Option<QueueHandle>, PipelineError> {
        let mut inner = self.inner.lock().await;
        Self::check_injected(&mut inner)?;
        Ok(inner
            .queues
            .contains_key(name)
            .then(|| QueueHandle::new(format!("{}{}", MEM_SCHEME, name))))
    }

    async fn send(
        &self,
        queue: &QueueHandle,
        group_id: &str,
        payload: &MessagePayload,
    ) -> Result<(), PipelineError> {
        let body = payload.encode()?;
        let mut inner = self.inner.lock().await;
        Self::check_injected(&mut inner)?;
        let name = Self::queue_name(queue).to_string();
        let state = inner
            .queues
            .get_mut(&name)
            .ok_or_else(|| PipelineError::NotFound(format!("queue {}", name)))?;

        let now = Instant::now();
        let window = self.dedup_window;
        state
            .dedup
            .retain(|_, accepted_at| now.duration_since(*accepted_at) < window);
        if state.dedup.contains_key(&body) {
            // Content-based dedup: identical body within the window is dropped
            return Ok(());
        }
        state.dedup.insert(body.clone(), now);
        state.messages.push_back(StoredMessage {
            group_id: group_id.to_string(),
            body,
            receipt_handle: None,
            invisible_until: None,
        });
        Ok(())
    }

    async fn receive_one(&self, queue: &QueueHandle) -> Result<Option<QueueMessage>, PipelineError> {
        let mut inner = self.inner.lock().await;
        Self::check_injected(&mut inner)?;
        let name = Self::queue_name(queue).to_string();
        let state = inner
            .queues
            .get_mut(&name)
            .ok_or_else(|| PipelineError::NotFound(format!("queue {}", name)))?;

        let now = Instant::now();
        // A group with an in-flight message delivers nothing further until
        // that message is deleted or its visibility expires (FIFO contract).
        let mut blocked_groups: HashSet<String> = HashSet::new();
        for message in state.messages.iter_mut() {
            if message.in_flight(now) {
                blocked_groups.insert(message.group_id.clone());
                continue;
            }
            if blocked_groups.contains(&message.group_id) {
                continue;
            }
            let receipt = Uuid::new_v4().to_string();
            message.receipt_handle = Some(receipt.clone());
            message.invisible_until = Some(now + self.visibility);
            return Ok(Some(QueueMessage {
                group_id: message.group_id.clone(),
                body: message.body.clone(),
                receipt_handle: receipt,
            }));
        }
        Ok(None)
    }

    async fn delete(&self, queue: &QueueHandle, receipt_handle: &str) -> Result<(), PipelineError> {
        let mut inner = self.inner.lock().await;
        Self::check_injected(&mut inner)?;
        let name = Self::queue_name(queue).to_string();
        let state = inner
            .queues
            .get_mut(&name)
            .ok_or_else(|| PipelineError::NotFound(format!("queue {}", name)))?;

        // Stale handle (already deleted, or superseded after redelivery) is
        // "already gone", not an error.
        if let Some(index) = state
            .messages
            .iter()
            .position(|m| m.receipt_handle.as_deref() == Some(receipt_handle))
        {
            state.messages.remove(index);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    async fn queue_with(name: &str) -> (InMemoryQueue, QueueHandle) {
        let queue = InMemoryQueue::new();
        let handle = queue.ensure_queue(name).await.unwrap();
        (queue, handle)
    }

    #[tokio::test]
    async fn test_fifo_order_within_group() {
        let (queue, handle) = queue_with("order.fifo").await;
        for key in ["a.jpg", "b.jpg", "c.jpg"] {
            queue
                .send(&handle, "g1", &MessagePayload::data(key).unwrap())
                .await
                .unwrap();
        }
        for expected in ["a.jpg", "b.jpg", "c.jpg"] {
            let message = queue.receive_one(&handle).await.unwrap().unwrap();
            assert_eq!(
                message.payload().unwrap(),
                MessagePayload::data(expected).unwrap()
            );
            queue.delete(&handle, &message.receipt_handle).await.unwrap();
        }
        assert!(queue.receive_one(&handle).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_content_dedup_drops_identical_body() {
        let (queue, handle) = queue_with("dedup.fifo").await;
        let payload = MessagePayload::data("same.jpg").unwrap();
        queue.send(&handle, "g1", &payload).await.unwrap();
        queue.send(&handle, "g1", &payload).await.unwrap();
        assert_eq!(queue.pending_bodies("dedup.fifo").await.len(), 1);
    }

    #[tokio::test]
    async fn test_group_blocked_while_message_in_flight() {
        let (queue, handle) = queue_with("block.fifo").await;
        queue
            .send(&handle, "g1", &MessagePayload::data("a.jpg").unwrap())
            .await
            .unwrap();
        queue
            .send(&handle, "g1", &MessagePayload::data("b.jpg").unwrap())
            .await
            .unwrap();
        let first = queue.receive_one(&handle).await.unwrap().unwrap();
        // b.jpg must not be delivered while a.jpg is unacknowledged
        assert!(queue.receive_one(&handle).await.unwrap().is_none());
        queue.delete(&handle, &first.receipt_handle).await.unwrap();
        let second = queue.receive_one(&handle).await.unwrap().unwrap();
        assert_eq!(
            second.payload().unwrap(),
            MessagePayload::data("b.jpg").unwrap()
        );
    }

    #[tokio::test]
    async fn test_unacknowledged_message_is_redelivered() {
        let queue =
            InMemoryQueue::with_timings(Duration::from_millis(20), Duration::from_secs(300));
        let handle = queue.ensure_queue("redeliver.fifo").await.unwrap();
        queue
            .send(&handle, "g1", &MessagePayload::data("x.jpg").unwrap())
            .await
            .unwrap();

        let first = queue.receive_one(&handle).await.unwrap().unwrap();
        sleep(Duration::from_millis(40)).await;

        let redelivered = queue.receive_one(&handle).await.unwrap().unwrap();
        assert_eq!(redelivered.body, first.body);
        assert_ne!(redelivered.receipt_handle, first.receipt_handle);

        // The superseded handle is stale: deleting through it is a no-op
        queue.delete(&handle, &first.receipt_handle).await.unwrap();
        assert_eq!(queue.pending_bodies("redeliver.fifo").await.len(), 1);
        queue
            .delete(&handle, &redelivered.receipt_handle)
            .await
            .unwrap();
        assert!(queue.pending_bodies("redeliver.fifo").await.is_empty());
    }

    #[tokio::test]
    async fn test_ensure_queue_is_idempotent_across_racers() {
        let queue = InMemoryQueue::new();
        let a = queue.ensure_queue("shared.fifo").await.unwrap();
        let b = queue.ensure_queue("shared.fifo").await.unwrap();
        assert_eq!(a, b);
        queue
            .send(&a, "g1", &MessagePayload::data("k.jpg").unwrap())
            .await
            .unwrap();
        assert!(queue.receive_one(&b).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_find_queue_before_creation() {
        let queue = InMemoryQueue::new();
        assert!(queue.find_queue("missing.fifo").await.unwrap().is_none());
        queue.ensure_queue("missing.fifo").await.unwrap();
        assert!(queue.find_queue("missing.fifo").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_injected_error_fails_once() {
        let (queue, handle) = queue_with("inject.fifo").await;
        queue.inject_transport_error("connection reset").await;
        let err = queue.receive_one(&handle).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(queue.receive_one(&handle).await.is_ok());
    }
}
