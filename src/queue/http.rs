// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP client for the managed queue service
//!
//! Speaks a small REST protocol: `GET /queues?prefix=` for discovery,
//! `POST /queues` for creation, and per-queue `/messages` endpoints for
//! send, short-poll receive, and delete-by-receipt.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::gateway::{MessagePayload, QueueGateway, QueueHandle, QueueMessage};
use crate::errors::PipelineError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpQueueGateway {
    base_url: String,
    client: Client,
}

#[derive(Serialize)]
struct CreateQueueRequest<'a> {
    name: &'a str,
    fifo: bool,
    content_based_dedup: bool,
}

#[derive(Deserialize)]
struct CreateQueueResponse {
    queue_url: String,
}

#[derive(Deserialize)]
struct ListQueuesResponse {
    queue_urls: Vec<String>,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    group_id: &'a str,
    body: &'a str,
}

#[derive(Deserialize)]
struct ReceivedMessage {
    group_id: String,
    body: String,
    receipt_handle: String,
}

#[derive(Deserialize)]
struct ReceiveMessagesResponse {
    messages: Vec<ReceivedMessage>,
}

impl HttpQueueGateway {
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

    fn transport(context: &str, e: reqwest::Error) -> PipelineError {
        PipelineError::Transport(format!("{}: {}", context, e))
    }

    async fn list_queues(&self, prefix: &str) -> Result<Vec<String>, PipelineError> {
        let response = self
            .client
            .get(format!("{}/queues", self.base_url))
            .query(&[("prefix", prefix)])
            .send()
            .await
            .map_err(|e| Self::transport("list queues", e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Transport(format!(
                "list queues: status {}",
                status
            )));
        }
        let data: ListQueuesResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Validation(format!("list queues response: {}", e)))?;
        Ok(data.queue_urls)
    }
}

#[async_trait]
impl QueueGateway for HttpQueueGateway {
    async fn ensure_queue(&self, name: &str) -> Result<QueueHandle, PipelineError> {
        // Discover first, create on miss; a concurrent creator winning the
        // race surfaces as 409 and resolves back to discovery.
        if let Some(url) = self.list_queues(name).await?.into_iter().next() {
            return Ok(QueueHandle::new(url));
        }
        let response = self
            .client
            .post(format!("{}/queues", self.base_url))
            .json(&CreateQueueRequest {
                name,
                fifo: true,
                content_based_dedup: true,
            })
            .send()
            .await
            .map_err(|e| Self::transport("create queue", e))?;
        let status = response.status();
        if status == StatusCode::CONFLICT {
            return match self.list_queues(name).await?.into_iter().next() {
                Some(url) => Ok(QueueHandle::new(url)),
                None => Err(PipelineError::NotFound(format!(
                    "queue {} reported existing but not listed",
                    name
                ))),
            };
        }
        if !status.is_success() {
            return Err(PipelineError::Transport(format!(
                "create queue: status {}",
                status
            )));
        }
        let data: CreateQueueResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Validation(format!("create queue response: {}", e)))?;
        Ok(QueueHandle::new(data.queue_url))
    }

    async fn find_queue(&self, name: &str) -> Result<Option<QueueHandle>, PipelineError> {
        Ok(self
            .list_queues(name)
            .await?
            .into_iter()
            .next()
            .map(QueueHandle::new))
    }

    async fn send(
        &self,
        queue: &QueueHandle,
        group_id: &str,
        payload: &MessagePayload,
    ) -> Result<(), PipelineError> {
        let body = payload.encode()?;
        let response = self
            .client
            .post(format!("{}/messages", queue.url()))
            .json(&SendMessageRequest {
                group_id,
                body: &body,
            })
            .send()
            .await
            .map_err(|e| Self::transport("send message", e))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(PipelineError::NotFound(format!("queue {}", queue.url())));
        }
        if !status.is_success() {
            return Err(PipelineError::Transport(format!(
                "send message: status {}",
                status
            )));
        }
        Ok(())
    }

    async fn receive_one(&self, queue: &QueueHandle) -> Result<Option<QueueMessage>, PipelineError> {
        let response = self
            .client
            .get(format!("{}/messages", queue.url()))
            .query(&[("max", "1")])
            .send()
            .await
            .map_err(|e| Self::transport("receive message", e))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(PipelineError::NotFound(format!("queue {}", queue.url())));
        }
        if !status.is_success() {
            return Err(PipelineError::Transport(format!(
                "receive message: status {}",
                status
            )));
        }
        let data: ReceiveMessagesResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Validation(format!("receive response: {}", e)))?;
        Ok(data.messages.into_iter().next().map(|m| QueueMessage {
            group_id: m.group_id,
            body: m.body,
            receipt_handle: m.receipt_handle,
        }))
    }

    async fn delete(&self, queue: &QueueHandle, receipt_handle: &str) -> Result<(), PipelineError> {
        let response = self
            .client
            .delete(format!("{}/messages/{}", queue.url(), receipt_handle))
            .send()
            .await
            .map_err(|e| Self::transport("delete message", e))?;
        let status = response.status();
        // 404/410 means the handle is stale and the message already gone
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Ok(());
        }
        if !status.is_success() {
            return Err(PipelineError::Transport(format!(
                "delete message: status {}",
                status
            )));
        }
        Ok(())
    }
}
