// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Ordered-message queue gateway
//!
//! The sole coordination channel between the producer and consumer stages:
//! a named FIFO queue with content-based deduplication, at-least-once
//! delivery, and delete-by-receipt acknowledgement.

pub mod gateway;
pub mod http;
pub mod memory;

pub use gateway::{
    MessagePayload, QueueGateway, QueueHandle, QueueMessage, LEGACY_SENTINEL,
};
pub use http::HttpQueueGateway;
pub use memory::InMemoryQueue;
