// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! vision-relay: a two-stage image pipeline coordinated over a FIFO queue
//!
//! A producer scans an object-store collection, qualifies each image against
//! a label-detection service, and forwards qualifying keys in order over an
//! external ordered queue. An independent consumer (possibly a separate
//! process starting at a different time) receives the keys, extracts text
//! from each image, and writes a report. The queue is the only coordination
//! channel; end-of-stream is a tagged marker message.

pub mod backoff;
pub mod config;
pub mod consumer;
pub mod detection;
pub mod errors;
pub mod producer;
pub mod queue;
pub mod report;
pub mod source;

// Re-export main types
pub use backoff::{Backoff, Deadline};
pub use config::PipelineConfig;
pub use consumer::ConsumerStage;
pub use detection::{
    DetectionGateway, HttpDetectionGateway, Label, MockDetectionGateway, TextToken, TokenKind,
};
pub use errors::PipelineError;
pub use producer::{ProducerStage, ProducerSummary};
pub use queue::{
    HttpQueueGateway, InMemoryQueue, MessagePayload, QueueGateway, QueueHandle, QueueMessage,
};
pub use report::{ExtractedTextMap, FileReportSink, MemoryReportSink, ReportSink};
pub use source::{HttpSourceEnumerator, MockSourceEnumerator, ObjectReference, SourceEnumerator};
