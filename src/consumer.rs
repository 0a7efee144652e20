// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Consumer stage: receive, extract, report
//!
//! State machine: WAITING_FOR_QUEUE -> RECEIVING -> DONE. The stage first
//! polls for queue existence (the producer may not have started yet), then
//! drains messages in order, running text detection on each referenced
//! object, and terminates when it observes the end-of-stream marker. Both
//! polling loops use bounded jittered backoff under one overall deadline.
//!
//! Per-item policy: a text-detection failure is retried within the bounded
//! budget, then recorded as "no text found"; the message is deleted either
//! way so one bad item never blocks the stream. Queue and report-sink
//! failures are fatal. Redelivered messages overwrite the same map entry,
//! so processing is idempotent.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backoff::{Backoff, Deadline};
use crate::config::PipelineConfig;
use crate::detection::{DetectionGateway, TokenKind};
use crate::errors::PipelineError;
use crate::queue::{MessagePayload, QueueGateway, QueueHandle};
use crate::report::{ExtractedTextMap, ReportSink};
use crate::source::ObjectReference;

pub struct ConsumerStage {
    queue: Arc<dyn QueueGateway>,
    detection: Arc<dyn DetectionGateway>,
    report: Arc<dyn ReportSink>,
    config: PipelineConfig,
}

impl ConsumerStage {
    pub fn new(
        queue: Arc<dyn QueueGateway>,
        detection: Arc<dyn DetectionGateway>,
        report: Arc<dyn ReportSink>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            queue,
            detection,
            report,
            config,
        }
    }

    /// Run to completion: returns the extracted text after writing the
    /// report. The accumulator is moved out, leaving the stage empty-handed.
    pub async fn run(&self) -> Result<ExtractedTextMap, PipelineError> {
        let deadline = Deadline::after(self.config.consumer_deadline);
        let queue = self.wait_for_queue(&deadline).await?;
        let extracted = self.receive_loop(&queue, &deadline).await?;
        self.report.write(&extracted)?;
        info!(entries = extracted.len(), "report written");
        Ok(extracted)
    }

    /// WAITING_FOR_QUEUE: poll discovery until the producer's queue appears.
    async fn wait_for_queue(&self, deadline: &Deadline) -> Result<QueueHandle, PipelineError> {
        let mut backoff = Backoff::new(self.config.poll_initial, self.config.poll_max);
        loop {
            match self.queue.find_queue(&self.config.queue_name).await {
                Ok(Some(handle)) => {
                    info!(queue = %handle.url(), "queue discovered");
                    return Ok(handle);
                }
                Ok(None) => {
                    debug!(queue = %self.config.queue_name, "queue not visible yet");
                }
                Err(e) if e.is_retryable() => {
                    warn!(error = %e, "queue discovery failed, will retry");
                }
                Err(e) => return Err(e),
            }
            if deadline.expired() {
                return Err(PipelineError::NotFound(format!(
                    "queue {} did not appear within the deadline",
                    self.config.queue_name
                )));
            }
            backoff.wait().await;
        }
    }

    /// RECEIVING: drain messages in order until the end-of-stream marker.
    async fn receive_loop(
        &self,
        queue: &QueueHandle,
        deadline: &Deadline,
    ) -> Result<ExtractedTextMap, PipelineError> {
        let mut extracted = ExtractedTextMap::new();
        let mut backoff = Backoff::new(self.config.poll_initial, self.config.poll_max);
        loop {
            let message = match self.queue.receive_one(queue).await {
                Ok(Some(message)) => message,
                Ok(None) => {
                    if deadline.expired() {
                        return Err(PipelineError::NotFound(
                            "end-of-stream not observed within the deadline".to_string(),
                        ));
                    }
                    backoff.wait().await;
                    continue;
                }
                Err(e) if e.is_retryable() => {
                    warn!(error = %e, "receive failed, will retry");
                    if deadline.expired() {
                        return Err(e);
                    }
                    backoff.wait().await;
                    continue;
                }
                Err(e) => return Err(e),
            };
            backoff.reset();

            match message.payload()? {
                MessagePayload::End => {
                    self.queue.delete(queue, &message.receipt_handle).await?;
                    info!("end-of-stream observed");
                    return Ok(extracted);
                }
                MessagePayload::Data { object_key } => {
                    if let Some(text) = self.extract_text(&object_key).await {
                        debug!(key = %object_key, "recognized text stored");
                        // Overwrite on redelivery keeps accumulation idempotent
                        extracted.insert(object_key, text);
                    }
                    self.queue.delete(queue, &message.receipt_handle).await?;
                }
            }
        }
    }

    /// Word tokens joined with a leading space each; `None` when the image
    /// yields no words or detection fails beyond the retry budget.
    async fn extract_text(&self, object_key: &str) -> Option<String> {
        let object = ObjectReference::new(&self.config.collection_id, object_key);
        let tokens = match self.detect_text_with_retry(&object).await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(key = %object_key, error = %e, "text detection failed, recording no text");
                return None;
            }
        };
        let mut text = String::new();
        for token in tokens.iter().filter(|t| t.kind == TokenKind::Word) {
            text.push(' ');
            text.push_str(&token.text);
        }
        (!text.is_empty()).then_some(text)
    }

    async fn detect_text_with_retry(
        &self,
        object: &ObjectReference,
    ) -> Result<Vec<crate::detection::TextToken>, PipelineError> {
        let mut backoff = Backoff::new(self.config.poll_initial, self.config.poll_max);
        let mut attempts = 0;
        loop {
            match self.detection.detect_text(object).await {
                Ok(tokens) => return Ok(tokens),
                Err(e) if e.is_retryable() && attempts < self.config.detect_retries => {
                    attempts += 1;
                    debug!(key = %object.object_key, attempt = attempts, error = %e, "retrying text detection");
                    backoff.wait().await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{MockDetectionGateway, TextToken};
    use crate::queue::InMemoryQueue;
    use crate::report::MemoryReportSink;
    use std::time::Duration;

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            poll_initial: Duration::from_millis(1),
            poll_max: Duration::from_millis(5),
            consumer_deadline: Duration::from_secs(5),
            ..PipelineConfig::default()
        }
    }

    fn stage(
        queue: InMemoryQueue,
        detection: MockDetectionGateway,
        report: Arc<MemoryReportSink>,
    ) -> ConsumerStage {
        ConsumerStage::new(
            Arc::new(queue),
            Arc::new(detection),
            report,
            test_config(),
        )
    }

    async fn seed(queue: &InMemoryQueue, keys: &[&str], end: bool) {
        let handle = queue.ensure_queue("imginfo.fifo").await.unwrap();
        for key in keys {
            queue
                .send(&handle, "group1", &MessagePayload::data(*key).unwrap())
                .await
                .unwrap();
        }
        if end {
            queue
                .send(&handle, "group1", &MessagePayload::End)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_word_tokens_concatenated_with_leading_spaces() {
        let queue = InMemoryQueue::new();
        seed(&queue, &["img.jpg"], true).await;
        let detection = MockDetectionGateway::new();
        detection
            .set_tokens(
                "img.jpg",
                vec![
                    TextToken::word("Hello"),
                    TextToken::line("title"),
                    TextToken::word("World"),
                ],
            )
            .await;
        let report = Arc::new(MemoryReportSink::new());

        let extracted = stage(queue, detection, report.clone()).run().await.unwrap();
        assert_eq!(extracted.get("img.jpg").map(String::as_str), Some(" Hello World"));
        assert_eq!(report.contents().unwrap(), "img.jpg: Hello World\n");
    }

    #[tokio::test]
    async fn test_no_word_tokens_stores_nothing() {
        let queue = InMemoryQueue::new();
        seed(&queue, &["lines.jpg"], true).await;
        let detection = MockDetectionGateway::new();
        detection
            .set_tokens("lines.jpg", vec![TextToken::line("only a line")])
            .await;
        let report = Arc::new(MemoryReportSink::new());

        let extracted = stage(queue, detection, report.clone()).run().await.unwrap();
        assert!(extracted.is_empty());
        assert_eq!(report.contents().unwrap(), "");
    }

    #[tokio::test]
    async fn test_detection_failure_treated_as_no_text_and_message_deleted() {
        let queue = InMemoryQueue::new();
        seed(&queue, &["broken.jpg", "ok.jpg"], true).await;
        let detection = MockDetectionGateway::new();
        detection.fail_text("broken.jpg", u32::MAX).await;
        detection
            .set_tokens("ok.jpg", vec![TextToken::word("Stop")])
            .await;
        let report = Arc::new(MemoryReportSink::new());

        let extracted = stage(queue.clone(), detection, report).run().await.unwrap();
        assert_eq!(extracted.len(), 1);
        assert_eq!(extracted.get("ok.jpg").map(String::as_str), Some(" Stop"));
        assert!(queue.pending_bodies("imginfo.fifo").await.is_empty());
    }

    #[tokio::test]
    async fn test_terminates_only_on_end_marker() {
        let queue = InMemoryQueue::new();
        let handle = queue.ensure_queue("imginfo.fifo").await.unwrap();
        let detection = MockDetectionGateway::new();
        detection
            .set_tokens("late.jpg", vec![TextToken::word("Go")])
            .await;
        let report = Arc::new(MemoryReportSink::new());
        let consumer = stage(queue.clone(), detection, report);

        // Feed the queue only after the consumer is already polling
        let feeder = {
            let queue = queue.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                queue
                    .send(&handle, "group1", &MessagePayload::data("late.jpg").unwrap())
                    .await
                    .unwrap();
                tokio::time::sleep(Duration::from_millis(50)).await;
                queue
                    .send(&handle, "group1", &MessagePayload::End)
                    .await
                    .unwrap();
            })
        };

        let extracted = consumer.run().await.unwrap();
        feeder.await.unwrap();
        assert_eq!(extracted.len(), 1);
    }

    #[tokio::test]
    async fn test_deadline_expires_without_end_marker() {
        let queue = InMemoryQueue::new();
        seed(&queue, &[], false).await;
        let detection = MockDetectionGateway::new();
        let report = Arc::new(MemoryReportSink::new());
        let consumer = ConsumerStage::new(
            Arc::new(queue),
            Arc::new(detection),
            report,
            PipelineConfig {
                poll_initial: Duration::from_millis(1),
                poll_max: Duration::from_millis(5),
                consumer_deadline: Duration::from_millis(50),
                ..PipelineConfig::default()
            },
        );
        let err = consumer.run().await.unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_waiting_for_missing_queue_expires_with_not_found() {
        let queue = InMemoryQueue::new();
        let detection = MockDetectionGateway::new();
        let report = Arc::new(MemoryReportSink::new());
        let consumer = ConsumerStage::new(
            Arc::new(queue),
            Arc::new(detection),
            report,
            PipelineConfig {
                poll_initial: Duration::from_millis(1),
                poll_max: Duration::from_millis(5),
                consumer_deadline: Duration::from_millis(50),
                ..PipelineConfig::default()
            },
        );
        let err = consumer.run().await.unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_redelivered_message_is_idempotent() {
        // Tiny visibility window: the first receive's claim expires before
        // deletion, so the same message is processed twice.
        let queue =
            InMemoryQueue::with_timings(Duration::from_millis(1), Duration::from_secs(300));
        let handle = queue.ensure_queue("imginfo.fifo").await.unwrap();
        queue
            .send(&handle, "group1", &MessagePayload::data("dup.jpg").unwrap())
            .await
            .unwrap();
        let detection = MockDetectionGateway::new();
        detection
            .set_tokens("dup.jpg", vec![TextToken::word("Same")])
            .await;
        let report = Arc::new(MemoryReportSink::new());
        let consumer = stage(queue.clone(), detection, report);

        // First delivery processed out-of-band without acknowledgement
        let first = queue.receive_one(&handle).await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        queue
            .send(&handle, "group1", &MessagePayload::End)
            .await
            .unwrap();
        let extracted = consumer.run().await.unwrap();
        assert_eq!(extracted.len(), 1);
        assert_eq!(extracted.get("dup.jpg").map(String::as_str), Some(" Same"));
        // Stale handle from the expired first delivery: no-op
        queue.delete(&handle, &first.receipt_handle).await.unwrap();
    }
}
