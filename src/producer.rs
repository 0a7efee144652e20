// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Producer stage: scan, qualify, forward
//!
//! Enumerates the collection in listing order, runs label detection on each
//! object, and forwards qualifying keys to the queue under a fixed FIFO
//! group, followed by exactly one end-of-stream marker.
//!
//! Failure policy is two-tier: a detection failure for one object is retried
//! within a bounded budget and then skipped, never aborting the run; an
//! enumeration or queue failure is fatal, but the end-of-stream marker is
//! still attempted so the consumer is not left polling forever.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::backoff::Backoff;
use crate::config::PipelineConfig;
use crate::detection::{DetectionGateway, Label};
use crate::errors::PipelineError;
use crate::queue::{MessagePayload, QueueGateway, QueueHandle};
use crate::source::{ObjectReference, SourceEnumerator};

/// Counters reported after a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProducerSummary {
    /// Objects enumerated
    pub scanned: usize,
    /// Objects forwarded to the queue
    pub matched: usize,
    /// Objects skipped after exhausting the detection retry budget
    pub skipped: usize,
}

pub struct ProducerStage {
    queue: Arc<dyn QueueGateway>,
    source: Arc<dyn SourceEnumerator>,
    detection: Arc<dyn DetectionGateway>,
    config: PipelineConfig,
}

impl ProducerStage {
    pub fn new(
        queue: Arc<dyn QueueGateway>,
        source: Arc<dyn SourceEnumerator>,
        detection: Arc<dyn DetectionGateway>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            queue,
            source,
            detection,
            config,
        }
    }

    pub async fn run(&self) -> Result<ProducerSummary, PipelineError> {
        let queue = self.queue.ensure_queue(&self.config.queue_name).await?;
        info!(queue = %queue.url(), "queue ready");

        let objects = match self
            .source
            .list(&self.config.collection_id, self.config.max_objects)
            .await
        {
            Ok(objects) => objects,
            Err(e) => {
                error!(error = %e, "enumeration failed; signaling end-of-stream before aborting");
                self.send_end_best_effort(&queue).await;
                return Err(e);
            }
        };
        info!(
            collection = %self.config.collection_id,
            count = objects.len(),
            "enumerated collection"
        );

        let mut summary = ProducerSummary::default();
        for object in &objects {
            summary.scanned += 1;
            match self.qualifies(object).await {
                Ok(true) => {
                    let payload = match MessagePayload::data(&object.object_key) {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!(key = %object.object_key, error = %e, "unforwardable key, skipping");
                            summary.skipped += 1;
                            continue;
                        }
                    };
                    if let Err(e) = self
                        .queue
                        .send(&queue, &self.config.group_id, &payload)
                        .await
                    {
                        error!(error = %e, "queue send failed; signaling end-of-stream before aborting");
                        self.send_end_best_effort(&queue).await;
                        return Err(e);
                    }
                    summary.matched += 1;
                    info!(key = %object.object_key, "forwarded qualifying image");
                }
                Ok(false) => {
                    debug!(key = %object.object_key, "no qualifying label");
                }
                Err(e) => {
                    warn!(key = %object.object_key, error = %e, "label detection failed, skipping object");
                    summary.skipped += 1;
                }
            }
        }

        self.queue
            .send(&queue, &self.config.group_id, &MessagePayload::End)
            .await?;
        info!(
            scanned = summary.scanned,
            matched = summary.matched,
            skipped = summary.skipped,
            "scan complete, end-of-stream sent"
        );
        Ok(summary)
    }

    /// Exact string match on label name; the confidence threshold is applied
    /// inside the detection call, not re-checked here.
    async fn qualifies(&self, object: &ObjectReference) -> Result<bool, PipelineError> {
        let labels = self.detect_labels_with_retry(object).await?;
        Ok(labels
            .iter()
            .any(|label| label.name == self.config.label_filter))
    }

    async fn detect_labels_with_retry(
        &self,
        object: &ObjectReference,
    ) -> Result<Vec<Label>, PipelineError> {
        let mut backoff = Backoff::new(self.config.poll_initial, self.config.poll_max);
        let mut attempts = 0;
        loop {
            match self
                .detection
                .detect_labels(object, self.config.min_confidence)
                .await
            {
                Ok(labels) => return Ok(labels),
                Err(e) if e.is_retryable() && attempts < self.config.detect_retries => {
                    attempts += 1;
                    debug!(key = %object.object_key, attempt = attempts, error = %e, "retrying label detection");
                    backoff.wait().await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_end_best_effort(&self, queue: &QueueHandle) {
        if let Err(e) = self
            .queue
            .send(queue, &self.config.group_id, &MessagePayload::End)
            .await
        {
            error!(error = %e, "failed to send end-of-stream marker");
        }
    }
}
