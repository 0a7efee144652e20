// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Environment-driven configuration shared by both stages
//!
//! There are no command-line flags; everything is read from the environment
//! (with `.env` support in the binaries) so the two processes can be deployed
//! with nothing but env vars.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Named collection in the object store to scan
    pub collection_id: String,
    /// Logical name of the FIFO queue both stages rendezvous on
    pub queue_name: String,
    /// Fixed FIFO group id; one producer, one group
    pub group_id: String,
    /// Upper bound on objects enumerated per run
    pub max_objects: usize,
    /// Label name an image must carry to qualify (exact match)
    pub label_filter: String,
    /// Minimum confidence passed to label detection
    pub min_confidence: f32,
    /// Path the consumer writes its report to
    pub report_path: String,
    /// Base URL of the managed queue service
    pub queue_service_url: String,
    /// Base URL of the classification service
    pub detection_service_url: String,
    /// Base URL of the object store
    pub storage_service_url: String,
    /// Initial delay for both polling loops
    pub poll_initial: Duration,
    /// Cap on the backed-off polling delay
    pub poll_max: Duration,
    /// Overall deadline for the consumer's two polling loops
    pub consumer_deadline: Duration,
    /// Retry budget for an individual detection call
    pub detect_retries: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            collection_id: "cs643-sp25-project1".to_string(),
            queue_name: "imginfo.fifo".to_string(),
            group_id: "group1".to_string(),
            max_objects: 10,
            label_filter: "Face".to_string(),
            min_confidence: 75.0,
            report_path: "output.txt".to_string(),
            queue_service_url: "http://localhost:9324".to_string(),
            detection_service_url: "http://localhost:9090".to_string(),
            storage_service_url: "http://localhost:9000".to_string(),
            poll_initial: Duration::from_millis(200),
            poll_max: Duration::from_secs(5),
            consumer_deadline: Duration::from_secs(600),
            detect_retries: 2,
        }
    }
}

impl PipelineConfig {
    /// Build a config from the environment, falling back to the defaults above.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let poll_initial_ms = env::var("POLL_INITIAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.poll_initial.as_millis() as u64);
        let poll_max_ms = env::var("POLL_MAX_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.poll_max.as_millis() as u64);
        let deadline_secs = env::var("CONSUMER_DEADLINE_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.consumer_deadline.as_secs());

        Self {
            collection_id: env::var("SOURCE_COLLECTION").unwrap_or(defaults.collection_id),
            queue_name: env::var("QUEUE_NAME").unwrap_or(defaults.queue_name),
            group_id: env::var("MESSAGE_GROUP_ID").unwrap_or(defaults.group_id),
            max_objects: env::var("MAX_OBJECTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_objects),
            label_filter: env::var("LABEL_FILTER").unwrap_or(defaults.label_filter),
            min_confidence: env::var("MIN_CONFIDENCE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.min_confidence),
            report_path: env::var("REPORT_PATH").unwrap_or(defaults.report_path),
            queue_service_url: env::var("QUEUE_SERVICE_URL").unwrap_or(defaults.queue_service_url),
            detection_service_url: env::var("DETECTION_SERVICE_URL")
                .unwrap_or(defaults.detection_service_url),
            storage_service_url: env::var("STORAGE_SERVICE_URL")
                .unwrap_or(defaults.storage_service_url),
            poll_initial: Duration::from_millis(poll_initial_ms),
            poll_max: Duration::from_millis(poll_max_ms),
            consumer_deadline: Duration::from_secs(deadline_secs),
            detect_retries: env::var("DETECT_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.detect_retries),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_deployment_constants() {
        let config = PipelineConfig::default();
        assert_eq!(config.queue_name, "imginfo.fifo");
        assert_eq!(config.group_id, "group1");
        assert_eq!(config.max_objects, 10);
        assert_eq!(config.label_filter, "Face");
        assert_eq!(config.min_confidence, 75.0);
        assert_eq!(config.report_path, "output.txt");
    }
}
