// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shared error taxonomy for both pipeline stages

use thiserror::Error;

/// Errors surfaced by the gateways and stages
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Network or service call failed; safe to retry
    #[error("Transport error: {0}")]
    Transport(String),

    /// Queue or object missing; during startup this usually means the
    /// producer has not created the queue yet
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed payload or response
    #[error("Validation error: {0}")]
    Validation(String),

    /// Report sink unwritable
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Transport failures may be retried within a bounded budget;
    /// everything else is terminal for the operation that raised it.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_is_retryable() {
        assert!(PipelineError::Transport("connection reset".to_string()).is_retryable());
        assert!(!PipelineError::NotFound("queue".to_string()).is_retryable());
        assert!(!PipelineError::Validation("bad body".to_string()).is_retryable());
        let io = PipelineError::from(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert!(!io.is_retryable());
    }
}
