// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Report sink: the consumer's durable output
//!
//! One `<objectKey>:<text>` line per entry, newline-terminated, UTF-8. The
//! accumulated text carries its leading space from the concatenation rule, so
//! a rendered line reads `img1.jpg: Hello`. Keys iterate in lexicographic
//! order (`BTreeMap`), making the report deterministic for a given input.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::errors::PipelineError;

/// Accumulated text per object key, unique keys, sorted iteration.
pub type ExtractedTextMap = BTreeMap<String, String>;

pub trait ReportSink: Send + Sync {
    /// Write the whole report in one shot.
    fn write(&self, entries: &ExtractedTextMap) -> Result<(), PipelineError>;
}

fn render(entries: &ExtractedTextMap) -> String {
    let mut out = String::new();
    for (key, text) in entries {
        out.push_str(key);
        out.push(':');
        out.push_str(text);
        out.push('\n');
    }
    out
}

/// Write-once text file sink.
pub struct FileReportSink {
    path: PathBuf,
}

impl FileReportSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ReportSink for FileReportSink {
    fn write(&self, entries: &ExtractedTextMap) -> Result<(), PipelineError> {
        fs::write(&self.path, render(entries))?;
        Ok(())
    }
}

/// In-memory sink for tests.
#[derive(Default)]
pub struct MemoryReportSink {
    contents: Mutex<Option<String>>,
}

impl MemoryReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The rendered report, if one was written.
    pub fn contents(&self) -> Option<String> {
        self.contents.lock().unwrap().clone()
    }
}

impl ReportSink for MemoryReportSink {
    fn write(&self, entries: &ExtractedTextMap) -> Result<(), PipelineError> {
        *self.contents.lock().unwrap() = Some(render(entries));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ExtractedTextMap {
        let mut entries = ExtractedTextMap::new();
        entries.insert("img2.jpg".to_string(), " Stop".to_string());
        entries.insert("img1.jpg".to_string(), " Hello".to_string());
        entries
    }

    #[test]
    fn test_line_format_and_key_order() {
        assert_eq!(render(&sample()), "img1.jpg: Hello\nimg2.jpg: Stop\n");
    }

    #[test]
    fn test_file_sink_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.txt");
        let sink = FileReportSink::new(&path);
        sink.write(&sample()).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "img1.jpg: Hello\nimg2.jpg: Stop\n");
    }

    #[test]
    fn test_unwritable_path_is_io_error() {
        let sink = FileReportSink::new("/nonexistent-dir/output.txt");
        let err = sink.write(&sample()).unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }
}
