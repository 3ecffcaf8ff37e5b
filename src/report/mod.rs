//! Report sinks
//!
//! A sink receives the finished `RunSummary` exactly once and renders it.
//! Renders are derived purely from the summary, so any sink can be swapped
//! for another without touching the run.
//!
//! - `console` - human readable output with ✓/✗ markers
//! - `file` - JSON and JUnit XML files in a report directory

pub mod console;
pub mod file;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::engine::RunSummary;

pub use console::ConsoleSink;
pub use file::{JsonFileSink, JunitSink};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Failed to write report {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Receives the summary of a finished run
#[async_trait]
pub trait ReportSink: Send {
    async fn report(&mut self, summary: &RunSummary) -> Result<(), ReportError>;
}

#[async_trait]
impl<T: ReportSink + ?Sized> ReportSink for Box<T> {
    async fn report(&mut self, summary: &RunSummary) -> Result<(), ReportError> {
        (**self).report(summary).await
    }
}

/// Forwards the summary to every inner sink
///
/// Every sink is called even if an earlier one fails; the first error is
/// returned.
#[derive(Default)]
pub struct MultiSink {
    sinks: Vec<Box<dyn ReportSink>>,
}

impl MultiSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl ReportSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn push(&mut self, sink: Box<dyn ReportSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl ReportSink for MultiSink {
    async fn report(&mut self, summary: &RunSummary) -> Result<(), ReportError> {
        let mut first_error = None;
        for sink in &mut self.sinks {
            if let Err(e) = sink.report(summary).await {
                tracing::warn!(error = %e, "Report sink failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Keeps every summary it receives in memory
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    pub summaries: Vec<RunSummary>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&RunSummary> {
        self.summaries.last()
    }
}

#[async_trait]
impl ReportSink for CollectingSink {
    async fn report(&mut self, summary: &RunSummary) -> Result<(), ReportError> {
        self.summaries.push(summary.clone());
        Ok(())
    }
}

/// Discards every summary
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl ReportSink for NullSink {
    async fn report(&mut self, _summary: &RunSummary) -> Result<(), ReportError> {
        Ok(())
    }
}
