//! File reports written to a report directory
//!
//! Both sinks name the file after the run id, so consecutive runs never
//! overwrite each other.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use super::{ReportError, ReportSink};
use crate::engine::{RequestOutcome, RunSummary};

async fn write_report(dir: &Path, file_name: String, contents: String) -> Result<PathBuf, ReportError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| ReportError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

    let path = dir.join(file_name);
    tokio::fs::write(&path, contents)
        .await
        .map_err(|source| ReportError::Io {
            path: path.clone(),
            source,
        })?;

    info!(path = %path.display(), "Wrote report");
    Ok(path)
}

/// Writes `<dir>/<run_id>.json`
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, summary: &RunSummary) -> PathBuf {
        self.dir.join(format!("{}.json", summary.run_id))
    }
}

#[async_trait]
impl ReportSink for JsonFileSink {
    async fn report(&mut self, summary: &RunSummary) -> Result<(), ReportError> {
        let json = serde_json::to_string_pretty(summary)?;
        write_report(&self.dir, format!("{}.json", summary.run_id), json).await?;
        Ok(())
    }
}

/// Writes `<dir>/<run_id>.xml` in JUnit format
///
/// Each folder becomes a `<testsuite>` and each executed request a
/// `<testcase>`. Failed assertions and transport errors are `<failure>`
/// elements.
#[derive(Debug, Clone)]
pub struct JunitSink {
    dir: PathBuf,
}

impl JunitSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, summary: &RunSummary) -> PathBuf {
        self.dir.join(format!("{}.xml", summary.run_id))
    }
}

#[async_trait]
impl ReportSink for JunitSink {
    async fn report(&mut self, summary: &RunSummary) -> Result<(), ReportError> {
        let xml = render_junit(summary);
        write_report(&self.dir, format!("{}.xml", summary.run_id), xml).await?;
        Ok(())
    }
}

/// Render a summary as JUnit XML
pub fn render_junit(summary: &RunSummary) -> String {
    // Folders in first-seen order
    let mut suites: Vec<(&str, Vec<&RequestOutcome>)> = Vec::new();
    for outcome in &summary.outcomes {
        match suites.iter_mut().find(|(name, _)| *name == outcome.folder) {
            Some((_, cases)) => cases.push(outcome),
            None => suites.push((outcome.folder.as_str(), vec![outcome])),
        }
    }

    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(
        xml,
        "<testsuites name=\"{}\" tests=\"{}\" failures=\"{}\" time=\"{}\">",
        escape(&summary.collection),
        summary.requests_total,
        summary.requests_failed,
        seconds(summary.duration_ms)
    );

    for (folder, cases) in &suites {
        let failures = cases.iter().filter(|c| !c.passed()).count();
        let time: u64 = cases.iter().map(|c| c.latency_ms).sum();
        let _ = writeln!(
            xml,
            "  <testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" time=\"{}\">",
            escape(folder),
            cases.len(),
            failures,
            seconds(time)
        );

        for case in cases {
            let _ = write!(
                xml,
                "    <testcase name=\"{} [{}]\" classname=\"{}\" time=\"{}\"",
                escape(&case.request),
                case.iteration,
                escape(folder),
                seconds(case.latency_ms)
            );

            if case.passed() {
                xml.push_str("/>\n");
                continue;
            }

            xml.push_str(">\n");
            if let Some(err) = &case.error {
                let _ = writeln!(
                    xml,
                    "      <failure message=\"{}\" type=\"transport\"/>",
                    escape(err)
                );
            }
            for verdict in case.verdicts.iter().filter(|v| !v.passed) {
                let _ = writeln!(
                    xml,
                    "      <failure message=\"{}: {}\" type=\"assertion\"/>",
                    escape(&verdict.name),
                    escape(&verdict.message)
                );
            }
            xml.push_str("    </testcase>\n");
        }

        xml.push_str("  </testsuite>\n");
    }

    xml.push_str("</testsuites>\n");
    xml
}

fn seconds(ms: u64) -> String {
    format!("{:.3}", ms as f64 / 1000.0)
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}
