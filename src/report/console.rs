//! Console report

use std::io::{self, Write};

use async_trait::async_trait;

use super::{ReportError, ReportSink};
use crate::engine::{AbortReason, RequestOutcome, RunSummary};

/// Writes a human readable report to any writer
pub struct ConsoleSink<W: Write + Send> {
    out: W,
    /// Print every outcome, not only failures
    verbose: bool,
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            verbose: false,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn render(&mut self, summary: &RunSummary) -> io::Result<()> {
        let out = &mut self.out;

        writeln!(out, "\n=== Run Result ===\n")?;
        writeln!(out, "Collection: {}", summary.collection)?;
        if let Some(env) = &summary.environment {
            writeln!(out, "Environment: {}", env)?;
        }
        writeln!(out, "Run ID: {}", summary.run_id)?;
        writeln!(out, "State: {}", summary.state.as_str())?;
        writeln!(out, "Success: {}\n", if summary.success { "YES" } else { "NO" })?;

        for outcome in &summary.outcomes {
            if self.verbose || !outcome.passed() {
                write_outcome(out, outcome)?;
            }
        }

        writeln!(
            out,
            "\nIterations: {}/{}",
            summary.iterations_completed, summary.iterations
        )?;
        writeln!(
            out,
            "Requests: {} run, {} failed",
            summary.requests_total, summary.requests_failed
        )?;
        writeln!(
            out,
            "Assertions: {} run, {} failed",
            summary.assertions_total, summary.assertions_failed
        )?;
        writeln!(out, "Transport errors: {}", summary.transport_errors)?;
        writeln!(out, "Token acquisitions: {}", summary.token_acquisitions)?;
        writeln!(out, "Duration: {}ms", summary.duration_ms)?;

        match &summary.abort_reason {
            Some(AbortReason::Bail {
                folder,
                request,
                iteration,
            }) => writeln!(
                out,
                "\nAborted: bail after {} / {} (iteration {})",
                folder, request, iteration
            )?,
            Some(AbortReason::Fatal { error }) => writeln!(out, "\nAborted: {}", error)?,
            None => {}
        }

        out.flush()
    }
}

fn write_outcome<W: Write>(out: &mut W, outcome: &RequestOutcome) -> io::Result<()> {
    let status = if outcome.passed() { "✓" } else { "✗" };
    let code = outcome
        .status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "---".to_string());

    writeln!(
        out,
        "{} [{}] {} / {}  {} {} -> {} ({}ms)",
        status,
        outcome.iteration,
        outcome.folder,
        outcome.request,
        outcome.method,
        outcome.url,
        code,
        outcome.latency_ms
    )?;

    if let Some(err) = &outcome.error {
        writeln!(out, "      Error: {}", err)?;
    }
    for verdict in &outcome.verdicts {
        let mark = if verdict.passed { "✓" } else { "✗" };
        writeln!(out, "    {} {}: {}", mark, verdict.name, verdict.message)?;
    }
    Ok(())
}

#[async_trait]
impl<W: Write + Send> ReportSink for ConsoleSink<W> {
    async fn report(&mut self, summary: &RunSummary) -> Result<(), ReportError> {
        self.render(summary).map_err(|source| ReportError::Io {
            path: "<console>".into(),
            source,
        })
    }
}
