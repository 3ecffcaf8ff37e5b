//! Execution result types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collection::RunOptions;

/// Pass/fail result of one assertion against one response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub name: String,
    pub passed: bool,
    pub message: String,
}

impl Verdict {
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: message.into(),
        }
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            message: message.into(),
        }
    }
}

/// Result of executing one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestOutcome {
    pub folder: String,
    pub request: String,
    /// 1-based iteration this outcome belongs to
    pub iteration: u32,
    pub method: String,
    /// URL after variable substitution
    pub url: String,
    /// Absent when the request never produced a response
    pub status: Option<u16>,
    pub latency_ms: u64,
    pub response_size: usize,
    pub body: String,
    pub verdicts: Vec<Verdict>,
    /// Transport error, if the request failed before a response arrived
    pub error: Option<String>,
}

impl RequestOutcome {
    /// Outcome for a request that failed in transport
    pub fn transport_failure(
        folder: &str,
        request: &str,
        iteration: u32,
        method: &str,
        url: &str,
        latency_ms: u64,
        error: String,
    ) -> Self {
        Self {
            folder: folder.to_string(),
            request: request.to_string(),
            iteration,
            method: method.to_string(),
            url: url.to_string(),
            status: None,
            latency_ms,
            response_size: 0,
            body: String::new(),
            verdicts: Vec::new(),
            error: Some(error),
        }
    }

    /// Response body parsed as JSON, if it is JSON
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.body).ok()
    }

    pub fn failed_assertions(&self) -> usize {
        self.verdicts.iter().filter(|v| !v.passed).count()
    }

    pub fn is_transport_failure(&self) -> bool {
        self.error.is_some()
    }

    pub fn passed(&self) -> bool {
        !self.is_transport_failure() && self.failed_assertions() == 0
    }
}

/// Run lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    /// Every request ran and nothing failed
    Completed,
    /// Stopped early by bail or a fatal error
    Aborted,
    /// Every request ran and something failed
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Aborted | RunState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Aborted => "aborted",
            RunState::Failed => "failed",
        }
    }
}

/// Why a run was aborted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbortReason {
    /// Bail policy triggered by a failed request
    Bail {
        folder: String,
        request: String,
        iteration: u32,
    },
    /// Auth failure stopped the run
    Fatal { error: String },
}

/// Aggregate over every executed request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub collection: String,
    pub environment: Option<String>,
    pub options: RunOptions,
    pub state: RunState,
    pub abort_reason: Option<AbortReason>,
    /// Planned iterations
    pub iterations: u32,
    pub iterations_completed: u32,
    pub requests_total: usize,
    pub requests_failed: usize,
    pub assertions_total: usize,
    pub assertions_failed: usize,
    pub transport_errors: usize,
    pub token_acquisitions: usize,
    /// Outcomes in execution order
    pub outcomes: Vec<RequestOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    pub success: bool,
}

impl RunSummary {
    pub fn new(
        run_id: impl Into<String>,
        collection: impl Into<String>,
        environment: Option<String>,
        options: RunOptions,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            collection: collection.into(),
            environment,
            iterations: options.iterations,
            options,
            state: RunState::Idle,
            abort_reason: None,
            iterations_completed: 0,
            requests_total: 0,
            requests_failed: 0,
            assertions_total: 0,
            assertions_failed: 0,
            transport_errors: 0,
            token_acquisitions: 0,
            outcomes: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
            duration_ms: 0,
            success: false,
        }
    }

    /// Append an outcome and update the counters
    pub fn record(&mut self, outcome: RequestOutcome) {
        self.requests_total += 1;
        self.assertions_total += outcome.verdicts.len();
        self.assertions_failed += outcome.failed_assertions();
        if outcome.is_transport_failure() {
            self.transport_errors += 1;
        }
        if !outcome.passed() {
            self.requests_failed += 1;
        }
        self.outcomes.push(outcome);
    }

    /// Enter a terminal state and freeze timing and the success flag
    pub fn finish(&mut self, state: RunState, abort_reason: Option<AbortReason>) {
        let finished_at = Utc::now();
        self.state = state;
        self.abort_reason = abort_reason;
        self.duration_ms = (finished_at - self.started_at).num_milliseconds().max(0) as u64;
        self.finished_at = Some(finished_at);
        self.success = state == RunState::Completed
            && self.assertions_failed == 0
            && self.transport_errors == 0;
    }

    /// Outcomes that failed, in execution order
    pub fn failures(&self) -> impl Iterator<Item = &RequestOutcome> {
        self.outcomes.iter().filter(|o| !o.passed())
    }
}
