//! Run sequencer - drives a collection run from start to finish
//!
//! Requests run strictly one at a time, in collection order (folder order,
//! then request order), repeated for every iteration. Each request obtains a
//! valid token if it needs one, is executed, and has its assertions
//! evaluated before the next one starts.
//!
//! State machine:
//!
//! ```text
//! Idle -> Running -> Completed   (everything ran, nothing failed)
//!                 -> Failed      (everything ran, something failed)
//!                 -> Aborted     (bail, or an auth error)
//! ```
//!
//! The summary is handed to the report sink exactly once, when the run
//! enters a terminal state.

use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use super::assertions;
use super::credentials::CredentialManager;
use super::error::{AuthError, RunError};
use super::executor::RequestExecutor;
use super::result::{AbortReason, RequestOutcome, RunState, RunSummary};
use crate::collection::{Collection, Environment, Folder, Request, RunOptions};
use crate::report::ReportSink;

/// Executes collections and reports each run to its sink
pub struct RunSequencer<S: ReportSink> {
    executor: RequestExecutor,
    credentials: CredentialManager,
    sink: S,
    state: RunState,
}

impl<S: ReportSink> RunSequencer<S> {
    pub fn new(sink: S) -> Self {
        Self::with_parts(RequestExecutor::new(), CredentialManager::new(), sink)
    }

    pub fn with_parts(executor: RequestExecutor, credentials: CredentialManager, sink: S) -> Self {
        Self {
            executor,
            credentials,
            sink,
            state: RunState::Idle,
        }
    }

    /// State of the current or most recent run
    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Execute the selected folders of `collection` `options.iterations` times
    ///
    /// Returns the summary for runs that reach `Completed`, `Failed`, or an
    /// `Aborted` caused by bail. An auth error aborts the run, reports the
    /// partial summary, and is returned as `RunError::Auth`. Invalid options
    /// are rejected before the run starts; the sequencer stays `Idle` and
    /// nothing is reported.
    #[instrument(skip_all, fields(collection = %collection.name))]
    pub async fn run(
        &mut self,
        collection: &Collection,
        env: &mut Environment,
        options: &RunOptions,
    ) -> Result<RunSummary, RunError> {
        self.state = RunState::Idle;
        self.credentials.reset();

        options.validate(collection)?;

        let selected: Vec<(&Folder, &Request)> = collection
            .folders
            .iter()
            .filter(|folder| options.selects(&folder.name))
            .flat_map(|folder| folder.requests.iter().map(move |request| (folder, request)))
            .collect();

        let run_id = uuid::Uuid::new_v4().to_string();
        let mut summary = RunSummary::new(
            run_id.clone(),
            collection.name.clone(),
            env.name.clone(),
            options.clone(),
        );

        self.state = RunState::Running;
        info!(
            run_id = %run_id,
            requests = selected.len(),
            iterations = options.iterations,
            "Starting run"
        );

        let timeout = Duration::from_millis(options.timeout_ms);
        let delay = Duration::from_millis(options.delay_ms);
        let total_steps = selected.len() * options.iterations as usize;
        let mut step = 0usize;
        let mut abort_reason = None;
        let mut fatal = None;

        'outer: for iteration in 1..=options.iterations {
            debug!(iteration, "Starting iteration");

            for (folder, request) in &selected {
                step += 1;

                match self.execute_one(folder, request, iteration, env, timeout).await {
                    Ok(outcome) => {
                        let failed = !outcome.passed();
                        summary.record(outcome);

                        if failed && options.bail {
                            warn!(
                                folder = %folder.name,
                                request = %request.name,
                                iteration,
                                "Request failed, bailing out"
                            );
                            abort_reason = Some(AbortReason::Bail {
                                folder: folder.name.clone(),
                                request: request.name.clone(),
                                iteration,
                            });
                            break 'outer;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, request = %request.name, "Aborting run");
                        abort_reason = Some(AbortReason::Fatal {
                            error: e.to_string(),
                        });
                        fatal = Some(e);
                        break 'outer;
                    }
                }

                if !delay.is_zero() && step < total_steps {
                    tokio::time::sleep(delay).await;
                }
            }

            summary.iterations_completed = iteration;
        }

        summary.token_acquisitions = self.credentials.acquisitions();

        let state = match (&abort_reason, summary.requests_failed) {
            (Some(_), _) => RunState::Aborted,
            (None, 0) => RunState::Completed,
            (None, _) => RunState::Failed,
        };
        self.state = state;
        summary.finish(state, abort_reason);

        info!(
            run_id = %summary.run_id,
            state = state.as_str(),
            requests = summary.requests_total,
            failed = summary.requests_failed,
            duration_ms = summary.duration_ms,
            "Run finished"
        );

        if let Err(e) = self.sink.report(&summary).await {
            warn!(error = %e, "Failed to report run summary");
        }

        match fatal {
            Some(e) => Err(RunError::Auth(e)),
            None => Ok(summary),
        }
    }

    /// Run one request: token, execution, assertions
    ///
    /// Transport errors become a failed outcome; only auth errors escape.
    async fn execute_one(
        &mut self,
        folder: &Folder,
        request: &Request,
        iteration: u32,
        env: &mut Environment,
        timeout: Duration,
    ) -> Result<RequestOutcome, AuthError> {
        let token = if request.needs_token() {
            Some(self.credentials.token_for(env).await?)
        } else {
            None
        };

        let prepared = self.executor.prepare(request, env, token.as_ref())?;

        let start = Instant::now();
        let mut outcome = match self.executor.send(&prepared, timeout).await {
            Ok(response) => response.into_outcome(&folder.name, &request.name, iteration),
            Err(e) => {
                return Ok(RequestOutcome::transport_failure(
                    &folder.name,
                    &request.name,
                    iteration,
                    &prepared.method,
                    &prepared.url,
                    start.elapsed().as_millis() as u64,
                    e.to_string(),
                ))
            }
        };

        outcome.verdicts = assertions::evaluate(&outcome, &request.assertions);
        if !outcome.passed() {
            debug!(
                request = %request.name,
                failed = outcome.failed_assertions(),
                "Assertions failed"
            );
        }
        Ok(outcome)
    }
}
