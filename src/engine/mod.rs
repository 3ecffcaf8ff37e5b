//! Run engine module
//!
//! This module contains:
//! - `sequencer` - The run state machine
//! - `executor` - Template resolution and HTTP execution of one request
//! - `credentials` - OAuth 2.0 token acquisition and caching
//! - `assertions` - Assertion evaluation
//! - `error` - Auth, transport and run error types
//! - `result` - Outcome, state and summary types

pub mod assertions;
pub mod credentials;
pub mod error;
pub mod executor;
pub mod result;
pub mod sequencer;

pub use assertions::evaluate;
pub use credentials::{
    parse_token_response, ClientCredentials, CredentialManager, Grant, Token,
    DEFAULT_EXPIRY_MARGIN,
};
pub use error::{AuthError, ExecuteError, RunError, TransportError};
pub use executor::{HttpResponse, PreparedBody, PreparedRequest, RequestExecutor};
pub use result::{AbortReason, RequestOutcome, RunState, RunSummary, Verdict};
pub use sequencer::RunSequencer;
