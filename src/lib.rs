//! # API Test Runner
//!
//! A declarative runner for API request collections with OAuth 2.0 token
//! lifecycle management.
//!
//! ## Features
//!
//! - **Declarative YAML collections** - Folders of requests with assertions
//! - **Environments** - `{{name}}` substitution in URLs, headers and bodies
//! - **Token lifecycle** - Bearer tokens acquired once and refreshed near expiry
//! - **Test modes** - Smoke, full and performance presets, overridable in `runner.yaml`
//! - **Reports** - Console, JSON and JUnit XML sinks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use api_test_runner::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let collection_yaml = r#"
//! name: demo
//! folders:
//!   - name: Users
//!     requests:
//!       - name: List users
//!         url: "{{base_url}}/users"
//!         auth: none
//!         assertions:
//!           - status: 200
//! "#;
//!
//!     let collection = CollectionLoader::parse_collection(collection_yaml, "inline")?;
//!     let mut env: Environment = [("base_url", "https://api.example.com")]
//!         .into_iter()
//!         .collect();
//!
//!     let mut sequencer = RunSequencer::new(ConsoleSink::stdout());
//!     let summary = sequencer
//!         .run(&collection, &mut env, &RunOptions::default())
//!         .await?;
//!
//!     println!("Run finished: success={}", summary.success);
//!     Ok(())
//! }
//! ```

pub mod collection;
pub mod engine;
pub mod report;

// Re-export main types
pub use collection::{
    AssertionSpec, AuthMode, Collection, CollectionLoader, ConfigError, Environment, Folder,
    OptionWarning, Request, RunOptions, RunnerConfig, TestMode,
};
pub use engine::{
    AbortReason, AuthError, ClientCredentials, CredentialManager, RequestExecutor,
    RequestOutcome, RunError, RunSequencer, RunState, RunSummary, Token, TransportError, Verdict,
};
pub use report::{
    CollectingSink, ConsoleSink, JsonFileSink, JunitSink, MultiSink, ReportError, ReportSink,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::collection::{
        AssertionSpec, Collection, CollectionLoader, ConfigError, Environment, OptionWarning,
        RunOptions, RunnerConfig, TestMode,
    };
    pub use crate::engine::{
        AuthError, CredentialManager, RequestExecutor, RunError, RunSequencer, RunState,
        RunSummary,
    };
    pub use crate::report::{
        ConsoleSink, JsonFileSink, JunitSink, MultiSink, ReportError, ReportSink,
    };
}
