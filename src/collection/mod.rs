//! Collection types and definitions
//!
//! This module contains all types describing what a run executes:
//! - `model` - Collection, Folder, Request and assertion declarations
//! - `environment` - Environment variables and their file formats
//! - `template` - `{{name}}` substitution
//! - `loader` - Load and validate collection and environment files
//! - `run_options` - Run options, test modes and `runner.yaml`

pub mod environment;
pub mod loader;
pub mod model;
pub mod run_options;
pub mod template;

pub use environment::{
    Environment, EnvironmentEntry, EnvironmentFile, ACCESS_TOKEN_VAR, TOKEN_EXPIRES_AT_VAR,
    TOKEN_TYPE_VAR,
};
pub use loader::{CollectionLoader, ConfigError};
pub use model::{AssertionSpec, AuthMode, Collection, Folder, Request};
pub use run_options::{
    OptionWarning, OptionsOverlay, RunOptions, RunnerConfig, TestMode, SMOKE_FOLDERS,
};
pub use template::{substitute, TemplateError};
