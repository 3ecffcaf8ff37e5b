//! Run options and runner configuration
//!
//! Options are assembled in layers: built-in defaults, the `defaults:`
//! section of `runner.yaml`, the selected test mode, then command-line
//! overrides.
//!
//! ```yaml
//! # runner.yaml
//! defaults:
//!   timeout_ms: 10000
//!   delay_ms: 500
//!
//! modes:
//!   smoke:
//!     folder_filter: ["Authentication", "Profile & User Info"]
//!   performance:
//!     iterations: 25
//!     delay_ms: 100
//! ```
//!
//! Keys that are not recognized are reported as [`OptionWarning`]s instead of
//! being carried along silently.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::loader::ConfigError;
use super::model::Collection;

/// Folders the smoke mode runs
pub const SMOKE_FOLDERS: [&str; 2] = ["Authentication", "Profile & User Info"];

const PERFORMANCE_ITERATIONS: u32 = 10;
const PERFORMANCE_DELAY_MS: u64 = 250;

/// Fully resolved options for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    /// How many times the whole selected set repeats
    pub iterations: u32,
    /// Pause between requests
    pub delay_ms: u64,
    /// Per-request deadline
    pub timeout_ms: u64,
    /// Abort the whole run on the first failure
    pub bail: bool,
    /// Restrict the run to these folders; `None` runs every folder
    pub folder_filter: Option<BTreeSet<String>>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            iterations: 1,
            delay_ms: 1000,
            timeout_ms: 30000,
            bail: false,
            folder_filter: None,
        }
    }
}

impl RunOptions {
    /// Restrict the run to the given folder names
    pub fn with_folders<I, S>(mut self, folders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.folder_filter = Some(folders.into_iter().map(Into::into).collect());
        self
    }

    /// Whether a folder is part of the selection
    pub fn selects(&self, folder: &str) -> bool {
        self.folder_filter
            .as_ref()
            .map(|filter| filter.contains(folder))
            .unwrap_or(true)
    }

    /// Reject values that cannot describe a run
    pub fn validate(&self, collection: &Collection) -> Result<(), ConfigError> {
        if self.iterations == 0 {
            return Err(ConfigError::InvalidOption(
                "iterations must be a positive integer".to_string(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::InvalidOption(
                "timeout_ms must be positive".to_string(),
            ));
        }
        if let Some(filter) = &self.folder_filter {
            if filter.is_empty() {
                return Err(ConfigError::InvalidOption(
                    "folder_filter must name at least one folder".to_string(),
                ));
            }
            for name in filter {
                if collection.folder(name).is_none() {
                    return Err(ConfigError::UnknownFolder(name.clone()));
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Partial options
// ============================================================================

/// A partial set of options, as written in `runner.yaml`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OptionsOverlay {
    #[serde(default)]
    pub iterations: Option<u32>,

    #[serde(default, alias = "delayMs")]
    pub delay_ms: Option<u64>,

    #[serde(default, alias = "timeoutMs")]
    pub timeout_ms: Option<u64>,

    #[serde(default)]
    pub bail: Option<bool>,

    #[serde(default, alias = "folderFilter")]
    pub folder_filter: Option<Vec<String>>,

    /// Anything else; reported, never applied
    #[serde(flatten)]
    pub unrecognized: BTreeMap<String, serde_yaml::Value>,
}

impl OptionsOverlay {
    /// Apply every field that is set
    pub fn apply(&self, options: &mut RunOptions) {
        if let Some(iterations) = self.iterations {
            options.iterations = iterations;
        }
        if let Some(delay_ms) = self.delay_ms {
            options.delay_ms = delay_ms;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            options.timeout_ms = timeout_ms;
        }
        if let Some(bail) = self.bail {
            options.bail = bail;
        }
        if let Some(folders) = &self.folder_filter {
            options.folder_filter = Some(folders.iter().cloned().collect());
        }
    }

    /// Warnings for keys that were not recognized
    pub fn warnings(&self, scope: &str) -> Vec<OptionWarning> {
        self.unrecognized
            .keys()
            .map(|key| OptionWarning::UnrecognizedKey {
                scope: scope.to_string(),
                key: key.clone(),
            })
            .collect()
    }
}

/// A non-fatal problem found while assembling options
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionWarning {
    UnrecognizedKey { scope: String, key: String },
}

impl fmt::Display for OptionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionWarning::UnrecognizedKey { scope, key } => {
                write!(f, "unrecognized option '{}' in {}", key, scope)
            }
        }
    }
}

// ============================================================================
// Test modes
// ============================================================================

/// Named selection of folders and pacing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestMode {
    /// Authentication and profile folders only
    Smoke,
    /// Every folder, once
    Full,
    /// Every folder, repeated with a short delay
    Performance,
}

impl TestMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestMode::Smoke => "smoke",
            TestMode::Full => "full",
            TestMode::Performance => "performance",
        }
    }

    /// Built-in preset for the mode
    pub fn preset(&self) -> OptionsOverlay {
        match self {
            TestMode::Smoke => OptionsOverlay {
                folder_filter: Some(SMOKE_FOLDERS.iter().map(|s| s.to_string()).collect()),
                ..Default::default()
            },
            TestMode::Full => OptionsOverlay::default(),
            TestMode::Performance => OptionsOverlay {
                iterations: Some(PERFORMANCE_ITERATIONS),
                delay_ms: Some(PERFORMANCE_DELAY_MS),
                ..Default::default()
            },
        }
    }
}

impl fmt::Display for TestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "smoke" => Ok(TestMode::Smoke),
            "full" => Ok(TestMode::Full),
            "performance" => Ok(TestMode::Performance),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

// ============================================================================
// runner.yaml
// ============================================================================

/// Contents of `runner.yaml`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunnerConfig {
    /// Applied to every mode
    #[serde(default)]
    pub defaults: OptionsOverlay,

    /// Per-mode overrides, layered on top of the built-in presets
    #[serde(default)]
    pub modes: HashMap<TestMode, OptionsOverlay>,
}

impl RunnerConfig {
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|error| ConfigError::Parse {
            file: path.display().to_string(),
            error,
        })
    }

    /// Resolve the options for a mode, with any warnings found on the way
    pub fn options_for(&self, mode: TestMode) -> (RunOptions, Vec<OptionWarning>) {
        let mut options = RunOptions::default();
        let mut warnings = self.defaults.warnings("defaults");

        self.defaults.apply(&mut options);
        mode.preset().apply(&mut options);

        if let Some(overlay) = self.modes.get(&mode) {
            warnings.extend(overlay.warnings(&format!("modes.{}", mode)));
            overlay.apply(&mut options);
        }

        (options, warnings)
    }
}
