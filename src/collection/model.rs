//! Collection, Folder, Request and assertion declarations
//!
//! A collection is plain declarative data. It is loaded once at the start of
//! a run and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Collection
// ============================================================================

/// An ordered set of folders, each holding an ordered set of requests
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Collection {
    /// Collection name (required)
    pub name: String,

    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,

    /// Folders in execution order
    #[serde(default)]
    pub folders: Vec<Folder>,
}

impl Collection {
    /// Look up a folder by its exact name
    pub fn folder(&self, name: &str) -> Option<&Folder> {
        self.folders.iter().find(|f| f.name == name)
    }

    /// Names of all folders, in collection order
    pub fn folder_names(&self) -> Vec<&str> {
        self.folders.iter().map(|f| f.name.as_str()).collect()
    }

    /// Total number of requests across every folder
    pub fn request_count(&self) -> usize {
        self.folders.iter().map(|f| f.requests.len()).sum()
    }
}

/// A named, selectable group of requests
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Folder {
    pub name: String,

    #[serde(default)]
    pub requests: Vec<Request>,
}

// ============================================================================
// Request
// ============================================================================

/// How a request is authorized
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Attach the run's OAuth bearer token (default)
    #[default]
    Bearer,
    /// Send without an Authorization header and without acquiring a token
    None,
}

/// A single HTTP request definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    /// Human-readable name, used in reports
    pub name: String,

    /// HTTP method (GET, POST, ...)
    #[serde(default = "default_method")]
    pub method: String,

    /// URL template, may reference `{{variables}}`
    pub url: String,

    /// Header templates
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Raw body template
    #[serde(default)]
    pub body: Option<String>,

    /// Form-encoded body; values are templates
    #[serde(default)]
    pub form: Option<BTreeMap<String, String>>,

    #[serde(default)]
    pub auth: AuthMode,

    /// Marks a token-issuance request. These never get a bearer token
    /// attached and never trigger token acquisition.
    #[serde(default)]
    pub token_request: bool,

    /// Checks run against the response, in declaration order.
    /// Each entry is a single-key map such as `status: 200`.
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub assertions: Vec<AssertionSpec>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl Request {
    /// Whether the sequencer must obtain a bearer token before sending
    pub fn needs_token(&self) -> bool {
        !self.token_request && self.auth == AuthMode::Bearer
    }
}

// ============================================================================
// Assertions
// ============================================================================

/// A declared check against a request outcome
///
/// ```yaml
/// assertions:
///   - status: 200
///   - status_range: { min: 200, max: 299 }
///   - json_field: data.id
///   - json_equals: { path: token_type, value: Bearer }
///   - max_response_ms: 1500
///   - body_contains: "ok"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum AssertionSpec {
    /// Status code equals the given value
    Status(u16),

    /// Status code within an inclusive range
    StatusRange { min: u16, max: u16 },

    /// A JSON field exists at the dotted path
    JsonField(String),

    /// The JSON value at `path` equals `value`
    JsonEquals {
        path: String,
        value: serde_json::Value,
    },

    /// Response time at or below the ceiling
    MaxResponseMs(u64),

    /// Raw body contains the substring
    BodyContains(String),
}

impl AssertionSpec {
    /// Short label used as the verdict name
    pub fn label(&self) -> String {
        match self {
            AssertionSpec::Status(code) => format!("status is {}", code),
            AssertionSpec::StatusRange { min, max } => format!("status in {}..={}", min, max),
            AssertionSpec::JsonField(path) => format!("json field '{}' present", path),
            AssertionSpec::JsonEquals { path, value } => {
                format!("json field '{}' equals {}", path, value)
            }
            AssertionSpec::MaxResponseMs(ms) => format!("response time <= {}ms", ms),
            AssertionSpec::BodyContains(text) => format!("body contains '{}'", text),
        }
    }

    /// Check the declaration itself; problems are configuration errors
    pub fn validate(&self) -> Result<(), String> {
        match self {
            AssertionSpec::Status(code) => check_status_code(*code),
            AssertionSpec::StatusRange { min, max } => {
                check_status_code(*min)?;
                check_status_code(*max)?;
                if min > max {
                    return Err(format!("status_range min {} exceeds max {}", min, max));
                }
                Ok(())
            }
            AssertionSpec::JsonField(path) | AssertionSpec::JsonEquals { path, .. } => {
                if path.trim().is_empty() || path.split('.').any(|seg| seg.is_empty()) {
                    return Err(format!("invalid json path '{}'", path));
                }
                Ok(())
            }
            AssertionSpec::MaxResponseMs(ms) => {
                if *ms == 0 {
                    return Err("max_response_ms must be positive".to_string());
                }
                Ok(())
            }
            AssertionSpec::BodyContains(text) => {
                if text.is_empty() {
                    return Err("body_contains needs a non-empty string".to_string());
                }
                Ok(())
            }
        }
    }
}

fn check_status_code(code: u16) -> Result<(), String> {
    if (100..=599).contains(&code) {
        Ok(())
    } else {
        Err(format!("status code {} is outside 100..=599", code))
    }
}
