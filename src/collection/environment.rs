//! Environment variables for a run
//!
//! Holds the template variables (base URL, client credentials, ...) a
//! collection refers to. The credential manager overwrites the token fields
//! as it acquires tokens; nothing else writes to it during a run.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Variable written with the current access token
pub const ACCESS_TOKEN_VAR: &str = "access_token";
/// Variable written with the current token type
pub const TOKEN_TYPE_VAR: &str = "token_type";
/// Variable written with the token expiry, RFC 3339
pub const TOKEN_EXPIRES_AT_VAR: &str = "token_expires_at";

/// Runtime variable mapping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    /// Environment name (e.g. "development")
    pub name: Option<String>,

    values: HashMap<String, String>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            values: HashMap::new(),
        }
    }

    /// Get a variable. Missing names are `None`, never an empty string.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Set or overwrite a variable
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Variable names, sorted
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.values.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Merge overrides on top of the existing values
    pub fn merge(&mut self, overrides: &HashMap<String, String>) {
        for (key, value) in overrides {
            self.values.insert(key.clone(), value.clone());
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            name: None,
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// ============================================================================
// File formats
// ============================================================================

/// One entry of a Postman-style environment export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentEntry {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Accepted on-disk shapes of an environment file
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EnvironmentFile {
    /// `{ name: dev, values: [{ key, value, enabled }] }`
    Entries {
        #[serde(default)]
        name: Option<String>,
        values: Vec<EnvironmentEntry>,
    },
    /// A flat `key: value` map
    Flat(HashMap<String, serde_yaml::Value>),
}

impl EnvironmentFile {
    /// Convert into an [`Environment`], rejecting duplicate enabled keys
    pub fn into_environment(self) -> Result<Environment, String> {
        match self {
            EnvironmentFile::Entries { name, values } => {
                let mut env = Environment {
                    name,
                    values: HashMap::new(),
                };
                for entry in values.into_iter().filter(|e| e.enabled) {
                    if env.contains(&entry.key) {
                        return Err(format!("duplicate variable '{}'", entry.key));
                    }
                    env.set(entry.key, entry.value);
                }
                Ok(env)
            }
            EnvironmentFile::Flat(map) => {
                let mut env = Environment::new();
                for (key, value) in map {
                    let value = match value {
                        serde_yaml::Value::String(s) => s,
                        serde_yaml::Value::Number(n) => n.to_string(),
                        serde_yaml::Value::Bool(b) => b.to_string(),
                        other => {
                            return Err(format!(
                                "variable '{}' must be a scalar, got {:?}",
                                key, other
                            ))
                        }
                    };
                    env.set(key, value);
                }
                Ok(env)
            }
        }
    }
}
