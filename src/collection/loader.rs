//! Collection and environment file loader
//!
//! Files may be YAML or JSON. Everything is validated here, before a run
//! starts: a collection that loads is one the sequencer can execute.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::environment::{Environment, EnvironmentFile};
use super::model::Collection;

/// Configuration problems. Always raised before any request is sent.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {file}: {error}")]
    Parse {
        file: String,
        error: serde_yaml::Error,
    },

    #[error("Invalid collection: {0}")]
    InvalidCollection(String),

    #[error("Invalid assertion in request '{request}': {reason}")]
    InvalidAssertion { request: String, reason: String },

    #[error("Invalid environment {file}: {reason}")]
    InvalidEnvironment { file: String, reason: String },

    #[error("Invalid option: {0}")]
    InvalidOption(String),

    #[error("Unknown folder in filter: {0}")]
    UnknownFolder(String),

    #[error("Unknown test mode: {0}")]
    UnknownMode(String),

    #[error("Environment '{name}' not found in {dir}")]
    EnvironmentNotFound { name: String, dir: String },
}

const ENVIRONMENT_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

pub struct CollectionLoader;

impl CollectionLoader {
    /// Load and validate a collection file
    pub fn load_collection(path: &Path) -> Result<Collection, ConfigError> {
        let content = read(path)?;
        Self::parse_collection(&content, &path.display().to_string())
    }

    /// Parse and validate collection text; `origin` names it in errors
    pub fn parse_collection(content: &str, origin: &str) -> Result<Collection, ConfigError> {
        let collection: Collection =
            serde_yaml::from_str(content).map_err(|error| ConfigError::Parse {
                file: origin.to_string(),
                error,
            })?;
        validate_collection(&collection)?;
        Ok(collection)
    }

    /// Read a YAML or JSON file into an untyped document
    pub fn read_document(path: &Path) -> Result<serde_yaml::Value, ConfigError> {
        let content = read(path)?;
        serde_yaml::from_str(&content).map_err(|error| ConfigError::Parse {
            file: path.display().to_string(),
            error,
        })
    }

    /// Validate an already parsed document as a collection
    pub fn collection_from_value(
        value: serde_yaml::Value,
        origin: &str,
    ) -> Result<Collection, ConfigError> {
        let collection: Collection =
            serde_yaml::from_value(value).map_err(|error| ConfigError::Parse {
                file: origin.to_string(),
                error,
            })?;
        validate_collection(&collection)?;
        Ok(collection)
    }

    /// Load an environment file
    pub fn load_environment(path: &Path) -> Result<Environment, ConfigError> {
        let document = Self::read_document(path)?;
        Self::environment_from_value(document, path)
    }

    /// Interpret an already parsed document as an environment.
    ///
    /// `path` names it in errors and supplies the name when the file has none.
    pub fn environment_from_value(
        value: serde_yaml::Value,
        path: &Path,
    ) -> Result<Environment, ConfigError> {
        let file: EnvironmentFile =
            serde_yaml::from_value(value).map_err(|error| ConfigError::Parse {
                file: path.display().to_string(),
                error,
            })?;

        let mut env = file
            .into_environment()
            .map_err(|reason| ConfigError::InvalidEnvironment {
                file: path.display().to_string(),
                reason,
            })?;

        if env.name.is_none() {
            env.name = path.file_stem().and_then(|s| s.to_str()).map(String::from);
        }
        Ok(env)
    }

    /// Resolve an environment selector to a file.
    ///
    /// An existing path is used as is; otherwise `<dir>/<name>.{yaml,yml,json}`
    /// is searched.
    pub fn resolve_environment(selector: &str, dir: &Path) -> Result<PathBuf, ConfigError> {
        let direct = PathBuf::from(selector);
        if direct.is_file() {
            return Ok(direct);
        }

        ENVIRONMENT_EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{}.{}", selector, ext)))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| ConfigError::EnvironmentNotFound {
                name: selector.to_string(),
                dir: dir.display().to_string(),
            })
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn validate_collection(collection: &Collection) -> Result<(), ConfigError> {
    let mut folder_names = HashSet::new();

    for folder in &collection.folders {
        if folder.name.trim().is_empty() {
            return Err(ConfigError::InvalidCollection(
                "folder name must not be empty".to_string(),
            ));
        }
        if !folder_names.insert(folder.name.as_str()) {
            return Err(ConfigError::InvalidCollection(format!(
                "duplicate folder '{}'",
                folder.name
            )));
        }

        for request in &folder.requests {
            if request.url.trim().is_empty() {
                return Err(ConfigError::InvalidCollection(format!(
                    "request '{}' has no url",
                    request.name
                )));
            }
            let mut header_names = HashSet::new();
            for name in request.headers.keys() {
                if !header_names.insert(name.to_ascii_lowercase()) {
                    return Err(ConfigError::InvalidCollection(format!(
                        "request '{}' declares header '{}' more than once",
                        request.name, name
                    )));
                }
            }
            if request.body.is_some() && request.form.is_some() {
                return Err(ConfigError::InvalidCollection(format!(
                    "request '{}' declares both body and form",
                    request.name
                )));
            }
            for assertion in &request.assertions {
                assertion
                    .validate()
                    .map_err(|reason| ConfigError::InvalidAssertion {
                        request: request.name.clone(),
                        reason,
                    })?;
            }
        }
    }

    Ok(())
}
