//! Variable substitution for `{{name}}` templates
//!
//! Every `{{name}}` in a URL, header, body or form value is replaced by the
//! environment value of `name`. Unknown names are an error; they are never
//! replaced with an empty string.

use regex::Regex;
use std::sync::LazyLock;

use super::environment::Environment;

static VARIABLE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").unwrap());

/// Errors raised while resolving a template
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),
}

/// Resolve all `{{name}}` references in `input`
pub fn substitute(input: &str, env: &Environment) -> Result<String, TemplateError> {
    let mut result = String::with_capacity(input.len());
    let mut last = 0;

    for cap in VARIABLE_REGEX.captures_iter(input) {
        let full = cap.get(0).unwrap();
        let name = cap.get(1).unwrap().as_str();

        let value = env
            .get(name)
            .ok_or_else(|| TemplateError::UndefinedVariable(name.to_string()))?;

        result.push_str(&input[last..full.start()]);
        result.push_str(value);
        last = full.end();
    }

    result.push_str(&input[last..]);
    Ok(result)
}

/// Names referenced by a template, in order of first appearance
pub fn variables(input: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for cap in VARIABLE_REGEX.captures_iter(input) {
        let name = cap.get(1).unwrap().as_str().to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}
