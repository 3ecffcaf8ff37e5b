//! Assertion evaluation
//!
//! Every declared assertion is evaluated, in order, even after one fails, so
//! a failed request always carries its complete verdict list.

use serde_json::Value;

use crate::collection::AssertionSpec;
use crate::engine::result::{RequestOutcome, Verdict};

/// Evaluate all assertions against an outcome
pub fn evaluate(outcome: &RequestOutcome, assertions: &[AssertionSpec]) -> Vec<Verdict> {
    let json = outcome.json();
    assertions
        .iter()
        .map(|assertion| evaluate_one(outcome, json.as_ref(), assertion))
        .collect()
}

fn evaluate_one(
    outcome: &RequestOutcome,
    json: Option<&Value>,
    assertion: &AssertionSpec,
) -> Verdict {
    let name = assertion.label();

    match assertion {
        AssertionSpec::Status(expected) => match outcome.status {
            Some(actual) if actual == *expected => Verdict::pass(name, format!("got {}", actual)),
            Some(actual) => Verdict::fail(name, format!("expected {}, got {}", expected, actual)),
            None => Verdict::fail(name, "no response received"),
        },

        AssertionSpec::StatusRange { min, max } => match outcome.status {
            Some(actual) if (*min..=*max).contains(&actual) => {
                Verdict::pass(name, format!("got {}", actual))
            }
            Some(actual) => Verdict::fail(
                name,
                format!("expected {}..={}, got {}", min, max, actual),
            ),
            None => Verdict::fail(name, "no response received"),
        },

        AssertionSpec::JsonField(path) => match json {
            None => Verdict::fail(name, "response body is not JSON"),
            Some(json) => match lookup(json, path) {
                Some(_) => Verdict::pass(name, "present"),
                None => Verdict::fail(name, format!("'{}' not found", path)),
            },
        },

        AssertionSpec::JsonEquals { path, value } => match json {
            None => Verdict::fail(name, "response body is not JSON"),
            Some(json) => match lookup(json, path) {
                Some(actual) if actual == value => Verdict::pass(name, format!("got {}", actual)),
                Some(actual) => {
                    Verdict::fail(name, format!("expected {}, got {}", value, actual))
                }
                None => Verdict::fail(name, format!("'{}' not found", path)),
            },
        },

        AssertionSpec::MaxResponseMs(ceiling) => {
            if outcome.latency_ms <= *ceiling {
                Verdict::pass(name, format!("took {}ms", outcome.latency_ms))
            } else {
                Verdict::fail(
                    name,
                    format!("took {}ms, limit {}ms", outcome.latency_ms, ceiling),
                )
            }
        }

        AssertionSpec::BodyContains(text) => {
            if outcome.body.contains(text.as_str()) {
                Verdict::pass(name, "found")
            } else {
                Verdict::fail(name, format!("'{}' not found in body", text))
            }
        }
    }
}

/// Follow a dotted path; numeric segments index arrays
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outcome(status: Option<u16>, body: &str, latency_ms: u64) -> RequestOutcome {
        RequestOutcome {
            folder: "Profile & User Info".to_string(),
            request: "Get profile".to_string(),
            iteration: 1,
            method: "GET".to_string(),
            url: "https://api.example.com/me".to_string(),
            status,
            latency_ms,
            response_size: body.len(),
            body: body.to_string(),
            verdicts: Vec::new(),
            error: None,
        }
    }

    #[test]
    fn test_lookup() {
        let value = json!({"data": {"items": [{"id": 7}]}, "ok": true});
        assert_eq!(lookup(&value, "ok"), Some(&json!(true)));
        assert_eq!(lookup(&value, "data.items.0.id"), Some(&json!(7)));
        assert_eq!(lookup(&value, "data.items.1.id"), None);
        assert_eq!(lookup(&value, "data.missing"), None);
        assert_eq!(lookup(&value, "ok.deeper"), None);
    }

    #[test]
    fn test_no_short_circuit() {
        let outcome = outcome(Some(500), r#"{"id": 1, "name": "ada"}"#, 10);
        let assertions = vec![
            AssertionSpec::Status(200),
            AssertionSpec::JsonField("id".to_string()),
            AssertionSpec::JsonEquals {
                path: "name".to_string(),
                value: json!("ada"),
            },
        ];

        let verdicts = evaluate(&outcome, &assertions);
        assert_eq!(verdicts.len(), 3);
        assert!(!verdicts[0].passed);
        assert!(verdicts[1].passed);
        assert!(verdicts[2].passed);
        assert_eq!(verdicts[0].message, "expected 200, got 500");
    }

    #[test]
    fn test_status_range() {
        let range = [AssertionSpec::StatusRange { min: 200, max: 299 }];
        assert!(evaluate(&outcome(Some(204), "", 1), &range)[0].passed);
        assert!(!evaluate(&outcome(Some(301), "", 1), &range)[0].passed);
        assert!(!evaluate(&outcome(None, "", 1), &range)[0].passed);
    }

    #[test]
    fn test_json_assertions_on_non_json_body() {
        let verdicts = evaluate(
            &outcome(Some(200), "<html></html>", 1),
            &[AssertionSpec::JsonField("id".to_string())],
        );
        assert!(!verdicts[0].passed);
        assert_eq!(verdicts[0].message, "response body is not JSON");
    }

    #[test]
    fn test_json_equals_mismatch() {
        let verdicts = evaluate(
            &outcome(Some(200), r#"{"token_type": "mac"}"#, 1),
            &[AssertionSpec::JsonEquals {
                path: "token_type".to_string(),
                value: json!("Bearer"),
            }],
        );
        assert!(!verdicts[0].passed);
        assert_eq!(verdicts[0].message, r#"expected "Bearer", got "mac""#);
    }

    #[test]
    fn test_response_time_and_body() {
        let o = outcome(Some(200), "all ok", 250);
        let verdicts = evaluate(
            &o,
            &[
                AssertionSpec::MaxResponseMs(200),
                AssertionSpec::MaxResponseMs(250),
                AssertionSpec::BodyContains("ok".to_string()),
                AssertionSpec::BodyContains("error".to_string()),
            ],
        );
        let passed: Vec<bool> = verdicts.iter().map(|v| v.passed).collect();
        assert_eq!(passed, vec![false, true, true, false]);
    }

    #[test]
    fn test_verdict_names_follow_declarations() {
        let verdicts = evaluate(&outcome(Some(200), "{}", 1), &[AssertionSpec::Status(200)]);
        assert_eq!(verdicts[0].name, "status is 200");
    }
}
