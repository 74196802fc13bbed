//! Field matchers bound to exact paths with [`JsonMatcher::with`](super::JsonMatcher::with).
//!
//! A bound path is removed from the generic comparison and checked by its
//! matcher against the live value instead.

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::canonical::Node;
use crate::compare::{compare, describe};
use crate::encode::canonicalize_plain;
use crate::value::Value;
use crate::ApprovalError;

/// An externally defined check for the value at one path.
pub trait FieldMatcher: Send + Sync {
    fn matches(&self, value: &Value) -> bool;

    /// What a matching value looks like, e.g. `not null`.
    fn describe(&self) -> String;

    fn describe_mismatch(&self, value: &Value) -> String {
        format!("was {}", value.summary())
    }
}

pub type SharedMatcher = Arc<dyn FieldMatcher>;

/// A path bound to a matcher.
#[derive(Clone)]
pub struct Binding {
    pub path: String,
    pub matcher: SharedMatcher,
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Binding({} {})", self.path, self.matcher.describe())
    }
}

// ============================================================================
// BUILT-IN MATCHERS
// ============================================================================

struct Predicate<F> {
    description: String,
    check: F,
}

impl<F> FieldMatcher for Predicate<F>
where
    F: Fn(&Value) -> bool + Send + Sync,
{
    fn matches(&self, value: &Value) -> bool {
        (self.check)(value)
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

/// Wraps a closure as a matcher.
pub fn predicate<F>(description: impl Into<String>, check: F) -> impl FieldMatcher
where
    F: Fn(&Value) -> bool + Send + Sync,
{
    Predicate {
        description: description.into(),
        check,
    }
}

pub fn not_null() -> impl FieldMatcher {
    predicate("not null", |v: &Value| !v.is_null())
}

struct EqualToJson {
    expected: Node,
}

impl FieldMatcher for EqualToJson {
    fn matches(&self, value: &Value) -> bool {
        canonicalize_plain(value).map_or(false, |actual| compare(&self.expected, &actual).is_empty())
    }

    fn describe(&self) -> String {
        format!("equal to {}", self.expected)
    }

    fn describe_mismatch(&self, value: &Value) -> String {
        match canonicalize_plain(value) {
            Ok(actual) => describe(&compare(&self.expected, &actual)),
            Err(error) => error.to_string(),
        }
    }
}

/// Structural equality with a JSON value; key order is irrelevant.
pub fn equal_to_json(expected: serde_json::Value) -> impl FieldMatcher {
    EqualToJson {
        expected: Node::from(expected),
    }
}

struct MatchesPattern {
    regex: Regex,
}

impl FieldMatcher for MatchesPattern {
    fn matches(&self, value: &Value) -> bool {
        match value {
            Value::String(s) => self.regex.is_match(s),
            Value::Named(_, inner) => self.matches(inner),
            _ => false,
        }
    }

    fn describe(&self) -> String {
        format!("a string matching /{}/", self.regex.as_str())
    }
}

/// A string value matching `pattern` anywhere.
pub fn matches_pattern(pattern: &str) -> Result<impl FieldMatcher, ApprovalError> {
    let regex = Regex::new(pattern)
        .map_err(|e| crate::err_msg!(Config, "invalid value pattern '{}': {}", pattern, e))?;
    Ok(MatchesPattern { regex })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::value::ObjectRef;

    #[test]
    fn predicate_and_default_mismatch() {
        let positive = predicate("a positive number", |v: &Value| matches!(v, Value::Int(n) if *n > 0));
        assert!(positive.matches(&Value::from(3)));
        assert!(!positive.matches(&Value::from(-1)));
        assert_eq!(positive.describe(), "a positive number");
        assert_eq!(positive.describe_mismatch(&Value::from(-1)), "was -1");
    }

    #[test]
    fn equal_to_json_ignores_key_order() {
        let matcher = equal_to_json(json!({"a": 1, "b": [1, 2]}));
        let object = ObjectRef::new("Pair")
            .with_field("b", Value::List(vec![Value::from(1), Value::from(2)]))
            .with_field("a", 1);
        assert!(matcher.matches(&Value::Object(object)));
        let other = ObjectRef::new("Pair").with_field("a", 2);
        assert!(matcher.describe_mismatch(&Value::Object(other)).contains("but none found"));
    }

    #[test]
    fn not_null_and_pattern() {
        assert!(not_null().matches(&Value::from("x")));
        assert!(!not_null().matches(&Value::Null));
        let uuid = matches_pattern("^[0-9a-f]{8}$").unwrap();
        assert!(uuid.matches(&Value::from("deadbeef")));
        assert!(!uuid.matches(&Value::from(12345678)));
        assert!(matches_pattern("[").is_err());
    }
}
