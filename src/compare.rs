//! Structural Comparator.
//!
//! Strict structural JSON equality over canonical trees: object keys are
//! unordered, array elements are positional, and numbers compare by value.
//! Every difference is localized by a display path such as `items[2].name`.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde_json::Number;

use crate::canonical::{Node, NodeKind, Primitive};

/// One localized point of difference between expected and actual.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Difference {
    /// Both sides present, values differ.
    Changed {
        path: String,
        expected: String,
        actual: String,
    },
    /// A field of the expected object is absent from the actual one.
    Missing { path: String, field: String },
    /// The actual object carries a field the expected one lacks.
    Unexpected { path: String, field: String },
    /// Arrays of different length.
    Length {
        path: String,
        expected: usize,
        actual: usize,
    },
    /// Expected null, actual present.
    ExpectedNull { path: String, actual: String },
    /// Actual null, expected present.
    ActualNull { path: String, expected: String },
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difference::Changed {
                path,
                expected,
                actual,
            } => write!(f, "{}\nExpected: {expected}\n     got: {actual}", label(path)),
            Difference::Missing { path, field } => {
                write!(f, "{}\nExpected: {field}\n     but none found", label(path))
            }
            Difference::Unexpected { path, field } => {
                write!(f, "{}\nUnexpected: {field}", label(path))
            }
            Difference::Length {
                path,
                expected,
                actual,
            } => write!(f, "{path}[]: Expected {expected} values but got {actual}"),
            Difference::ExpectedNull { path, .. } if path.is_empty() => {
                f.write_str("expected was null")
            }
            Difference::ExpectedNull { path, actual } => {
                write!(f, "{path}\nExpected: null\n     got: {actual}")
            }
            Difference::ActualNull { path, .. } if path.is_empty() => {
                f.write_str("actual was null")
            }
            Difference::ActualNull { path, expected } => {
                write!(f, "{path}\nExpected: {expected}\n     got: null")
            }
        }
    }
}

fn label(path: &str) -> &str {
    if path.is_empty() {
        "<root>"
    } else {
        path
    }
}

/// Compares two filtered trees and returns every difference found.
pub fn compare(expected: &Node, actual: &Node) -> Vec<Difference> {
    let mut differences = Vec::new();
    compare_at(String::new(), expected, actual, &mut differences);
    differences
}

/// Joins difference descriptions into one failure message.
pub fn describe(differences: &[Difference]) -> String {
    differences
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n ; ")
}

fn compare_at(path: String, expected: &Node, actual: &Node, out: &mut Vec<Difference>) {
    match (&expected.kind, &actual.kind) {
        (NodeKind::Null, NodeKind::Null) => {}
        (NodeKind::Null, _) => out.push(Difference::ExpectedNull {
            path,
            actual: actual.to_compact_string(),
        }),
        (_, NodeKind::Null) => out.push(Difference::ActualNull {
            path,
            expected: expected.to_compact_string(),
        }),
        (NodeKind::Object(expected_fields), NodeKind::Object(actual_fields)) => {
            compare_objects(&path, expected_fields, actual_fields, out)
        }
        (NodeKind::Array(expected_items), NodeKind::Array(actual_items)) => {
            if expected_items.len() != actual_items.len() {
                out.push(Difference::Length {
                    path,
                    expected: expected_items.len(),
                    actual: actual_items.len(),
                });
                return;
            }
            for (index, (e, a)) in expected_items.iter().zip(actual_items).enumerate() {
                compare_at(format!("{path}[{index}]"), e, a, out);
            }
        }
        (NodeKind::Primitive(e), NodeKind::Primitive(a)) if primitives_equal(e, a) => {}
        _ => out.push(Difference::Changed {
            path,
            expected: expected.to_compact_string(),
            actual: actual.to_compact_string(),
        }),
    }
}

fn compare_objects(
    path: &str,
    expected: &[(String, Node)],
    actual: &[(String, Node)],
    out: &mut Vec<Difference>,
) {
    let actual_by_key: HashMap<&str, &Node> =
        actual.iter().map(|(k, v)| (k.as_str(), v)).collect();
    let expected_keys: HashSet<&str> = expected.iter().map(|(k, _)| k.as_str()).collect();

    for (key, expected_child) in expected {
        match actual_by_key.get(key.as_str()) {
            Some(actual_child) => compare_at(join(path, key), expected_child, actual_child, out),
            None => out.push(Difference::Missing {
                path: path.to_string(),
                field: key.clone(),
            }),
        }
    }
    for (key, _) in actual {
        if !expected_keys.contains(key.as_str()) {
            out.push(Difference::Unexpected {
                path: path.to_string(),
                field: key.clone(),
            });
        }
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn primitives_equal(expected: &Primitive, actual: &Primitive) -> bool {
    match (expected, actual) {
        (Primitive::Number(e), Primitive::Number(a)) => numbers_equal(e, a),
        _ => expected == actual,
    }
}

fn numbers_equal(expected: &Number, actual: &Number) -> bool {
    if let (Some(e), Some(a)) = (expected.as_i64(), actual.as_i64()) {
        return e == a;
    }
    if let (Some(e), Some(a)) = (expected.as_u64(), actual.as_u64()) {
        return e == a;
    }
    match (expected.as_f64(), actual.as_f64()) {
        (Some(e), Some(a)) => e == a,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diff(expected: &str, actual: &str) -> Vec<Difference> {
        compare(&Node::parse(expected).unwrap(), &Node::parse(actual).unwrap())
    }

    #[test]
    fn key_order_is_irrelevant() {
        assert!(diff(r#"{"a":1,"b":2}"#, r#"{"b":2,"a":1}"#).is_empty());
    }

    #[test]
    fn array_order_matters() {
        let differences = diff(r#"{"xs":[1,2,3]}"#, r#"{"xs":[3,2,1]}"#);
        assert_eq!(differences.len(), 2);
        assert_eq!(
            differences[0].to_string(),
            "xs[0]\nExpected: 1\n     got: 3"
        );
    }

    #[test]
    fn array_length_is_reported_once() {
        let differences = diff(r#"{"xs":[1,2]}"#, r#"{"xs":[1,2,3]}"#);
        assert_eq!(differences.len(), 1);
        assert_eq!(differences[0].to_string(), "xs[]: Expected 2 values but got 3");
    }

    #[test]
    fn missing_and_unexpected_fields() {
        let differences = diff(r#"{"o":{"a":1,"b":2}}"#, r#"{"o":{"a":1,"c":2}}"#);
        assert_eq!(
            describe(&differences),
            "o\nExpected: b\n     but none found\n ; o\nUnexpected: c"
        );
    }

    #[test]
    fn nulls_have_explicit_messages() {
        assert_eq!(describe(&diff("{\"a\":1}", "null")), "actual was null");
        assert_eq!(describe(&diff("null", "{\"a\":1}")), "expected was null");
        assert_eq!(
            describe(&diff(r#"{"a":null}"#, r#"{"a":[1]}"#)),
            "a\nExpected: null\n     got: [1]"
        );
    }

    #[test]
    fn numbers_compare_by_value() {
        assert!(diff("[1.0, 2]", "[1, 2.0]").is_empty());
        assert_eq!(diff("[1]", "[\"1\"]").len(), 1);
    }

    #[test]
    fn nested_paths_use_index_brackets() {
        let differences = diff(
            r#"{"items":[{"name":"a"},{"name":"b"}]}"#,
            r#"{"items":[{"name":"a"},{"name":"x"}]}"#,
        );
        assert_eq!(
            differences,
            vec![Difference::Changed {
                path: "items[1].name".into(),
                expected: "\"b\"".into(),
                actual: "\"x\"".into(),
            }]
        );
    }

    #[test]
    fn kind_change_is_a_single_difference() {
        let differences = diff(r#"{"a":{"x":1}}"#, r#"{"a":[1]}"#);
        assert_eq!(describe(&differences), "a\nExpected: {\"x\":1}\n     got: [1]");
    }
}
