//! Path/Type Filter: removes ignored subtrees from a canonical tree.
//!
//! A node is excluded when any [`PathSpec`] matches it (union semantics) or
//! when it is a cycle placeholder. Excluded object fields are dropped from the
//! tree before it is ever rendered, so no marker or textual cleanup is needed.
//! Excluded array elements become `null` so that the positions of their
//! siblings, and therefore positional paths, stay stable. This keeps filtering
//! idempotent.
//!
//! Paths are dot-joined from the root. An array element is addressed by its
//! index (`items.1.name`); a path that skips indices (`items.name`) matches the
//! field in every element.

use std::collections::BTreeSet;
use std::fmt;

use regex::Regex;

use crate::canonical::{Node, NodeKind};
use crate::value::TypeName;
use crate::ApprovalError;

/// An ignore rule.
#[derive(Debug, Clone)]
pub enum PathSpec {
    /// Dot-delimited field path from the root.
    ExactPath(String),
    /// Runtime type excluded wherever it is encountered.
    TypeRule(TypeName),
    /// Regular expression matched against the whole leaf field name.
    NamePattern(Regex),
}

impl PathSpec {
    pub fn path(path: impl Into<String>) -> Self {
        PathSpec::ExactPath(path.into())
    }

    pub fn type_rule(type_name: impl Into<TypeName>) -> Self {
        PathSpec::TypeRule(type_name.into())
    }

    /// Compiles a field-name pattern. The pattern must match the entire name.
    pub fn pattern(pattern: &str) -> Result<Self, ApprovalError> {
        Regex::new(&format!("^(?:{pattern})$"))
            .map(PathSpec::NamePattern)
            .map_err(|e| {
                crate::err_msg!(Config, "invalid field name pattern '{}': {}", pattern, e)
                    .with_help("Field name patterns use the `regex` crate syntax.")
            })
    }

    fn matches(&self, node: &Node, location: &Location<'_>) -> bool {
        match self {
            PathSpec::ExactPath(path) => {
                *path == location.positional || *path == location.transparent()
            }
            PathSpec::TypeRule(type_name) => node.origin.as_ref() == Some(type_name),
            PathSpec::NamePattern(regex) => location
                .leaf_field()
                .map(|name| regex.is_match(name))
                .unwrap_or(false),
        }
    }
}

impl fmt::Display for PathSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSpec::ExactPath(path) => write!(f, "path '{path}'"),
            PathSpec::TypeRule(type_name) => write!(f, "type {type_name}"),
            PathSpec::NamePattern(regex) => write!(f, "field names matching {}", regex.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Field(String),
    Index(usize),
}

struct Location<'s> {
    segments: &'s [Segment],
    positional: String,
}

impl<'s> Location<'s> {
    fn new(segments: &'s [Segment]) -> Self {
        let positional = segments
            .iter()
            .map(|s| match s {
                Segment::Field(name) => name.clone(),
                Segment::Index(i) => i.to_string(),
            })
            .collect::<Vec<_>>()
            .join(".");
        Self {
            segments,
            positional,
        }
    }

    fn transparent(&self) -> String {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Field(name) => Some(name.as_str()),
                Segment::Index(_) => None,
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    fn leaf_field(&self) -> Option<&str> {
        match self.segments.last() {
            Some(Segment::Field(name)) => Some(name),
            _ => None,
        }
    }
}

/// Result of filtering the freshly produced tree.
#[derive(Debug, Clone)]
pub struct Filtered {
    pub node: Node,
    /// Positional paths that were excluded. Replayed on the approved tree,
    /// which has no type metadata of its own.
    pub excluded: BTreeSet<String>,
}

/// Applies a set of path specs to canonical trees.
pub struct Filter<'a> {
    specs: &'a [PathSpec],
}

impl<'a> Filter<'a> {
    pub fn new(specs: &'a [PathSpec]) -> Self {
        Self { specs }
    }

    /// Filters a tree that carries type metadata.
    pub fn apply(&self, node: &Node) -> Filtered {
        self.run(node, &BTreeSet::new())
    }

    /// Filters a tree, additionally excluding the given positional paths.
    pub fn apply_mirrored(&self, node: &Node, mirrored: &BTreeSet<String>) -> Node {
        self.run(node, mirrored).node
    }

    fn run(&self, node: &Node, mirrored: &BTreeSet<String>) -> Filtered {
        let mut walk = Walk {
            specs: self.specs,
            mirrored,
            segments: Vec::new(),
            excluded: BTreeSet::new(),
        };
        let node = walk.node(node);
        Filtered {
            node,
            excluded: walk.excluded,
        }
    }
}

struct Walk<'a> {
    specs: &'a [PathSpec],
    mirrored: &'a BTreeSet<String>,
    segments: Vec<Segment>,
    excluded: BTreeSet<String>,
}

impl Walk<'_> {
    fn node(&mut self, node: &Node) -> Node {
        let kind = match &node.kind {
            NodeKind::Object(fields) => {
                let mut kept = Vec::with_capacity(fields.len());
                for (key, child) in fields {
                    self.segments.push(Segment::Field(key.clone()));
                    if !self.exclude(child) {
                        kept.push((key.clone(), self.node(child)));
                    }
                    self.segments.pop();
                }
                NodeKind::Object(kept)
            }
            NodeKind::Array(items) => {
                let mut kept = Vec::with_capacity(items.len());
                for (index, child) in items.iter().enumerate() {
                    self.segments.push(Segment::Index(index));
                    if self.exclude(child) {
                        kept.push(Node::null());
                    } else {
                        kept.push(self.node(child));
                    }
                    self.segments.pop();
                }
                NodeKind::Array(kept)
            }
            other => other.clone(),
        };
        Node {
            kind,
            origin: node.origin.clone(),
            stub: node.stub,
        }
    }

    fn exclude(&mut self, child: &Node) -> bool {
        let location = Location::new(&self.segments);
        let excluded = child.stub
            || self.mirrored.contains(&location.positional)
            || self.specs.iter().any(|spec| spec.matches(child, &location));
        if excluded {
            self.excluded.insert(location.positional);
        }
        excluded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json(text: &str) -> Node {
        Node::parse(text).unwrap()
    }

    fn filtered(text: &str, specs: &[PathSpec]) -> String {
        Filter::new(specs).apply(&json(text)).node.to_compact_string()
    }

    #[test]
    fn exact_path_removes_field() {
        let specs = [PathSpec::path("b")];
        assert_eq!(filtered(r#"{"a":1,"b":2}"#, &specs), r#"{"a":1}"#);
    }

    #[test]
    fn nested_exact_path_leaves_siblings() {
        let specs = [PathSpec::path("outer.inner")];
        assert_eq!(
            filtered(r#"{"outer":{"inner":1,"keep":2},"inner":3}"#, &specs),
            r#"{"outer":{"keep":2},"inner":3}"#
        );
    }

    #[test]
    fn positional_and_transparent_array_paths() {
        let text = r#"{"xs":[{"id":1,"t":"a"},{"id":2,"t":"b"}]}"#;
        assert_eq!(
            filtered(text, &[PathSpec::path("xs.1.t")]),
            r#"{"xs":[{"id":1,"t":"a"},{"id":2}]}"#
        );
        assert_eq!(
            filtered(text, &[PathSpec::path("xs.t")]),
            r#"{"xs":[{"id":1},{"id":2}]}"#
        );
    }

    #[test]
    fn excluded_array_elements_keep_positions() {
        let text = r#"{"xs":[1,2,3]}"#;
        assert_eq!(filtered(text, &[PathSpec::path("xs.1")]), r#"{"xs":[1,null,3]}"#);
    }

    #[test]
    fn name_pattern_matches_whole_leaf_name_only() {
        let specs = [PathSpec::pattern("created.*").unwrap()];
        assert_eq!(
            filtered(
                r#"{"createdAt":1,"wascreated":2,"meta":{"createdBy":"x","id":3}}"#,
                &specs
            ),
            r#"{"wascreated":2,"meta":{"id":3}}"#
        );
    }

    #[test]
    fn invalid_pattern_is_a_config_error() {
        let err = PathSpec::pattern("(unclosed").unwrap_err();
        assert_eq!(err.category(), crate::ErrorCategory::Config);
    }

    #[test]
    fn type_rule_uses_origin_and_is_mirrored() {
        let actual = Node::object(vec![
            ("id".into(), Node::number(1)),
            (
                "stamp".into(),
                Node::string("12:00").with_origin(Some(TypeName::new("Instant"))),
            ),
        ]);
        let specs = [PathSpec::type_rule("Instant")];
        let filter = Filter::new(&specs);
        let result = filter.apply(&actual);
        assert_eq!(result.node.to_compact_string(), r#"{"id":1}"#);
        assert!(result.excluded.contains("stamp"));

        let approved = json(r#"{"id":1,"stamp":"09:30"}"#);
        let approved = filter.apply_mirrored(&approved, &result.excluded);
        assert_eq!(approved.to_compact_string(), r#"{"id":1}"#);
    }

    #[test]
    fn stubs_are_always_removed() {
        let node = Node::object(vec![
            ("name".into(), Node::string("n")),
            ("me".into(), Node::stub(&TypeName::new("Node"), 1)),
        ]);
        let result = Filter::new(&[]).apply(&node);
        assert_eq!(result.node.to_compact_string(), r#"{"name":"n"}"#);
    }

    #[test]
    fn filtering_is_idempotent() {
        let specs = [
            PathSpec::path("xs.1"),
            PathSpec::path("a.b"),
            PathSpec::pattern("tmp_.*").unwrap(),
        ];
        let filter = Filter::new(&specs);
        let node = json(r#"{"xs":[1,2,3],"a":{"b":1,"c":{"tmp_x":1}},"tmp_y":2}"#);
        let once = filter.apply(&node).node;
        let twice = filter.apply(&once).node;
        assert_eq!(once, twice);
    }

    #[test]
    fn union_semantics_without_precedence() {
        let specs = [PathSpec::path("a"), PathSpec::pattern("a").unwrap()];
        assert_eq!(filtered(r#"{"a":1,"b":{"a":2}}"#, &specs), r#"{"b":{}}"#);
    }
}
