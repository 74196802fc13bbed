//! Canonical Node: the normalized tree every filter and comparison runs on.
//!
//! Nodes produced from a live value remember the runtime type of their source
//! (`origin`) and whether they are a cycle placeholder (`stub`). Nodes parsed
//! from an artifact carry neither.

use std::fmt;

use serde_json::{Map, Number};

use crate::value::TypeName;

/// Scalar leaf of a canonical tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Bool(bool),
    Number(Number),
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Ordered mapping of field name to node.
    Object(Vec<(String, Node)>),
    Array(Vec<Node>),
    Primitive(Primitive),
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub origin: Option<TypeName>,
    pub stub: bool,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            origin: None,
            stub: false,
        }
    }

    pub fn null() -> Self {
        Self::new(NodeKind::Null)
    }

    pub fn object(fields: Vec<(String, Node)>) -> Self {
        Self::new(NodeKind::Object(fields))
    }

    pub fn array(items: Vec<Node>) -> Self {
        Self::new(NodeKind::Array(items))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::new(NodeKind::Primitive(Primitive::String(s.into())))
    }

    pub fn bool(b: bool) -> Self {
        Self::new(NodeKind::Primitive(Primitive::Bool(b)))
    }

    pub fn number(n: impl Into<Number>) -> Self {
        Self::new(NodeKind::Primitive(Primitive::Number(n.into())))
    }

    /// Floats that JSON cannot represent (NaN, infinities) are kept as strings.
    pub fn float(f: f64) -> Self {
        match Number::from_f64(f) {
            Some(n) => Self::number(n),
            None => Self::string(f.to_string()),
        }
    }

    /// Cycle-safe placeholder for an object already emitted in this tree.
    pub fn stub(type_name: &TypeName, ordinal: usize) -> Self {
        Self {
            kind: NodeKind::Primitive(Primitive::String(format!("<{type_name}@{ordinal}>"))),
            origin: Some(type_name.clone()),
            stub: true,
        }
    }

    /// Records the source type unless one is already set.
    pub fn with_origin(mut self, origin: Option<TypeName>) -> Self {
        if self.origin.is_none() {
            self.origin = origin;
        }
        self
    }

    pub fn is_null(&self) -> bool {
        matches!(self.kind, NodeKind::Null)
    }

    pub fn is_primitive_or_null(&self) -> bool {
        matches!(self.kind, NodeKind::Primitive(_) | NodeKind::Null)
    }

    /// Parses artifact JSON text.
    pub fn parse(text: &str) -> Result<Node, serde_json::Error> {
        let json: serde_json::Value = serde_json::from_str(text)?;
        Ok(Node::from(json))
    }

    pub fn to_json(&self) -> serde_json::Value {
        match &self.kind {
            NodeKind::Null => serde_json::Value::Null,
            NodeKind::Primitive(Primitive::Bool(b)) => serde_json::Value::Bool(*b),
            NodeKind::Primitive(Primitive::Number(n)) => serde_json::Value::Number(n.clone()),
            NodeKind::Primitive(Primitive::String(s)) => serde_json::Value::String(s.clone()),
            NodeKind::Array(items) => {
                serde_json::Value::Array(items.iter().map(Node::to_json).collect())
            }
            NodeKind::Object(fields) => {
                let mut map = Map::with_capacity(fields.len());
                for (key, value) in fields {
                    map.insert(key.clone(), value.to_json());
                }
                serde_json::Value::Object(map)
            }
        }
    }

    /// Pretty-printed JSON text, field order preserved.
    pub fn to_pretty_string(&self) -> String {
        let json = self.to_json();
        serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string())
    }

    pub fn to_compact_string(&self) -> String {
        self.to_json().to_string()
    }
}

impl From<serde_json::Value> for Node {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Node::null(),
            serde_json::Value::Bool(b) => Node::bool(b),
            serde_json::Value::Number(n) => Node::number(n),
            serde_json::Value::String(s) => Node::string(s),
            serde_json::Value::Array(items) => Node::array(items.into_iter().map(Node::from).collect()),
            serde_json::Value::Object(map) => {
                Node::object(map.into_iter().map(|(k, v)| (k, Node::from(v))).collect())
            }
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_compact_string())
    }
}
