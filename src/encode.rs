//! Canonicalizer: turns a [`Value`] graph into a [`Node`] tree under a profile.
//!
//! Objects of stubbed types are expanded once per identity; every later
//! occurrence becomes a placeholder. An identity met again while it is still
//! being expanded is stubbed whatever its strategy, so encoding terminates even
//! for cycles the detector was told to skip.
//!
//! Values nesting deeper than [`MAX_DEPTH`] are rejected with a `Serialize`
//! error rather than encoded, which bounds every later walk over the tree.

use std::collections::{HashMap, HashSet};

use tracing::{trace, warn};

use crate::canonical::Node;
use crate::profile::{SerializationProfile, Strategy};
use crate::value::{Identity, ObjectRef, Value};
use crate::ApprovalError;

/// Deepest field path the canonicalizer expands.
///
/// Stays below serde_json's parse nesting limit of 128, so every artifact
/// written from an encoded tree can be read back.
pub const MAX_DEPTH: usize = 100;

pub struct Canonicalizer<'a> {
    profile: &'a SerializationProfile,
    ordinals: HashMap<Identity, usize>,
    active: HashSet<Identity>,
    path: Vec<String>,
}

impl<'a> Canonicalizer<'a> {
    pub fn new(profile: &'a SerializationProfile) -> Self {
        Self {
            profile,
            ordinals: HashMap::new(),
            active: HashSet::new(),
            path: Vec::new(),
        }
    }

    pub fn encode(&mut self, value: &Value) -> Result<Node, ApprovalError> {
        if self.path.len() > MAX_DEPTH {
            let path = self.path[..8].join(".");
            warn!(depth = self.path.len(), %path, "value nests too deeply");
            return Err(crate::err_msg!(
                Serialize,
                "value nests deeper than {} levels below '{}...'",
                MAX_DEPTH,
                path
            )
            .with_help("Register a custom encoder for the deeply nested type."));
        }
        let type_name = value.type_name();
        let strategy = self
            .profile
            .strategy_for(&self.path.join("."), type_name.as_ref())
            .clone();

        match (strategy, value) {
            (Strategy::Custom(encoder), _) => Ok(encoder(value).with_origin(type_name)),
            (Strategy::Stub, Value::Object(object)) => self.encode_object(object, true),
            (_, Value::Object(object)) => self.encode_object(object, false),
            (_, other) => self.encode_plain(other),
        }
    }

    fn encode_plain(&mut self, value: &Value) -> Result<Node, ApprovalError> {
        let node = match value {
            Value::Null => Node::null(),
            Value::Bool(b) => Node::bool(*b),
            Value::Int(n) => Node::number(*n),
            Value::UInt(n) => Node::number(*n),
            Value::Float(f) => Node::float(*f),
            Value::String(s) => Node::string(s.clone()),
            Value::List(items) => {
                let mut nodes = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    nodes.push(self.encode_child(index.to_string(), item)?);
                }
                Node::array(nodes)
            }
            Value::Map(entries) => Node::object(self.encode_fields(entries)?),
            Value::Named(type_name, inner) => {
                let mut node = self.encode(inner)?;
                node.origin = Some(type_name.clone());
                node
            }
            Value::Object(object) => return self.encode_object(object, false),
        };
        Ok(node)
    }

    fn encode_object(&mut self, object: &ObjectRef, stubbed: bool) -> Result<Node, ApprovalError> {
        let id = object.identity();
        let type_name = object.type_name();

        if self.active.contains(&id) || (stubbed && self.ordinals.contains_key(&id)) {
            let ordinal = self.ordinal(id);
            trace!(%type_name, ordinal, "emitting cycle placeholder");
            return Ok(Node::stub(&type_name, ordinal));
        }
        if stubbed {
            self.ordinal(id);
        }

        // Clone the fields out so no borrow is held across recursion.
        let fields = object.borrow().fields.clone();
        self.active.insert(id);
        let fields = self.encode_fields(&fields);
        self.active.remove(&id);
        Ok(Node::object(fields?).with_origin(Some(type_name)))
    }

    fn encode_fields(&mut self, entries: &[(String, Value)]) -> Result<Vec<(String, Node)>, ApprovalError> {
        entries
            .iter()
            .map(|(key, value)| Ok((key.clone(), self.encode_child(key.clone(), value)?)))
            .collect()
    }

    fn encode_child(&mut self, segment: String, value: &Value) -> Result<Node, ApprovalError> {
        self.path.push(segment);
        let node = self.encode(value);
        self.path.pop();
        node
    }

    fn ordinal(&mut self, id: Identity) -> usize {
        let next = self.ordinals.len() + 1;
        *self.ordinals.entry(id).or_insert(next)
    }
}

/// Canonicalizes `value` under `profile`.
pub fn canonicalize(value: &Value, profile: &SerializationProfile) -> Result<Node, ApprovalError> {
    Canonicalizer::new(profile).encode(value)
}

/// Canonicalizes a value with no custom encoders and no stubbed types.
pub fn canonicalize_plain(value: &Value) -> Result<Node, ApprovalError> {
    canonicalize(value, &SerializationProfile::default())
}
