//! The inspected object graph.
//!
//! A [`Value`] is what a test hands to the engine. Plain data (scalars, lists,
//! maps) is owned; [`ObjectRef`] is shared and has reference identity, which is
//! how self-referential graphs are expressed. Identity, not structural equality,
//! is what cycle detection keys on.
//!
//! # Examples
//!
//! ```rust
//! use snapgate::value::{ObjectRef, Value};
//! let node = ObjectRef::new("Node").with_field("name", "root");
//! node.set("parent", Value::Object(node.clone()));
//! assert_eq!(node.type_name().as_str(), "Node");
//! assert!(node.get("parent").is_some());
//! ```

use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::ApprovalError;

pub mod ser;

pub use ser::to_value;

// ============================================================================
// TYPE NAMES AND IDENTITY
// ============================================================================

/// Runtime type name of a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeName(String);

impl TypeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The unqualified name of `T`, without module path or generic arguments.
    ///
    /// ```rust
    /// use snapgate::value::TypeName;
    /// assert_eq!(TypeName::of::<Vec<String>>().as_str(), "Vec");
    /// ```
    pub fn of<T: ?Sized>() -> Self {
        let full = std::any::type_name::<T>();
        let base = full.split('<').next().unwrap_or(full);
        Self(base.rsplit("::").next().unwrap_or(base).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TypeName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Reference identity of a shared object (its allocation address).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(usize);

// ============================================================================
// OBJECTS
// ============================================================================

/// Fields of a shared object, in declaration order.
#[derive(Clone)]
pub struct Object {
    pub type_name: TypeName,
    pub fields: Vec<(String, Value)>,
}

/// A shared, mutable object with reference identity.
#[derive(Clone)]
pub struct ObjectRef(Rc<RefCell<Object>>);

impl ObjectRef {
    pub fn new(type_name: impl Into<TypeName>) -> Self {
        Self::from_parts(type_name, Vec::new())
    }

    pub fn from_parts(type_name: impl Into<TypeName>, fields: Vec<(String, Value)>) -> Self {
        Self(Rc::new(RefCell::new(Object {
            type_name: type_name.into(),
            fields,
        })))
    }

    /// Builder form of [`ObjectRef::set`].
    pub fn with_field(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Sets a field, replacing an existing one with the same name in place.
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        let mut object = self.0.borrow_mut();
        match object.fields.iter_mut().find(|(field, _)| *field == name) {
            Some(slot) => slot.1 = value,
            None => object.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.0
            .borrow()
            .fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.clone())
    }

    pub fn type_name(&self) -> TypeName {
        self.0.borrow().type_name.clone()
    }

    pub fn identity(&self) -> Identity {
        Identity(Rc::as_ptr(&self.0) as *const () as usize)
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn borrow(&self) -> Ref<'_, Object> {
        self.0.borrow()
    }

    /// Snapshot of the field values; cheap, since shared objects are reference-counted.
    pub fn field_values(&self) -> Vec<Value> {
        self.0.borrow().fields.iter().map(|(_, v)| v.clone()).collect()
    }
}

// Never recurse: the graph may be cyclic.
impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({}@{:#x})", self.type_name(), self.identity().0)
    }
}

// ============================================================================
// VALUES
// ============================================================================

/// A possibly cyclic value produced by a test.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(Vec<(String, Value)>),
    /// A wrapper carrying a runtime type, such as a newtype struct.
    Named(TypeName, Box<Value>),
    Object(ObjectRef),
}

impl Value {
    /// Returns the runtime type carried by this value, if any.
    pub fn type_name(&self) -> Option<TypeName> {
        match self {
            Value::Named(name, _) => Some(name.clone()),
            Value::Object(object) => Some(object.type_name()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Parses JSON text into a value. Objects become anonymous maps.
    pub fn from_json_str(text: &str) -> Result<Value, ApprovalError> {
        let json: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| crate::err_msg!(Serialize, "actual value is not valid JSON: {}", e))?;
        Ok(Value::from(json))
    }

    /// Resolves a dot-delimited path of field names and positional indices.
    ///
    /// Missing segments resolve to `Null`.
    ///
    /// ```rust
    /// use snapgate::value::{ObjectRef, Value};
    /// let item = ObjectRef::new("Item").with_field("id", 7);
    /// let root = ObjectRef::new("Order").with_field("items", Value::List(vec![Value::Object(item)]));
    /// let found = Value::Object(root).find_at("items.0.id");
    /// assert!(matches!(found, Value::Int(7)));
    /// ```
    pub fn find_at(&self, path: &str) -> Value {
        let mut current = self.clone();
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            current = current.child(segment);
            if current.is_null() {
                break;
            }
        }
        current
    }

    fn child(&self, segment: &str) -> Value {
        match self {
            Value::Named(_, inner) => inner.child(segment),
            Value::Object(object) => object.get(segment).unwrap_or_default(),
            Value::Map(entries) => entries
                .iter()
                .find(|(key, _)| key == segment)
                .map(|(_, v)| v.clone())
                .unwrap_or_default(),
            Value::List(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or_default(),
            _ => Value::Null,
        }
    }

    /// Short, non-recursive rendering for mismatch descriptions.
    pub fn summary(&self) -> String {
        match self {
            Value::Null => "null".into(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::UInt(n) => n.to_string(),
            Value::Float(n) => n.to_string(),
            Value::String(s) => format!("{s:?}"),
            Value::List(items) => format!("[{} items]", items.len()),
            Value::Map(entries) => format!("{{{} entries}}", entries.len()),
            Value::Named(name, inner) => format!("{name}({})", inner.summary()),
            Value::Object(object) => format!("<{}>", object.type_name()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::UInt(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<ObjectRef> for Value {
    fn from(object: ObjectRef) -> Self {
        Value::Object(object)
    }
}
