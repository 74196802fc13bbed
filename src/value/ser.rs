//! `serde` bridge: any `Serialize` value becomes a [`Value`].
//!
//! Struct, newtype and enum names are kept as runtime types so type-based
//! ignore rules and encoders can see them. The produced graph never has
//! shared objects, so it is always acyclic.

use serde::ser::{self, Serialize};

use super::{ObjectRef, TypeName, Value};
use crate::ApprovalError;

/// Converts a serializable value into an inspectable [`Value`].
///
/// ```rust
/// use serde::Serialize;
/// use snapgate::value::to_value;
///
/// #[derive(Serialize)]
/// struct Account { id: u32, owner: String }
///
/// let value = to_value(&Account { id: 1, owner: "ada".into() }).unwrap();
/// assert_eq!(value.type_name().unwrap().as_str(), "Account");
/// ```
pub fn to_value<T: ?Sized + Serialize>(value: &T) -> Result<Value, ApprovalError> {
    value.serialize(ValueSerializer)
}

/// Serializer producing [`Value`] graphs.
pub struct ValueSerializer;

impl ser::Serializer for ValueSerializer {
    type Ok = Value;
    type Error = ApprovalError;

    type SerializeSeq = SerializeList;
    type SerializeTuple = SerializeList;
    type SerializeTupleStruct = SerializeList;
    type SerializeTupleVariant = SerializeList;
    type SerializeMap = SerializeMap;
    type SerializeStruct = SerializeObject;
    type SerializeStructVariant = SerializeObject;

    fn serialize_bool(self, v: bool) -> Result<Value, ApprovalError> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value, ApprovalError> {
        Ok(Value::Int(i64::from(v)))
    }

    fn serialize_i16(self, v: i16) -> Result<Value, ApprovalError> {
        Ok(Value::Int(i64::from(v)))
    }

    fn serialize_i32(self, v: i32) -> Result<Value, ApprovalError> {
        Ok(Value::Int(i64::from(v)))
    }

    fn serialize_i64(self, v: i64) -> Result<Value, ApprovalError> {
        Ok(Value::Int(v))
    }

    fn serialize_u8(self, v: u8) -> Result<Value, ApprovalError> {
        Ok(Value::UInt(u64::from(v)))
    }

    fn serialize_u16(self, v: u16) -> Result<Value, ApprovalError> {
        Ok(Value::UInt(u64::from(v)))
    }

    fn serialize_u32(self, v: u32) -> Result<Value, ApprovalError> {
        Ok(Value::UInt(u64::from(v)))
    }

    fn serialize_u64(self, v: u64) -> Result<Value, ApprovalError> {
        Ok(Value::UInt(v))
    }

    fn serialize_f32(self, v: f32) -> Result<Value, ApprovalError> {
        Ok(Value::Float(f64::from(v)))
    }

    fn serialize_f64(self, v: f64) -> Result<Value, ApprovalError> {
        Ok(Value::Float(v))
    }

    fn serialize_char(self, v: char) -> Result<Value, ApprovalError> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value, ApprovalError> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value, ApprovalError> {
        Ok(Value::List(v.iter().map(|b| Value::UInt(u64::from(*b))).collect()))
    }

    fn serialize_none(self) -> Result<Value, ApprovalError> {
        Ok(Value::Null)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Value, ApprovalError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value, ApprovalError> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<Value, ApprovalError> {
        Ok(Value::Named(TypeName::new(name), Box::new(Value::Null)))
    }

    fn serialize_unit_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Value, ApprovalError> {
        Ok(Value::Named(
            TypeName::new(name),
            Box::new(Value::String(variant.to_string())),
        ))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<Value, ApprovalError> {
        Ok(Value::Named(TypeName::new(name), Box::new(value.serialize(self)?)))
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value, ApprovalError> {
        let inner = value.serialize(ValueSerializer)?;
        Ok(Value::Object(ObjectRef::from_parts(
            name,
            vec![(variant.to_string(), inner)],
        )))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SerializeList, ApprovalError> {
        Ok(SerializeList::new(None, len))
    }

    fn serialize_tuple(self, len: usize) -> Result<SerializeList, ApprovalError> {
        Ok(SerializeList::new(None, Some(len)))
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        len: usize,
    ) -> Result<SerializeList, ApprovalError> {
        Ok(SerializeList::new(Some(Wrap::Named(name)), Some(len)))
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SerializeList, ApprovalError> {
        Ok(SerializeList::new(Some(Wrap::Variant(name, variant)), Some(len)))
    }

    fn serialize_map(self, len: Option<usize>) -> Result<SerializeMap, ApprovalError> {
        Ok(SerializeMap {
            entries: Vec::with_capacity(len.unwrap_or(0)),
            next_key: None,
        })
    }

    fn serialize_struct(
        self,
        name: &'static str,
        len: usize,
    ) -> Result<SerializeObject, ApprovalError> {
        Ok(SerializeObject {
            type_name: name,
            variant: None,
            fields: Vec::with_capacity(len),
        })
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SerializeObject, ApprovalError> {
        Ok(SerializeObject {
            type_name: name,
            variant: Some(variant),
            fields: Vec::with_capacity(len),
        })
    }
}

// ============================================================================
// COMPOUND SERIALIZERS
// ============================================================================

pub enum Wrap {
    Named(&'static str),
    Variant(&'static str, &'static str),
}

pub struct SerializeList {
    wrap: Option<Wrap>,
    items: Vec<Value>,
}

impl SerializeList {
    fn new(wrap: Option<Wrap>, len: Option<usize>) -> Self {
        Self {
            wrap,
            items: Vec::with_capacity(len.unwrap_or(0)),
        }
    }

    fn push<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ApprovalError> {
        self.items.push(value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn finish(self) -> Value {
        let list = Value::List(self.items);
        match self.wrap {
            None => list,
            Some(Wrap::Named(name)) => Value::Named(TypeName::new(name), Box::new(list)),
            Some(Wrap::Variant(name, variant)) => Value::Object(ObjectRef::from_parts(
                name,
                vec![(variant.to_string(), list)],
            )),
        }
    }
}

impl ser::SerializeSeq for SerializeList {
    type Ok = Value;
    type Error = ApprovalError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ApprovalError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, ApprovalError> {
        Ok(self.finish())
    }
}

impl ser::SerializeTuple for SerializeList {
    type Ok = Value;
    type Error = ApprovalError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ApprovalError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, ApprovalError> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleStruct for SerializeList {
    type Ok = Value;
    type Error = ApprovalError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ApprovalError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, ApprovalError> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleVariant for SerializeList {
    type Ok = Value;
    type Error = ApprovalError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ApprovalError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, ApprovalError> {
        Ok(self.finish())
    }
}

pub struct SerializeMap {
    entries: Vec<(String, Value)>,
    next_key: Option<String>,
}

impl ser::SerializeMap for SerializeMap {
    type Ok = Value;
    type Error = ApprovalError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), ApprovalError> {
        self.next_key = Some(map_key(key.serialize(ValueSerializer)?)?);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), ApprovalError> {
        let key = self
            .next_key
            .take()
            .ok_or_else(|| crate::err_msg!(Serialize, "map value serialized before its key"))?;
        self.entries.push((key, value.serialize(ValueSerializer)?));
        Ok(())
    }

    fn end(self) -> Result<Value, ApprovalError> {
        Ok(Value::Map(self.entries))
    }
}

/// Map keys must render as strings, like JSON object keys.
fn map_key(key: Value) -> Result<String, ApprovalError> {
    match key {
        Value::String(s) => Ok(s),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Int(n) => Ok(n.to_string()),
        Value::UInt(n) => Ok(n.to_string()),
        Value::Float(n) => Ok(n.to_string()),
        Value::Named(_, inner) => map_key(*inner),
        other => Err(crate::err_msg!(
            Serialize,
            "map key must be a string or scalar, found {}",
            other.summary()
        )),
    }
}

pub struct SerializeObject {
    type_name: &'static str,
    variant: Option<&'static str>,
    fields: Vec<(String, Value)>,
}

impl SerializeObject {
    fn push<T: ?Sized + Serialize>(&mut self, key: &'static str, value: &T) -> Result<(), ApprovalError> {
        self.fields.push((key.to_string(), value.serialize(ValueSerializer)?));
        Ok(())
    }

    fn finish(self) -> Value {
        match self.variant {
            None => Value::Object(ObjectRef::from_parts(self.type_name, self.fields)),
            Some(variant) => {
                let inner = ObjectRef::from_parts(variant, self.fields);
                Value::Object(ObjectRef::from_parts(
                    self.type_name,
                    vec![(variant.to_string(), Value::Object(inner))],
                ))
            }
        }
    }
}

impl ser::SerializeStruct for SerializeObject {
    type Ok = Value;
    type Error = ApprovalError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), ApprovalError> {
        self.push(key, value)
    }

    fn end(self) -> Result<Value, ApprovalError> {
        Ok(self.finish())
    }
}

impl ser::SerializeStructVariant for SerializeObject {
    type Ok = Value;
    type Error = ApprovalError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), ApprovalError> {
        self.push(key, value)
    }

    fn end(self) -> Result<Value, ApprovalError> {
        Ok(self.finish())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde::Serialize;

    use super::*;

    #[derive(Serialize)]
    struct UserId(u64);

    #[derive(Serialize)]
    enum Status {
        Active,
        Suspended { reason: String },
    }

    #[derive(Serialize)]
    struct User {
        id: UserId,
        name: String,
        status: Status,
        tags: Vec<&'static str>,
        nickname: Option<String>,
    }

    #[test]
    fn struct_names_become_runtime_types() {
        let user = User {
            id: UserId(9),
            name: "ada".into(),
            status: Status::Active,
            tags: vec!["a", "b"],
            nickname: None,
        };
        let value = to_value(&user).unwrap();
        assert_eq!(value.type_name().unwrap().as_str(), "User");
        assert_eq!(value.find_at("id").type_name().unwrap().as_str(), "UserId");
        assert_eq!(value.find_at("status").type_name().unwrap().as_str(), "Status");
        assert!(matches!(value.find_at("tags.1"), Value::String(ref s) if s == "b"));
        assert!(value.find_at("nickname").is_null());
    }

    #[test]
    fn struct_variants_nest_under_variant_name() {
        let value = to_value(&Status::Suspended {
            reason: "spam".into(),
        })
        .unwrap();
        assert_eq!(value.type_name().unwrap().as_str(), "Status");
        assert!(matches!(
            value.find_at("Suspended.reason"),
            Value::String(ref s) if s == "spam"
        ));
    }

    #[test]
    fn integer_map_keys_are_stringified() {
        let mut map = BTreeMap::new();
        map.insert(2u8, "two");
        map.insert(1u8, "one");
        let value = to_value(&map).unwrap();
        assert!(matches!(value.find_at("1"), Value::String(ref s) if s == "one"));
    }

    #[test]
    fn composite_map_keys_are_rejected() {
        let mut map = BTreeMap::new();
        map.insert(vec![1, 2], "pair");
        let err = to_value(&map).unwrap_err();
        assert!(err.to_string().contains("map key must be a string or scalar"));
    }
}
