//! Composite codecs: maps, collections and enumerations
//!
//! Map and collection codecs carry no state of their own. They read the
//! adapter from the field's [`TypeDescriptor`] and resolve a codec for every
//! nested type through the registry they are handed.

use super::{CodecRegistry, DynCodec};
use crate::error::{Error, Result};
use crate::field::{AnyValue, EnumAdapter, Shape, TypeDescriptor};
use crate::value::Value;
use std::any::Any;
use std::collections::HashMap;

fn shape_error(ty: &TypeDescriptor, expected: &str) -> Error {
    Error::Codec {
        type_name: ty.type_name(),
        reason: format!("declared type is not {}", expected),
    }
}

fn value_error(ty: &TypeDescriptor, reason: impl Into<String>) -> Error {
    Error::Codec {
        type_name: ty.type_name(),
        reason: reason.into(),
    }
}

/// Map codec
///
/// Encodes to `Value::Object`. Keys are encoded with the key type's codec
/// and stored by their textual form; values keep their encoded form.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapCodec;

impl MapCodec {
    /// Encode a map declared as `ty`
    pub fn encode(
        &self,
        ty: &TypeDescriptor,
        value: &dyn Any,
        registry: &CodecRegistry,
    ) -> Result<Value> {
        let Shape::Mapping(adapter) = ty.shape() else {
            return Err(shape_error(ty, "a map"));
        };
        let entries = adapter
            .split(value)
            .ok_or_else(|| value_error(ty, "value has a different runtime type"))?;

        let key_codec = registry.require(adapter.key())?;
        let value_codec = registry.require(adapter.value())?;

        let mut object = HashMap::with_capacity(entries.len());
        for (k, v) in entries {
            let key = key_codec.encode(adapter.key(), k, registry)?;
            let key = key
                .to_text()
                .ok_or_else(|| value_error(adapter.key(), "map key has no textual form"))?;
            let encoded = value_codec.encode(adapter.value(), v, registry)?;
            object.insert(key, encoded);
        }
        Ok(Value::Object(object))
    }

    /// Decode a stored object into the map type `ty`
    pub fn decode(
        &self,
        ty: &TypeDescriptor,
        value: &Value,
        registry: &CodecRegistry,
    ) -> Result<AnyValue> {
        let Shape::Mapping(adapter) = ty.shape() else {
            return Err(shape_error(ty, "a map"));
        };
        let object = value
            .as_object()
            .ok_or_else(|| value_error(ty, format!("expected Object, got {}", value.type_name())))?;

        let key_codec = registry.require(adapter.key())?;
        let value_codec = registry.require(adapter.value())?;

        let mut entries = Vec::with_capacity(object.len());
        for (k, v) in object {
            let key = key_codec.decode(adapter.key(), &Value::String(k.clone()), registry)?;
            let decoded = value_codec.decode(adapter.value(), v, registry)?;
            entries.push((key, decoded));
        }
        adapter
            .build(entries)
            .ok_or_else(|| value_error(ty, "decoded entries do not fit the map type"))
    }
}

/// Collection codec
///
/// Encodes to `Value::Array`, one element per item in iteration order.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectionCodec;

impl CollectionCodec {
    /// Encode a collection declared as `ty`
    pub fn encode(
        &self,
        ty: &TypeDescriptor,
        value: &dyn Any,
        registry: &CodecRegistry,
    ) -> Result<Value> {
        let Shape::Sequence(adapter) = ty.shape() else {
            return Err(shape_error(ty, "a collection"));
        };
        let items = adapter
            .split(value)
            .ok_or_else(|| value_error(ty, "value has a different runtime type"))?;

        let codec = registry.require(adapter.element())?;
        let encoded = items
            .into_iter()
            .map(|item| codec.encode(adapter.element(), item, registry))
            .collect::<Result<Vec<_>>>()?;
        Ok(Value::Array(encoded))
    }

    /// Decode a stored array into the collection type `ty`
    pub fn decode(
        &self,
        ty: &TypeDescriptor,
        value: &Value,
        registry: &CodecRegistry,
    ) -> Result<AnyValue> {
        let Shape::Sequence(adapter) = ty.shape() else {
            return Err(shape_error(ty, "a collection"));
        };
        let items = value
            .as_array()
            .ok_or_else(|| value_error(ty, format!("expected Array, got {}", value.type_name())))?;

        let codec = registry.require(adapter.element())?;
        let decoded = items
            .iter()
            .map(|item| codec.decode(adapter.element(), item, registry))
            .collect::<Result<Vec<_>>>()?;
        adapter
            .build(decoded)
            .ok_or_else(|| value_error(ty, "decoded items do not fit the collection type"))
    }
}

/// Default enumeration codec, storing the variant name
pub struct EnumCodec {
    type_name: &'static str,
    adapter: EnumAdapter,
}

impl EnumCodec {
    /// Codec for the enumeration described by `ty`, if it is one
    pub fn for_type(ty: &TypeDescriptor) -> Option<Self> {
        match ty.shape() {
            Shape::Enumeration(adapter) => Some(Self {
                type_name: ty.type_name(),
                adapter: adapter.clone(),
            }),
            _ => None,
        }
    }
}

impl DynCodec for EnumCodec {
    fn encode_any(&self, value: &dyn Any) -> Result<Value> {
        self.adapter
            .name_of(value)
            .map(|name| Value::String(name.to_string()))
            .ok_or_else(|| Error::Codec {
                type_name: self.type_name,
                reason: "value has a different runtime type".to_string(),
            })
    }

    fn decode_any(&self, value: &Value) -> Result<AnyValue> {
        let name = value.as_str().ok_or_else(|| Error::Codec {
            type_name: self.type_name,
            reason: format!("expected String, got {}", value.type_name()),
        })?;
        self.adapter.from_name(name.trim()).ok_or_else(|| Error::Codec {
            type_name: self.type_name,
            reason: format!("unknown variant {:?}", name),
        })
    }
}
