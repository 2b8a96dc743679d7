//! Codecs: conversions between native field values and [`Value`]
//!
//! A [`Codec`] is a closed set of three strategies:
//!
//! - `Scalar`: a registered [`ScalarCodec`] for one exact type
//! - `Mapping`: the map codec, recursing into keys and values
//! - `Sequence`: the collection codec, recursing into elements
//!
//! Composite codecs receive the whole [`CodecRegistry`] so every nested
//! value is resolved through the same lookup used at the top level.

mod composite;
mod registry;
mod scalar;

pub use composite::{CollectionCodec, EnumCodec, MapCodec};
pub use registry::CodecRegistry;
pub use scalar::{
    BigIntCodec, BoolCodec, BytesCodec, CharCodec, DurationCodec, FloatCodec, IntegerCodec,
    StringCodec, UuidCodec,
};

use crate::error::{Error, Result};
use crate::field::{AnyValue, TypeDescriptor};
use crate::value::Value;
use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

/// Typed conversion for one exact type
///
/// Implement this to plug a custom field type into the registry.
pub trait ScalarCodec<T>: Send + Sync + 'static {
    /// Convert a native value into its stored form
    fn encode(&self, value: &T) -> Result<Value>;

    /// Convert a stored value back into the native type
    fn decode(&self, value: &Value) -> Result<T>;
}

/// Type-erased scalar codec stored in the registry
pub trait DynCodec: Send + Sync {
    /// Encode a value whose runtime type must match the codec
    fn encode_any(&self, value: &dyn Any) -> Result<Value>;

    /// Decode into a boxed native value
    fn decode_any(&self, value: &Value) -> Result<AnyValue>;
}

/// Adapter erasing the type parameter of a [`ScalarCodec`]
pub(crate) struct Erased<T, C> {
    codec: C,
    _marker: PhantomData<fn() -> T>,
}

impl<T, C> Erased<T, C> {
    pub(crate) fn new(codec: C) -> Self {
        Self {
            codec,
            _marker: PhantomData,
        }
    }
}

impl<T: Any, C: ScalarCodec<T>> DynCodec for Erased<T, C> {
    fn encode_any(&self, value: &dyn Any) -> Result<Value> {
        let value = value
            .downcast_ref::<T>()
            .ok_or_else(|| Error::codec::<T>("value has a different runtime type"))?;
        self.codec.encode(value)
    }

    fn decode_any(&self, value: &Value) -> Result<AnyValue> {
        Ok(Box::new(self.codec.decode(value)?))
    }
}

/// Kind of a resolved codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecKind {
    /// Exact-type codec
    Scalar,
    /// Map codec
    Mapping,
    /// Collection codec
    Sequence,
}

/// A resolved conversion strategy
#[derive(Clone)]
pub enum Codec {
    /// Exact-type codec (includes the default enumeration codec)
    Scalar(Arc<dyn DynCodec>),
    /// Map codec
    Mapping(MapCodec),
    /// Collection codec
    Sequence(CollectionCodec),
}

impl Codec {
    /// Which strategy this is
    pub fn kind(&self) -> CodecKind {
        match self {
            Codec::Scalar(_) => CodecKind::Scalar,
            Codec::Mapping(_) => CodecKind::Mapping,
            Codec::Sequence(_) => CodecKind::Sequence,
        }
    }

    /// Encode `value`, declared as `ty`
    pub fn encode(
        &self,
        ty: &TypeDescriptor,
        value: &dyn Any,
        registry: &CodecRegistry,
    ) -> Result<Value> {
        match self {
            Codec::Scalar(codec) => codec.encode_any(value),
            Codec::Mapping(codec) => codec.encode(ty, value, registry),
            Codec::Sequence(codec) => codec.encode(ty, value, registry),
        }
    }

    /// Decode `value` into the native type described by `ty`
    pub fn decode(
        &self,
        ty: &TypeDescriptor,
        value: &Value,
        registry: &CodecRegistry,
    ) -> Result<AnyValue> {
        match self {
            Codec::Scalar(codec) => codec.decode_any(value),
            Codec::Mapping(codec) => codec.decode(ty, value, registry),
            Codec::Sequence(codec) => codec.decode(ty, value, registry),
        }
    }
}

impl std::fmt::Debug for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Codec").field(&self.kind()).finish()
    }
}
