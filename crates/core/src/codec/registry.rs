//! Codec registry
//!
//! Maps exact types to scalar codecs and resolves a [`Codec`] for any
//! [`TypeDescriptor`]:
//!
//! 1. `Mapping` shape → map codec (always, even if the container type is registered)
//! 2. `Sequence` shape → collection codec (always)
//! 3. exact `TypeId` match → registered codec
//! 4. `Enumeration` shape → default enumeration codec
//! 5. otherwise → not found
//!
//! There is no inheritance-based lookup. Registering a type twice replaces
//! the earlier codec.

use super::composite::{CollectionCodec, EnumCodec, MapCodec};
use super::scalar::{
    BigIntCodec, BoolCodec, BytesCodec, CharCodec, DurationCodec, FloatCodec, IntegerCodec,
    StringCodec, UuidCodec,
};
use super::{Codec, DynCodec, Erased, ScalarCodec};
use crate::error::{Error, Result};
use crate::field::{AnyValue, Shape, TypeDescriptor};
use crate::value::Value;
use num_bigint::BigInt;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Registry of codecs keyed by exact type
#[derive(Clone)]
pub struct CodecRegistry {
    scalars: HashMap<TypeId, Arc<dyn DynCodec>>,
}

impl CodecRegistry {
    /// Create a registry with the default codecs registered
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register::<String, _>(StringCodec);
        registry.register::<char, _>(CharCodec);
        registry.register::<i8, _>(IntegerCodec);
        registry.register::<i16, _>(IntegerCodec);
        registry.register::<i32, _>(IntegerCodec);
        registry.register::<i64, _>(IntegerCodec);
        registry.register::<BigInt, _>(BigIntCodec);
        registry.register::<f32, _>(FloatCodec);
        registry.register::<f64, _>(FloatCodec);
        registry.register::<bool, _>(BoolCodec);
        registry.register::<Uuid, _>(UuidCodec);
        registry.register::<Duration, _>(DurationCodec);
        registry.register::<Vec<u8>, _>(BytesCodec);
        registry
    }

    /// Create a registry with nothing registered
    pub fn empty() -> Self {
        Self {
            scalars: HashMap::new(),
        }
    }

    /// Register `codec` for exactly `T`, replacing any previous codec
    pub fn register<T: Any, C: ScalarCodec<T>>(&mut self, codec: C) {
        self.scalars
            .insert(TypeId::of::<T>(), Arc::new(Erased::<T, C>::new(codec)));
    }

    /// Check whether an exact-type codec is registered for `T`
    pub fn contains<T: Any>(&self) -> bool {
        self.scalars.contains_key(&TypeId::of::<T>())
    }

    /// Number of exact-type codecs
    pub fn len(&self) -> usize {
        self.scalars.len()
    }

    /// True if no exact-type codec is registered
    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty()
    }

    /// Resolve the codec for a declared type
    pub fn resolve(&self, ty: &TypeDescriptor) -> Option<Codec> {
        match ty.shape() {
            Shape::Mapping(_) => Some(Codec::Mapping(MapCodec)),
            Shape::Sequence(_) => Some(Codec::Sequence(CollectionCodec)),
            Shape::Scalar => self.scalars.get(&ty.type_id()).cloned().map(Codec::Scalar),
            Shape::Enumeration(_) => match self.scalars.get(&ty.type_id()) {
                Some(codec) => Some(Codec::Scalar(codec.clone())),
                None => EnumCodec::for_type(ty)
                    .map(|codec| Codec::Scalar(Arc::new(codec) as Arc<dyn DynCodec>)),
            },
        }
    }

    /// Resolve, treating "not found" as an error
    pub fn require(&self, ty: &TypeDescriptor) -> Result<Codec> {
        self.resolve(ty).ok_or(Error::NoCodecFound {
            type_name: ty.type_name(),
        })
    }

    /// Check that `ty` and every type nested in it resolves
    pub fn validate(&self, ty: &TypeDescriptor) -> Result<()> {
        self.require(ty)?;
        match ty.shape() {
            Shape::Sequence(adapter) => self.validate(adapter.element()),
            Shape::Mapping(adapter) => {
                self.validate(adapter.key())?;
                self.validate(adapter.value())
            }
            Shape::Scalar | Shape::Enumeration(_) => Ok(()),
        }
    }

    /// Resolve and encode in one step
    pub fn encode(&self, ty: &TypeDescriptor, value: &dyn Any) -> Result<Value> {
        self.require(ty)?.encode(ty, value, self)
    }

    /// Resolve and decode in one step
    pub fn decode(&self, ty: &TypeDescriptor, value: &Value) -> Result<AnyValue> {
        self.require(ty)?.decode(ty, value, self)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("scalar_count", &self.scalars.len())
            .finish()
    }
}
