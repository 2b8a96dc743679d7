//! Field type descriptors
//!
//! A [`TypeDescriptor`] tells the codec registry what a field's declared
//! type looks like without runtime reflection:
//!
//! - `Scalar`: resolved by exact `TypeId`
//! - `Enumeration`: exact `TypeId` first, then the default enumeration codec
//! - `Sequence`: always the collection codec, recursing into the element type
//! - `Mapping`: always the map codec, recursing into key and value types
//!
//! Types describe themselves by implementing [`Persist`]. `Vec<u8>` is the
//! one container described as a scalar: it is stored as raw bytes. Composite shapes
//! carry monomorphized adapter functions that split a container into
//! type-erased parts and rebuild it from decoded parts.

use num_bigint::BigInt;
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::time::Duration;
use uuid::Uuid;

/// A type-erased, owned field value
pub type AnyValue = Box<dyn Any>;

type TextFn = fn(&dyn Any) -> Option<String>;

/// A type that can be stored in a model field
///
/// Implemented for the built-in scalar kinds, `Vec`, `HashSet`,
/// `BTreeSet`, `HashMap` and `BTreeMap`. Custom types implement it with
/// [`TypeDescriptor::scalar`] and register a codec for their exact type.
///
/// ```ignore
/// impl Persist for Money {
///     fn descriptor() -> TypeDescriptor {
///         TypeDescriptor::scalar::<Self>()
///     }
/// }
/// ```
pub trait Persist: Any + Send + Sync {
    /// Shape of this type
    fn descriptor() -> TypeDescriptor
    where
        Self: Sized;
}

/// A fieldless enum stored by variant name
///
/// ```ignore
/// #[derive(Clone, PartialEq)]
/// enum Role { Admin, Member }
///
/// impl PersistEnum for Role {
///     const VARIANTS: &'static [Self] = &[Role::Admin, Role::Member];
///     fn variant_name(&self) -> &'static str {
///         match self { Role::Admin => "ADMIN", Role::Member => "MEMBER" }
///     }
/// }
///
/// impl Persist for Role {
///     fn descriptor() -> TypeDescriptor {
///         TypeDescriptor::enumeration::<Self>()
///     }
/// }
/// ```
pub trait PersistEnum: Clone + Send + Sync + 'static {
    /// Every variant, used to resolve names back into values
    const VARIANTS: &'static [Self];

    /// Stored name of this variant
    fn variant_name(&self) -> &'static str;
}

/// Declared type of a field
#[derive(Clone)]
pub struct TypeDescriptor {
    type_id: TypeId,
    type_name: &'static str,
    shape: Shape,
    text: Option<TextFn>,
}

/// Shape of a declared type
#[derive(Clone)]
pub enum Shape {
    /// Plain value resolved by exact type
    Scalar,
    /// Fieldless enum stored by variant name
    Enumeration(EnumAdapter),
    /// Homogeneous collection
    Sequence(SequenceAdapter),
    /// Key/value map
    Mapping(MappingAdapter),
}

/// Name conversions for an enumeration type
#[derive(Clone)]
pub struct EnumAdapter {
    to_name: fn(&dyn Any) -> Option<&'static str>,
    from_name: fn(&str) -> Option<AnyValue>,
}

/// Split/rebuild functions for a sequence type
#[derive(Clone)]
pub struct SequenceAdapter {
    element: Box<TypeDescriptor>,
    split: fn(&dyn Any) -> Option<Vec<&dyn Any>>,
    build: fn(Vec<AnyValue>) -> Option<AnyValue>,
}

/// Split/rebuild functions for a map type
#[derive(Clone)]
pub struct MappingAdapter {
    key: Box<TypeDescriptor>,
    value: Box<TypeDescriptor>,
    split: fn(&dyn Any) -> Option<Vec<(&dyn Any, &dyn Any)>>,
    build: fn(Vec<(AnyValue, AnyValue)>) -> Option<AnyValue>,
}

impl TypeDescriptor {
    /// Scalar type with no textual form
    pub fn scalar<T: Any>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            shape: Shape::Scalar,
            text: None,
        }
    }

    /// Scalar type whose `Display` output is its textual form
    ///
    /// The textual form is what ordered filter comparisons parse.
    pub fn scalar_display<T: Any + fmt::Display>() -> Self {
        Self {
            text: Some(display_text::<T> as TextFn),
            ..Self::scalar::<T>()
        }
    }

    /// Enumeration stored by variant name
    pub fn enumeration<E: PersistEnum>() -> Self {
        Self {
            type_id: TypeId::of::<E>(),
            type_name: std::any::type_name::<E>(),
            shape: Shape::Enumeration(EnumAdapter {
                to_name: enum_to_name::<E>,
                from_name: enum_from_name::<E>,
            }),
            text: Some(enum_text::<E> as TextFn),
        }
    }

    /// Sequence container `C` of `T`
    pub fn sequence<C, T>() -> Self
    where
        C: FromIterator<T> + Any,
        T: Persist,
        for<'a> &'a C: IntoIterator<Item = &'a T>,
    {
        Self {
            type_id: TypeId::of::<C>(),
            type_name: std::any::type_name::<C>(),
            shape: Shape::Sequence(SequenceAdapter {
                element: Box::new(T::descriptor()),
                split: split_sequence::<C, T>,
                build: build_sequence::<C, T>,
            }),
            text: None,
        }
    }

    /// Map container `C` from `K` to `V`
    pub fn mapping<C, K, V>() -> Self
    where
        C: FromIterator<(K, V)> + Any,
        K: Persist,
        V: Persist,
        for<'a> &'a C: IntoIterator<Item = (&'a K, &'a V)>,
    {
        Self {
            type_id: TypeId::of::<C>(),
            type_name: std::any::type_name::<C>(),
            shape: Shape::Mapping(MappingAdapter {
                key: Box::new(K::descriptor()),
                value: Box::new(V::descriptor()),
                split: split_mapping::<C, K, V>,
                build: build_mapping::<C, K, V>,
            }),
            text: None,
        }
    }

    /// Descriptor of `T`
    pub fn of<T: Persist>() -> Self {
        T::descriptor()
    }

    /// Exact type identity
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Rust type name, for diagnostics
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Shape of the type
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Textual form of a value of this type, if the type has one
    pub fn text_of(&self, value: &dyn Any) -> Option<String> {
        self.text.and_then(|text| text(value))
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = match &self.shape {
            Shape::Scalar => "Scalar",
            Shape::Enumeration(_) => "Enumeration",
            Shape::Sequence(_) => "Sequence",
            Shape::Mapping(_) => "Mapping",
        };
        f.debug_struct("TypeDescriptor")
            .field("type_name", &self.type_name)
            .field("shape", &shape)
            .finish()
    }
}

impl EnumAdapter {
    /// Variant name of an enum value
    pub fn name_of(&self, value: &dyn Any) -> Option<&'static str> {
        (self.to_name)(value)
    }

    /// Enum value for a stored name
    pub fn from_name(&self, name: &str) -> Option<AnyValue> {
        (self.from_name)(name)
    }
}

impl SequenceAdapter {
    /// Element type
    pub fn element(&self) -> &TypeDescriptor {
        &self.element
    }

    /// Borrow every element of the container
    pub fn split<'a>(&self, value: &'a dyn Any) -> Option<Vec<&'a dyn Any>> {
        (self.split)(value)
    }

    /// Rebuild the container from decoded elements
    pub fn build(&self, items: Vec<AnyValue>) -> Option<AnyValue> {
        (self.build)(items)
    }
}

impl MappingAdapter {
    /// Key type
    pub fn key(&self) -> &TypeDescriptor {
        &self.key
    }

    /// Value type
    pub fn value(&self) -> &TypeDescriptor {
        &self.value
    }

    /// Borrow every entry of the map
    pub fn split<'a>(&self, value: &'a dyn Any) -> Option<Vec<(&'a dyn Any, &'a dyn Any)>> {
        (self.split)(value)
    }

    /// Rebuild the map from decoded entries
    pub fn build(&self, entries: Vec<(AnyValue, AnyValue)>) -> Option<AnyValue> {
        (self.build)(entries)
    }
}

// ============================================================================
// Adapter functions (monomorphized per container type)
// ============================================================================

fn display_text<T: Any + fmt::Display>(value: &dyn Any) -> Option<String> {
    value.downcast_ref::<T>().map(|v| v.to_string())
}

fn enum_to_name<E: PersistEnum>(value: &dyn Any) -> Option<&'static str> {
    value.downcast_ref::<E>().map(E::variant_name)
}

fn enum_from_name<E: PersistEnum>(name: &str) -> Option<AnyValue> {
    E::VARIANTS
        .iter()
        .find(|variant| variant.variant_name() == name)
        .map(|variant| Box::new(variant.clone()) as AnyValue)
}

fn enum_text<E: PersistEnum>(value: &dyn Any) -> Option<String> {
    enum_to_name::<E>(value).map(str::to_string)
}

fn split_sequence<C, T>(value: &dyn Any) -> Option<Vec<&dyn Any>>
where
    C: Any,
    T: Any,
    for<'a> &'a C: IntoIterator<Item = &'a T>,
{
    let container = value.downcast_ref::<C>()?;
    Some(container.into_iter().map(|item| item as &dyn Any).collect())
}

fn build_sequence<C, T>(items: Vec<AnyValue>) -> Option<AnyValue>
where
    C: FromIterator<T> + Any,
    T: Any,
{
    let container = items
        .into_iter()
        .map(|item| item.downcast::<T>().ok().map(|item| *item))
        .collect::<Option<C>>()?;
    Some(Box::new(container))
}

fn split_mapping<C, K, V>(value: &dyn Any) -> Option<Vec<(&dyn Any, &dyn Any)>>
where
    C: Any,
    K: Any,
    V: Any,
    for<'a> &'a C: IntoIterator<Item = (&'a K, &'a V)>,
{
    let container = value.downcast_ref::<C>()?;
    Some(
        container
            .into_iter()
            .map(|(k, v)| (k as &dyn Any, v as &dyn Any))
            .collect(),
    )
}

fn build_mapping<C, K, V>(entries: Vec<(AnyValue, AnyValue)>) -> Option<AnyValue>
where
    C: FromIterator<(K, V)> + Any,
    K: Any,
    V: Any,
{
    let container = entries
        .into_iter()
        .map(|(k, v)| Some((*k.downcast::<K>().ok()?, *v.downcast::<V>().ok()?)))
        .collect::<Option<C>>()?;
    Some(Box::new(container))
}

// ============================================================================
// Built-in Persist implementations
// ============================================================================

macro_rules! persist_display_scalars {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Persist for $ty {
                fn descriptor() -> TypeDescriptor {
                    TypeDescriptor::scalar_display::<Self>()
                }
            }
        )*
    };
}

persist_display_scalars!(String, char, i8, i16, i32, i64, BigInt, f32, f64, bool, Uuid);

impl Persist for Duration {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::scalar::<Self>()
    }
}

/// Raw bytes are a scalar, not a sequence of `u8`
impl Persist for Vec<u8> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::scalar::<Self>()
    }
}

impl<T: Persist> Persist for Vec<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::sequence::<Self, T>()
    }
}

impl<T: Persist + Eq + Hash> Persist for HashSet<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::sequence::<Self, T>()
    }
}

impl<T: Persist + Ord> Persist for BTreeSet<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::sequence::<Self, T>()
    }
}

impl<K: Persist + Eq + Hash, V: Persist> Persist for HashMap<K, V> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::mapping::<Self, K, V>()
    }
}

impl<K: Persist + Ord, V: Persist> Persist for BTreeMap<K, V> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::mapping::<Self, K, V>()
    }
}
