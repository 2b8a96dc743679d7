//! Model declarations and validated schemas
//!
//! A model type supplies its schema explicitly through [`Model::declare`]:
//!
//! ```ignore
//! #[derive(Default)]
//! struct User { id: Uuid, name: String, age: i32 }
//!
//! impl Model for User {
//!     fn declare(model: ModelBuilder<Self>) -> ModelBuilder<Self> {
//!         model
//!             .table("users")
//!             .cached(true)
//!             .primary_key("id", |u| &u.id, |u, v| u.id = v)
//!             .field("name", |u| &u.name, |u, v| u.name = v)
//!             .field("age", |u| &u.age, |u, v| u.age = v)
//!             .named("user_age")
//!     }
//! }
//! ```
//!
//! [`ModelBuilder::build`] validates the declaration once; the resulting
//! [`ModelSchema`] is immutable.

use crate::error::{Error, Result};
use crate::field::{AnyValue, Persist, TypeDescriptor};
use std::any::Any;
use std::collections::HashSet;

/// A persisted application type
///
/// The default `declare` leaves the builder untouched, which fails
/// registration with [`Error::ModelDeclarationMissing`].
pub trait Model: Default + Send + Sync + 'static {
    /// Describe storage name, flags and fields
    fn declare(model: ModelBuilder<Self>) -> ModelBuilder<Self> {
        model
    }
}

/// Typed field accessors behind a trait object
trait Accessor<M>: Send + Sync {
    fn get<'a>(&self, model: &'a M) -> &'a dyn Any;
    fn set(&self, model: &mut M, value: AnyValue) -> bool;
}

struct FieldAccess<M, T> {
    get: fn(&M) -> &T,
    set: fn(&mut M, T),
}

impl<M: 'static, T: Any> Accessor<M> for FieldAccess<M, T> {
    fn get<'a>(&self, model: &'a M) -> &'a dyn Any {
        (self.get)(model)
    }

    fn set(&self, model: &mut M, value: AnyValue) -> bool {
        match value.downcast::<T>() {
            Ok(value) => {
                (self.set)(model, *value);
                true
            }
            Err(_) => false,
        }
    }
}

/// One persisted field of a model
pub struct FieldDescriptor<M> {
    name: String,
    external: Option<String>,
    primary_key: bool,
    ty: TypeDescriptor,
    access: Box<dyn Accessor<M>>,
}

impl<M> FieldDescriptor<M> {
    /// Declared (Rust-side) field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name used in stored documents: the explicit rename or the declared name
    pub fn external_name(&self) -> &str {
        self.external.as_deref().unwrap_or(&self.name)
    }

    /// Whether this field is the primary key
    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    /// Declared type
    pub fn type_descriptor(&self) -> &TypeDescriptor {
        &self.ty
    }

    /// Borrow the field's current value
    pub fn get<'a>(&self, model: &'a M) -> &'a dyn Any {
        self.access.get(model)
    }

    /// Replace the field's value
    pub fn set(&self, model: &mut M, value: AnyValue) -> Result<()> {
        if self.access.set(model, value) {
            Ok(())
        } else {
            Err(Error::Codec {
                type_name: self.ty.type_name(),
                reason: format!("decoded value for field {} has the wrong type", self.name),
            })
        }
    }
}

impl<M> std::fmt::Debug for FieldDescriptor<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("external_name", &self.external_name())
            .field("primary_key", &self.primary_key)
            .field("type", &self.ty)
            .finish()
    }
}

/// Builder handed to [`Model::declare`]
pub struct ModelBuilder<M> {
    table: Option<String>,
    cached: bool,
    auto_fetch: bool,
    fields: Vec<FieldDescriptor<M>>,
}

impl<M: Model> ModelBuilder<M> {
    /// Start an empty declaration
    pub fn new() -> Self {
        Self {
            table: None,
            cached: false,
            auto_fetch: false,
            fields: Vec::new(),
        }
    }

    /// Storage name of the backing collection
    pub fn table(mut self, name: impl Into<String>) -> Self {
        self.table = Some(name.into());
        self
    }

    /// Keep fetched and saved instances in the cache
    pub fn cached(mut self, cached: bool) -> Self {
        self.cached = cached;
        self
    }

    /// Fetch every record at registration time (only with `cached`)
    pub fn auto_fetch(mut self, auto_fetch: bool) -> Self {
        self.auto_fetch = auto_fetch;
        self
    }

    /// Add a persisted field
    pub fn field<T: Persist>(
        self,
        name: impl Into<String>,
        get: fn(&M) -> &T,
        set: fn(&mut M, T),
    ) -> Self {
        self.push(name.into(), false, get, set)
    }

    /// Add the primary-key field
    pub fn primary_key<T: Persist>(
        self,
        name: impl Into<String>,
        get: fn(&M) -> &T,
        set: fn(&mut M, T),
    ) -> Self {
        self.push(name.into(), true, get, set)
    }

    /// Store the most recently added field under `external` instead of its name
    pub fn named(mut self, external: impl Into<String>) -> Self {
        if let Some(field) = self.fields.last_mut() {
            field.external = Some(external.into());
        }
        self
    }

    fn push<T: Persist>(
        mut self,
        name: String,
        primary_key: bool,
        get: fn(&M) -> &T,
        set: fn(&mut M, T),
    ) -> Self {
        self.fields.push(FieldDescriptor {
            name,
            external: None,
            primary_key,
            ty: T::descriptor(),
            access: Box::new(FieldAccess { get, set }),
        });
        self
    }

    /// Validate the declaration
    ///
    /// Fails when no storage name was declared, when field names are empty
    /// or collide, or when the primary key count is not exactly one.
    pub fn build(self) -> Result<ModelSchema<M>> {
        let model = std::any::type_name::<M>();
        let table = self.table.ok_or(Error::ModelDeclarationMissing { model })?;
        if table.trim().is_empty() {
            return Err(Error::InvalidSchema {
                model,
                reason: "storage name is empty".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.is_empty() || field.external_name().is_empty() {
                return Err(Error::InvalidSchema {
                    model,
                    reason: "field without a name".to_string(),
                });
            }
            if !seen.insert(field.external_name().to_string()) {
                return Err(Error::InvalidSchema {
                    model,
                    reason: format!("duplicate field name {}", field.external_name()),
                });
            }
        }

        let keys: Vec<usize> = self
            .fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.primary_key)
            .map(|(i, _)| i)
            .collect();
        let primary = match keys.as_slice() {
            [] => return Err(Error::NoPrimaryKey { model }),
            [single] => *single,
            many => {
                return Err(Error::MultiplePrimaryKeys {
                    model,
                    count: many.len(),
                })
            }
        };

        Ok(ModelSchema {
            model,
            table,
            cached: self.cached,
            auto_fetch: self.auto_fetch,
            fields: self.fields,
            primary,
        })
    }
}

impl<M: Model> Default for ModelBuilder<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Validated, immutable description of a model
pub struct ModelSchema<M> {
    model: &'static str,
    table: String,
    cached: bool,
    auto_fetch: bool,
    fields: Vec<FieldDescriptor<M>>,
    primary: usize,
}

impl<M: Model> ModelSchema<M> {
    /// Build and validate the schema `M` declares
    pub fn of() -> Result<Self> {
        M::declare(ModelBuilder::new()).build()
    }
}

impl<M> ModelSchema<M> {
    /// Rust type name of the model
    pub fn model_name(&self) -> &'static str {
        self.model
    }

    /// Storage name
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Whether instances are cached
    pub fn is_cached(&self) -> bool {
        self.cached
    }

    /// Whether registration primes the cache with a full fetch
    pub fn auto_fetch(&self) -> bool {
        self.cached && self.auto_fetch
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[FieldDescriptor<M>] {
        &self.fields
    }

    /// The primary-key field
    pub fn primary_key(&self) -> &FieldDescriptor<M> {
        &self.fields[self.primary]
    }

    /// Find a field by declared name, falling back to external name
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor<M>> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .or_else(|| self.fields.iter().find(|f| f.external_name() == name))
    }

    /// Find a field or fail with [`Error::UnknownField`]
    pub fn require_field(&self, name: &str) -> Result<&FieldDescriptor<M>> {
        self.field(name).ok_or_else(|| Error::UnknownField {
            model: self.model,
            field: name.to_string(),
        })
    }
}

impl<M> std::fmt::Debug for ModelSchema<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSchema")
            .field("model", &self.model)
            .field("table", &self.table)
            .field("cached", &self.cached)
            .field("auto_fetch", &self.auto_fetch)
            .field("fields", &self.fields)
            .finish()
    }
}
