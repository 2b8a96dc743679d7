//! Model instance ⇄ document conversion
//!
//! Serialization walks the schema's fields in declaration order, resolves
//! each field's codec and writes the encoded value under the field's
//! external name. The primary key lands in both the key and the value
//! document.
//!
//! Deserialization starts from `M::default()` and decodes every field the
//! document carries. Absent (or `Null`) fields keep their default and are
//! reported in [`Decoded::missing`] so the caller can issue a repair write.

use strata_odm_core::{
    CodecRegistry, Document, Model, ModelSchema, Result, SerializedRecord, Value,
};

/// Outcome of decoding one document
#[derive(Debug)]
pub struct Decoded<M> {
    /// The rebuilt model value
    pub model: M,
    /// External names of fields the document lacked
    pub missing: Vec<String>,
}

impl<M> Decoded<M> {
    /// True when at least one field fell back to its default
    pub fn is_dirty(&self) -> bool {
        !self.missing.is_empty()
    }
}

/// Encode `model` into its key and value documents
///
/// Fails on the first field whose type has no codec.
pub fn serialize<M>(
    schema: &ModelSchema<M>,
    registry: &CodecRegistry,
    model: &M,
) -> Result<SerializedRecord> {
    let mut key = Document::new();
    let mut value = Document::new();
    for field in schema.fields() {
        let encoded = registry.encode(field.type_descriptor(), field.get(model))?;
        if field.is_primary_key() {
            key.insert(field.external_name(), encoded.clone());
        }
        value.insert(field.external_name(), encoded);
    }
    Ok(SerializedRecord { key, value })
}

/// Encode only the key document of `model`
pub fn key_document<M>(
    schema: &ModelSchema<M>,
    registry: &CodecRegistry,
    model: &M,
) -> Result<Document> {
    let field = schema.primary_key();
    let encoded = registry.encode(field.type_descriptor(), field.get(model))?;
    Ok(Document::new().with(field.external_name(), encoded))
}

/// Rebuild a model from a stored document
///
/// Fields the model does not declare are ignored.
pub fn deserialize<M: Model>(
    schema: &ModelSchema<M>,
    registry: &CodecRegistry,
    document: &Document,
) -> Result<Decoded<M>> {
    let mut model = M::default();
    let mut missing = Vec::new();
    for field in schema.fields() {
        match document.get(field.external_name()) {
            None | Some(Value::Null) => missing.push(field.external_name().to_string()),
            Some(stored) => {
                let decoded = registry.decode(field.type_descriptor(), stored)?;
                field.set(&mut model, decoded)?;
            }
        }
    }
    Ok(Decoded { model, missing })
}
