//! Predicate filtering over live records
//!
//! `Eq` and `Ne` compare the field with the query value natively: the
//! field must hold exactly the query value's type, otherwise the two are
//! unequal. Ordered operators compare integral text forms: the textual
//! forms of the field and of the query value must both parse as `i64`,
//! otherwise the record does not match. Types without a textual form
//! (durations, collections, maps) never satisfy an ordered operator.
//!
//! A field name the model does not declare is logged and matches nothing;
//! the scan never fails.

use std::any::Any;
use strata_odm_core::{FieldDescriptor, FilterOp, ModelSchema, Persist, Shared, TypeDescriptor};
use tracing::{debug, warn};

/// Whether `model` satisfies `field op value`
pub fn field_matches<M, V>(field: &FieldDescriptor<M>, model: &M, op: FilterOp, value: &V) -> bool
where
    V: Persist + PartialEq,
{
    let current = field.get(model);
    if !op.is_ordered() {
        let equal = current.downcast_ref::<V>() == Some(value);
        return match op {
            FilterOp::Ne => !equal,
            _ => equal,
        };
    }

    let left = integral(field.type_descriptor(), current);
    let right = integral(&TypeDescriptor::of::<V>(), value as &dyn Any);
    match (left, right) {
        (Some(left), Some(right)) => op.compare(left, right),
        _ => {
            debug!(field = field.name(), %op, "Operands are not integral, no match");
            false
        }
    }
}

fn integral(ty: &TypeDescriptor, value: &dyn Any) -> Option<i64> {
    ty.text_of(value)?.trim().parse::<i64>().ok()
}

/// Records whose `field` satisfies `op value`, in input order
pub fn filter<M, V>(
    schema: &ModelSchema<M>,
    records: &[Shared<M>],
    field: &str,
    op: FilterOp,
    value: &V,
) -> Vec<Shared<M>>
where
    V: Persist + PartialEq,
{
    let Some(descriptor) = schema.field(field) else {
        warn!(
            model = schema.model_name(),
            field,
            "Filter on unknown field matches nothing"
        );
        return Vec::new();
    };

    records
        .iter()
        .filter(|record| field_matches(descriptor, &*record.read(), op, value))
        .cloned()
        .collect()
}
