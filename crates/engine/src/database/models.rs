//! Registering several models at once

use super::Database;
use strata_odm_core::{Model, Result};

/// A list of model types registered together, in order
///
/// Implemented for tuples of up to eight models:
///
/// ```ignore
/// db.register_models::<(User, Order, Invoice)>()?;
/// db.register_models::<(User,)>()?;
/// ```
///
/// Registration stops at the first failure; models registered before it
/// stay registered.
pub trait ModelSet {
    /// Register every model of the set
    fn register_all(db: &Database) -> Result<()>;
}

macro_rules! impl_model_set {
    ($($model:ident),+) => {
        impl<$($model: Model),+> ModelSet for ($($model,)+) {
            fn register_all(db: &Database) -> Result<()> {
                $(db.register::<$model>()?;)+
                Ok(())
            }
        }
    };
}

impl_model_set!(A);
impl_model_set!(A, B);
impl_model_set!(A, B, C);
impl_model_set!(A, B, C, D);
impl_model_set!(A, B, C, D, E);
impl_model_set!(A, B, C, D, E, F);
impl_model_set!(A, B, C, D, E, F, G);
impl_model_set!(A, B, C, D, E, F, G, H);
