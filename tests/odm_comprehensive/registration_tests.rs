//! Model registration
//!
//! Schema validation, idempotence, collection provisioning and auto-fetch.

use crate::test_utils::*;
use std::sync::Arc;

#[test]
fn test_register_is_idempotent() {
    let test = TestDb::new();
    let first = test.db.register::<User>().unwrap();
    let second = test.db.register::<User>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(test.engine().collection_names(), vec!["users".to_string()]);
}

#[test]
fn test_register_provisions_existing_collection_once() {
    let test = TestDb::new();
    test.db.register::<Product>().unwrap();

    // A second database on the same backend reuses the collection
    let sibling = test.sibling();
    sibling.register::<Product>().unwrap();
    assert_eq!(test.engine().collection_names(), vec!["products".to_string()]);
}

#[test]
fn test_schema_reflects_declaration() {
    let test = TestDb::new();
    let schema = test.db.register::<User>().unwrap();
    assert_eq!(schema.table(), "users");
    assert!(schema.is_cached());
    assert!(!schema.auto_fetch());
    assert_eq!(schema.primary_key().name(), "id");
    assert_eq!(schema.field("age").unwrap().external_name(), "user_age");
    assert_eq!(schema.field("user_age").unwrap().name(), "age");
    assert_eq!(schema.fields().len(), 5);
}

#[test]
fn test_missing_declaration_fails() {
    let test = TestDb::new();
    assert!(matches!(
        test.db.register::<Undeclared>(),
        Err(Error::ModelDeclarationMissing { .. })
    ));
    assert!(test.engine().collection_names().is_empty());
}

#[test]
fn test_zero_primary_keys_fails() {
    let test = TestDb::new();
    assert!(matches!(
        test.db.register::<Keyless>(),
        Err(Error::NoPrimaryKey { .. })
    ));
}

#[test]
fn test_two_primary_keys_fails() {
    let test = TestDb::new();
    assert!(matches!(
        test.db.register::<TwoKeys>(),
        Err(Error::MultiplePrimaryKeys { count: 2, .. })
    ));
    assert!(!test.db.is_registered::<TwoKeys>());
}

#[test]
fn test_unknown_field_type_fails_at_registration() {
    let test = TestDb::new();
    assert!(matches!(
        test.db.register::<Invoice>(),
        Err(Error::NoCodecFound { .. })
    ));

    test.db.register_codec::<Cents, _>(CentsCodec);
    test.db.register::<Invoice>().unwrap();
}

#[test]
fn test_register_models_in_order() {
    let test = TestDb::new();
    test.db
        .register_models::<(User, Product, Ledger)>()
        .unwrap();
    assert!(test.db.is_registered::<User>());
    assert!(test.db.is_registered::<Product>());
    assert!(test.db.is_registered::<Ledger>());
}

#[test]
fn test_register_models_stops_at_first_failure() {
    let test = TestDb::new();
    let result = test.db.register_models::<(User, Keyless, Product)>();
    assert!(matches!(result, Err(Error::NoPrimaryKey { .. })));
    assert!(test.db.is_registered::<User>());
    assert!(!test.db.is_registered::<Product>());
}

#[test]
fn test_auto_fetch_primes_cache() {
    let test = TestDb::new();
    let writer = test.sibling();
    writer.register::<Ledger>().unwrap();
    writer.save(&Record::new(ledger(1))).unwrap();
    writer.save(&Record::new(ledger(2))).unwrap();

    // Fresh database: registration fetches everything into the cache
    let reader = test.sibling();
    reader.register::<Ledger>().unwrap();
    let cached = reader.read_all_from_cache::<Ledger>().unwrap();
    assert_eq!(cached.len(), 2);
}

#[test]
fn test_auto_fetch_failure_does_not_fail_registration() {
    let test = TestDb::new();
    let key = Document::new().with("id", 5i64);
    test.insert_raw(
        "ledgers",
        key.clone(),
        key.with("balance", "not a number"),
    );

    let reader = test.sibling();
    reader.register::<Ledger>().unwrap();
    assert!(reader.read_all_from_cache::<Ledger>().unwrap().is_empty());
}

#[test]
fn test_operations_on_unregistered_model_fail() {
    let test = TestDb::new();
    assert!(matches!(
        test.db.schema::<Product>(),
        Err(Error::ModelNotRegistered { .. })
    ));
    assert!(matches!(
        test.db.save(&product("p", 1)),
        Err(Error::ModelNotRegistered { .. })
    ));
}
