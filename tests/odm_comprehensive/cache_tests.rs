//! Cache coherence and cache policy

use crate::test_utils::*;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_save_adds_to_cache() {
    let test = TestDb::new();
    test.db.register::<User>().unwrap();
    let ada = user("ada", 36);
    test.db.save(&ada).unwrap();

    let cached = test.db.read_all_from_cache::<User>().unwrap();
    assert_eq!(cached.len(), 1);
    assert!(Arc::ptr_eq(&cached[0], &ada));
}

#[test]
fn test_delete_removes_from_cache() {
    let test = TestDb::new();
    test.db.register::<User>().unwrap();
    let ada = user("ada", 36);
    test.db.save(&ada).unwrap();
    test.db.delete(&ada).unwrap();

    assert!(test.db.read_all_from_cache::<User>().unwrap().is_empty());
    assert!(!test.db.cache().contains(ada.id()));
}

#[test]
fn test_cache_reflects_live_mutation() {
    let test = TestDb::new();
    test.db.register::<User>().unwrap();
    let ada = user("ada", 36);
    test.db.save(&ada).unwrap();
    ada.update(|u| u.name = "ada lovelace".to_string());

    let cached = test.db.read_all_from_cache::<User>().unwrap();
    assert_eq!(cached[0].read().name, "ada lovelace");
}

#[test]
fn test_cache_preserves_insertion_order() {
    let test = TestDb::new();
    test.db.register::<User>().unwrap();
    let users = vec![user("c", 1), user("a", 2), user("b", 3)];
    for u in &users {
        test.db.save(u).unwrap();
    }
    assert_eq!(
        names(&test.db.read_all_from_cache::<User>().unwrap()),
        vec!["c", "a", "b"]
    );
}

#[test]
fn test_cache_order_follows_saves_not_creation() {
    let test = TestDb::new();
    test.db.register::<User>().unwrap();
    let a = user("a", 1);
    let b = user("b", 2);
    test.db.save(&b).unwrap();
    test.db.save(&a).unwrap();
    // Saving again keeps the original position
    test.db.save(&b).unwrap();

    assert_eq!(
        names(&test.db.read_all_from_cache::<User>().unwrap()),
        vec!["b", "a"]
    );
}

#[test]
fn test_read_matching_from_cache() {
    let test = TestDb::new();
    test.db.register::<User>().unwrap();
    test.db
        .save_many(&[user("a", 30), user("b", 40), user("c", 30)])
        .unwrap();

    let thirty = test.db.read_matching_from_cache::<User, i32>("age", &30).unwrap();
    assert_eq!(names(&thirty), vec!["a", "c"]);

    // Same lookup through the stored name
    let thirty = test
        .db
        .read_matching_from_cache::<User, i32>("user_age", &30)
        .unwrap();
    assert_eq!(thirty.len(), 2);
}

#[test]
fn test_read_matching_on_enum_field() {
    let test = TestDb::new();
    test.db.register::<User>().unwrap();
    let admin = user("root", 50);
    admin.update(|u| u.role = Role::Admin);
    test.db.save_many(&[user("guest", 20), Arc::clone(&admin)]).unwrap();

    let admins = test
        .db
        .read_matching_from_cache::<User, Role>("role", &Role::Admin)
        .unwrap();
    assert_eq!(admins.len(), 1);
    assert!(Arc::ptr_eq(&admins[0], &admin));
}

#[test]
fn test_equality_on_duration_field() {
    let test = TestDb::new();
    test.db.register::<Ledger>().unwrap();
    let short = Record::new(Ledger {
        window: Duration::from_secs(5),
        ..ledger(1)
    });
    let long = Record::new(ledger(2));
    test.db.save_many(&[Arc::clone(&short), Arc::clone(&long)]).unwrap();

    let found = test
        .db
        .read_matching_from_cache::<Ledger, Duration>("window", &Duration::from_secs(5))
        .unwrap();
    assert_eq!(found.len(), 1);
    assert!(Arc::ptr_eq(&found[0], &short));

    let refreshed = test
        .db
        .update_matching_cache::<Ledger, Duration>("window", &Duration::from_secs(5))
        .unwrap();
    assert_eq!(refreshed.len(), 1);
    assert_eq!(refreshed[0].read().id, 1);

    let cached = test.db.read_all_from_cache::<Ledger>().unwrap();
    assert_eq!(cached.len(), 2);
    assert!(!cached.iter().any(|c| Arc::ptr_eq(c, &short)));
    assert!(cached.iter().any(|c| Arc::ptr_eq(c, &long)));
}

#[test]
fn test_update_whole_cache_reloads_from_store() {
    let test = TestDb::new();
    test.db.register::<User>().unwrap();
    let ada = user("ada", 36);
    test.db.save(&ada).unwrap();

    // Written by someone else
    let other = test.sibling();
    other.register::<User>().unwrap();
    other.save(&user("bob", 20)).unwrap();

    let reloaded = test.db.update_whole_cache::<User>().unwrap();
    assert_eq!(reloaded.len(), 2);

    let cached = test.db.read_all_from_cache::<User>().unwrap();
    assert_eq!(cached.len(), 2);
    // The old handle was replaced by a fresh record
    assert!(!cached.iter().any(|c| Arc::ptr_eq(c, &ada)));
}

#[test]
fn test_update_matching_cache_only_touches_matches() {
    let test = TestDb::new();
    test.db.register::<User>().unwrap();
    let young = user("young", 20);
    let old = user("old", 80);
    test.db.save_many(&[Arc::clone(&young), Arc::clone(&old)]).unwrap();

    let refreshed = test
        .db
        .update_matching_cache::<User, i32>("age", &80)
        .unwrap();
    assert_eq!(names(&refreshed), vec!["old"]);

    let cached = test.db.read_all_from_cache::<User>().unwrap();
    assert_eq!(cached.len(), 2);
    assert!(cached.iter().any(|c| Arc::ptr_eq(c, &young)));
    assert!(!cached.iter().any(|c| Arc::ptr_eq(c, &old)));
}

#[test]
fn test_fetch_adds_to_cache_by_identity() {
    let test = TestDb::new();
    test.db.register::<User>().unwrap();
    test.db.save(&user("ada", 36)).unwrap();

    // Each fetch yields new records; the cache tracks every live one
    test.db.fetch_all::<User>().unwrap();
    assert_eq!(test.db.read_all_from_cache::<User>().unwrap().len(), 2);
}

#[test]
fn test_uncached_model_rejects_cache_operations() {
    let test = TestDb::new();
    test.db.register::<Product>().unwrap();
    test.db.save(&product("p", 1)).unwrap();

    assert!(matches!(
        test.db.read_all_from_cache::<Product>(),
        Err(Error::NotCached { .. })
    ));
    assert!(matches!(
        test.db.read_matching_from_cache::<Product, i64>("price", &1),
        Err(Error::NotCached { .. })
    ));
    assert!(matches!(
        test.db.update_whole_cache::<Product>(),
        Err(Error::NotCached { .. })
    ));
    assert!(matches!(
        test.db.update_matching_cache::<Product, i64>("price", &1),
        Err(Error::NotCached { .. })
    ));
    assert!(test.db.cache().is_empty());
}

#[test]
fn test_unregistered_uncached_model_reports_cache_policy() {
    let test = TestDb::new();
    assert!(matches!(
        test.db.read_all_from_cache::<Product>(),
        Err(Error::NotCached { .. })
    ));
    assert!(matches!(
        test.db.read_matching_from_cache::<Product, i64>("price", &1),
        Err(Error::NotCached { .. })
    ));
    assert!(matches!(
        test.db.update_whole_cache::<Product>(),
        Err(Error::NotCached { .. })
    ));
    // A cached model still has to be registered first
    assert!(matches!(
        test.db.read_all_from_cache::<User>(),
        Err(Error::ModelNotRegistered { .. })
    ));
}
