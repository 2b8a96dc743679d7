//! Filter engine through the facade

use crate::test_utils::*;

fn ages(test: &TestDb) -> Vec<Shared<User>> {
    test.db.register::<User>().unwrap();
    let users = vec![user("ten", 10), user("twenty", 20), user("thirty", 30)];
    test.db.save_many(&users).unwrap();
    users
}

#[test]
fn test_gt_keeps_input_order() {
    let test = TestDb::new();
    let users = ages(&test);
    let older = test.db.filter(&users, "age", FilterOp::Gt, &15).unwrap();
    assert_eq!(names(&older), vec!["twenty", "thirty"]);
}

#[test]
fn test_each_operator() {
    let test = TestDb::new();
    let users = ages(&test);
    let run = |op, value: i32| names(&test.db.filter(&users, "age", op, &value).unwrap());

    assert_eq!(run(FilterOp::Eq, 20), vec!["twenty"]);
    assert_eq!(run(FilterOp::Ne, 20), vec!["ten", "thirty"]);
    assert_eq!(run(FilterOp::Gte, 20), vec!["twenty", "thirty"]);
    assert_eq!(run(FilterOp::Lt, 20), vec!["ten"]);
    assert_eq!(run(FilterOp::Lte, 20), vec!["ten", "twenty"]);
}

#[test]
fn test_filter_over_cache() {
    let test = TestDb::new();
    ages(&test);
    let cached = test.db.read_all_from_cache::<User>().unwrap();
    let young = test.db.filter(&cached, "age", FilterOp::Lt, &25).unwrap();
    assert_eq!(names(&young), vec!["ten", "twenty"]);
}

#[test]
fn test_string_equality() {
    let test = TestDb::new();
    let users = ages(&test);
    let found = test
        .db
        .filter(&users, "name", FilterOp::Eq, &"thirty".to_string())
        .unwrap();
    assert_eq!(names(&found), vec!["thirty"]);

    // A char is not the field's type, so nothing is equal
    assert!(test
        .db
        .filter(&users, "name", FilterOp::Eq, &'t')
        .unwrap()
        .is_empty());
}

#[test]
fn test_ordered_on_non_numeric_field_matches_nothing() {
    let test = TestDb::new();
    let users = ages(&test);
    assert!(test
        .db
        .filter(&users, "name", FilterOp::Gt, &0)
        .unwrap()
        .is_empty());
}

#[test]
fn test_unknown_field_matches_nothing() {
    let test = TestDb::new();
    let users = ages(&test);
    assert!(test
        .db
        .filter(&users, "height", FilterOp::Eq, &10)
        .unwrap()
        .is_empty());
}

#[test]
fn test_filter_requires_registration() {
    let test = TestDb::new();
    let products = vec![product("p", 1)];
    assert!(matches!(
        test.db.filter(&products, "price", FilterOp::Eq, &1i64),
        Err(Error::ModelNotRegistered { .. })
    ));
}

#[test]
fn test_equality_on_enum_and_collection_fields() {
    let test = TestDb::new();
    let users = ages(&test);
    users[1].update(|u| {
        u.role = Role::Admin;
        u.tags = vec!["ops".to_string()];
    });

    let admins = test.db.filter(&users, "role", FilterOp::Eq, &Role::Admin).unwrap();
    assert_eq!(names(&admins), vec!["twenty"]);
    let tagged = test
        .db
        .filter(&users, "tags", FilterOp::Ne, &Vec::<String>::new())
        .unwrap();
    assert_eq!(names(&tagged), vec!["twenty"]);

    // Ordered operators need an integral textual form
    assert!(test
        .db
        .filter(&users, "role", FilterOp::Gt, &Role::Member)
        .unwrap()
        .is_empty());
}
