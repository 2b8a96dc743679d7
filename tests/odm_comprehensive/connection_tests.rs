//! Connection lifecycle and sessions

use crate::test_utils::*;
use std::collections::HashMap;
use std::sync::Arc;
use strata_odm::{ConnectionTarget, Credentials, Session, SESSION_OPTION};

#[test]
fn test_new_database_is_disconnected() {
    let db = Database::new(OdmConfig::memory(&unique_name("conn")));
    assert!(!db.is_connection_valid());
    assert!(matches!(db.terminate_connection(), Err(Error::NotConnected)));
    assert!(matches!(db.start_session(), Err(Error::NotConnected)));
}

#[test]
fn test_connect_twice_fails() {
    let test = TestDb::new();
    assert!(matches!(
        test.db.connect_uri(&format!("memory://localhost/{}", test.name)),
        Err(Error::AlreadyConnected)
    ));
}

#[test]
fn test_terminate_then_operations_fail() {
    let test = TestDb::new();
    test.db.register::<Product>().unwrap();
    let p = product("p", 1);
    test.db.terminate_connection().unwrap();

    assert!(!test.db.is_connection_valid());
    assert!(matches!(test.db.save(&p), Err(Error::NotConnected)));
    assert!(matches!(
        test.db.fetch_all::<Product>(),
        Err(Error::NotConnected)
    ));
    assert!(matches!(test.db.delete(&p), Err(Error::NotConnected)));
    assert!(matches!(
        test.db.terminate_connection(),
        Err(Error::NotConnected)
    ));
}

#[test]
fn test_disconnected_checked_before_registration() {
    let test = TestDb::new();
    test.db.terminate_connection().unwrap();
    let p = product("p", 1);

    assert!(matches!(test.db.fetch_all::<Product>(), Err(Error::NotConnected)));
    assert!(matches!(
        test.db.fetch_matching::<Product, i64>("price", &1),
        Err(Error::NotConnected)
    ));
    assert!(matches!(test.db.save(&p), Err(Error::NotConnected)));
    assert!(matches!(
        test.db.save_many(&[Arc::clone(&p)]),
        Err(Error::NotConnected)
    ));
    assert!(matches!(test.db.delete(&p), Err(Error::NotConnected)));
    assert!(matches!(
        test.db.delete_many(&[p]),
        Err(Error::NotConnected)
    ));
}

#[test]
fn test_reconnect_after_terminate() {
    let test = TestDb::new();
    test.db.register::<Product>().unwrap();
    test.db.save(&product("kept", 1)).unwrap();
    // Hold the engine so its data outlives the first connection
    let engine = test.engine();

    test.db.terminate_connection().unwrap();
    test.db
        .connect_uri(&format!("memory://localhost/{}", test.name))
        .unwrap();
    assert!(test.db.is_connection_valid());
    assert_eq!(test.db.fetch_all::<Product>().unwrap().len(), 1);
    drop(engine);
}

#[test]
fn test_connect_with_credentials() {
    let name = unique_name("creds");
    let db = Database::new(OdmConfig::memory(&name));
    let credentials = HashMap::from([
        ("host".to_string(), "localhost".to_string()),
        ("name".to_string(), name.clone()),
        ("username".to_string(), "app".to_string()),
        ("password".to_string(), "pw".to_string()),
    ]);
    db.connect_credentials(&credentials).unwrap();
    assert!(db.is_connection_valid());

    // Same backend, wrong password
    let intruder = Database::new(OdmConfig::memory(&name));
    let target = ConnectionTarget::Credentials(Credentials {
        username: Some("app".to_string()),
        password: Some("guess".to_string()),
        ..Credentials::database(name.clone())
    });
    assert!(matches!(
        intruder.connect(&target),
        Err(Error::InvalidConnection(_))
    ));
}

#[test]
fn test_malformed_targets() {
    let db = Database::new(OdmConfig::default());
    for uri in ["", "memory://", "memory://host", "ftp://host/db"] {
        assert!(
            matches!(db.connect_uri(uri), Err(Error::InvalidConnection(_))),
            "accepted {:?}",
            uri
        );
    }
    assert!(!db.is_connection_valid());
}

#[test]
fn test_open_with_credentials_config() {
    let name = unique_name("cfg");
    let config = OdmConfig::from_toml_str(&format!(
        "repair_on_read = false\n\n[credentials]\nname = \"{}\"\n",
        name
    ))
    .unwrap();
    let db = Database::open(config).unwrap();
    assert!(db.is_connection_valid());
    assert!(!db.config().repair_on_read);
}

#[test]
fn test_open_from_config_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("odm.toml");
    OdmConfig::memory(&unique_name("file"))
        .write_to_file(&path)
        .unwrap();

    let config = OdmConfig::from_file(&path).unwrap();
    let db = Database::open(config).unwrap();
    assert!(db.is_connection_valid());
    assert!(db.config().repair_on_read);
}

#[test]
fn test_open_without_target_fails() {
    let config = OdmConfig {
        uri: None,
        ..OdmConfig::default()
    };
    assert!(matches!(Database::open(config), Err(Error::Config(_))));
}

#[test]
fn test_writes_in_session() {
    let test = TestDb::new();
    test.db.register::<Product>().unwrap();
    let session = test.db.start_session().unwrap();
    let options = session.options();

    test.db.save_with(&product("a", 1), &options).unwrap();
    test.db
        .save_many_with(&[product("b", 2), product("c", 3)], &options)
        .unwrap();
    test.db.end_session(&session).unwrap();

    assert_eq!(test.db.fetch_all::<Product>().unwrap().len(), 3);
    assert!(matches!(
        test.db.save_with(&product("d", 4), &options),
        Err(Error::InvalidSession(_))
    ));
    assert!(matches!(
        test.db.end_session(&session),
        Err(Error::InvalidSession(_))
    ));
}

#[test]
fn test_unknown_session_rejected() {
    let test = TestDb::new();
    test.db.register::<Product>().unwrap();
    let stranger = Session::new();
    let p = product("p", 1);
    assert!(matches!(
        test.db.save_with(&p, &stranger.options()),
        Err(Error::InvalidSession(_))
    ));

    let mut options = Options::new();
    options.insert(SESSION_OPTION.to_string(), Value::Int(1));
    assert!(matches!(
        test.db.delete_with(&p, &options),
        Err(Error::InvalidSession(_))
    ));
}
