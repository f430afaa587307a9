use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use adminboard::config::Config;
use adminboard::paths::persist_file;
use adminboard::store::persist::PERSIST_KEY;
use adminboard::store::{AppStore, FileStorage, StateStorage};

fn file_store(dir: &std::path::Path) -> AppStore {
    AppStore::mock(Duration::ZERO, Arc::new(FileStorage::new(dir)))
}

fn read_record(dir: &std::path::Path) -> Value {
    let text = std::fs::read_to_string(persist_file(dir, PERSIST_KEY)).expect("record written");
    serde_json::from_str(&text).expect("record is json")
}

#[tokio::test]
async fn signed_in_session_survives_restart() {
    let tmp = tempfile::tempdir().unwrap();
    let first = file_store(tmp.path());
    let me = first.session().login("admin", "admin").await.unwrap();
    first.directory().list().await.unwrap();

    let record = read_record(tmp.path());
    assert_eq!(record["version"], 1);
    assert_eq!(record["auth"]["isAuthenticated"], true);
    assert_eq!(record["auth"]["user"]["username"], "admin");
    assert!(record["auth"]["token"].as_str().is_some_and(|t| !t.is_empty()));
    // only the auth slice is written
    assert!(record.get("users").is_none());
    assert!(record["auth"].get("last_error").is_none());

    let second = file_store(tmp.path());
    assert!(second.session().restore().unwrap());
    let s = second.session().snapshot();
    assert!(s.authenticated);
    assert_eq!(s.identity.as_ref().map(|i| i.id.as_str()), Some(me.id.as_str()));
    assert_eq!(s.credential, first.session().snapshot().credential);
    assert!(!s.pending && s.last_error.is_none());
    // the roster starts empty until the next list
    assert!(second.directory().roster().is_empty());
}

#[tokio::test]
async fn logout_is_persisted_immediately() {
    let tmp = tempfile::tempdir().unwrap();
    let app = file_store(tmp.path());
    app.session().login("admin", "admin").await.unwrap();
    app.session().logout();

    let record = read_record(tmp.path());
    assert_eq!(record["auth"]["isAuthenticated"], false);
    assert!(record["auth"]["user"].is_null());
    assert!(record["auth"]["token"].is_null());

    let next = file_store(tmp.path());
    assert!(!next.session().restore().unwrap());
    assert!(!next.session().is_authenticated());
}

#[tokio::test]
async fn failed_login_is_not_remembered_as_signed_in() {
    let tmp = tempfile::tempdir().unwrap();
    let app = file_store(tmp.path());
    app.session().login("admin", "admin").await.unwrap();
    assert!(app.session().login("admin", "wrong").await.is_err());

    let next = file_store(tmp.path());
    assert!(!next.session().restore().unwrap());
}

#[test]
fn tampered_record_is_ignored() {
    let tmp = tempfile::tempdir().unwrap();
    let storage = FileStorage::new(tmp.path());
    // flag says signed in but no credential
    storage
        .save(PERSIST_KEY, r#"{"version":1,"auth":{"user":{"id":"1","username":"admin","email":"a@b.c","roles":["admin"]},"token":null,"isAuthenticated":true}}"#)
        .unwrap();
    let app = file_store(tmp.path());
    assert!(!app.session().restore().unwrap());
    assert!(!app.session().is_authenticated());

    storage.save(PERSIST_KEY, "not json at all").unwrap();
    assert!(!app.session().restore().unwrap());
}

#[tokio::test]
async fn from_config_uses_state_dir() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = Config { state_dir: tmp.path().join("state"), latency: Duration::ZERO, ..Config::default() };
    let app = AppStore::from_config(&cfg).unwrap();
    assert_eq!(app.backend_desc(), "mock");
    app.session().login("admin", "admin").await.unwrap();
    assert!(persist_file(&cfg.state_dir, PERSIST_KEY).exists());
}
