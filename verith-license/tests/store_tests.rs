mod common;

use chrono::Duration;
use common::t0;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::PathBuf;
use verith_license::{FileStore, LicenseError, LicenseRecord, LicenseStatus, LicenseStore};

fn state_file(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("Verith").join("license.json")
}

fn store_in(dir: &tempfile::TempDir) -> FileStore {
    FileStore::new(state_file(dir))
}

#[test]
fn load_creates_trial_file_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    assert!(!state_file(&dir).exists());

    let record = store.load(t0()).unwrap();

    assert_eq!(record, LicenseRecord::new_trial(t0()));
    assert!(state_file(&dir).exists());
}

#[test]
fn load_after_create_returns_same_record() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    let first = store.load(t0()).unwrap();
    let second = store.load(t0() + Duration::days(9)).unwrap();

    assert_eq!(first, second);
}

#[test]
fn file_format_uses_uppercase_status_and_iso_dates() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    store.load(t0()).unwrap();

    let json: serde_json::Value =
        serde_json::from_slice(&fs::read(state_file(&dir)).unwrap()).unwrap();

    assert_eq!(json["status"], "TRIAL");
    assert_eq!(json["install_date"], "2026-03-01T09:30:00Z");
    assert_eq!(json["last_check"], "2026-03-01T09:30:00Z");
    assert_eq!(json["license_key"], "");
    assert!(json.get("instance_id").is_none());
}

#[test]
fn reads_record_without_optional_fields() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    fs::create_dir_all(state_file(&dir).parent().unwrap()).unwrap();
    fs::write(
        state_file(&dir),
        r#"{"install_date":"2026-01-02T03:04:05Z","status":"EXPIRED","last_check":"2026-01-02T03:04:05Z"}"#,
    )
    .unwrap();

    let record = store.load(t0()).unwrap();

    assert_eq!(record.status, LicenseStatus::Expired);
    assert_eq!(record.license_key, "");
    assert_eq!(record.instance_id, None);
}

#[test]
fn save_then_load_is_byte_stable() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    let record = LicenseRecord {
        install_date: t0() - Duration::days(3),
        license_key: "AAAA-BBBB".into(),
        instance_id: Some("inst-1".into()),
        status: LicenseStatus::Active,
        last_check: t0(),
    };
    store.save(&record).unwrap();
    let before = fs::read(state_file(&dir)).unwrap();

    let loaded = store.load(t0()).unwrap();
    store.save(&loaded).unwrap();

    assert_eq!(loaded, record);
    assert_eq!(fs::read(state_file(&dir)).unwrap(), before);
}

#[test]
fn corrupt_file_is_reported_and_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    fs::create_dir_all(state_file(&dir).parent().unwrap()).unwrap();
    fs::write(state_file(&dir), b"{not json").unwrap();

    let err = store.load(t0()).unwrap_err();

    assert!(matches!(err, LicenseError::CorruptState(_)));
    assert_eq!(fs::read(state_file(&dir)).unwrap(), b"{not json");
}

#[test]
fn unknown_status_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    fs::create_dir_all(state_file(&dir).parent().unwrap()).unwrap();
    fs::write(
        state_file(&dir),
        r#"{"install_date":"2026-01-02T03:04:05Z","status":"LIFETIME","last_check":"2026-01-02T03:04:05Z"}"#,
    )
    .unwrap();

    assert!(matches!(
        store.load(t0()),
        Err(LicenseError::CorruptState(_))
    ));
}

#[test]
fn empty_file_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    fs::create_dir_all(state_file(&dir).parent().unwrap()).unwrap();
    fs::write(state_file(&dir), b"").unwrap();

    assert!(matches!(
        store.load(t0()),
        Err(LicenseError::CorruptState(_))
    ));
}

#[test]
fn save_creates_nested_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a").join("b").join("license.json");
    let store = FileStore::new(path.clone());

    store.save(&LicenseRecord::new_trial(t0())).unwrap();

    assert!(path.exists());
}

#[test]
fn save_leaves_no_temporary_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    let mut record = store.load(t0()).unwrap();
    record.status = LicenseStatus::Expired;
    store.save(&record).unwrap();

    let entries: Vec<_> = fs::read_dir(state_file(&dir).parent().unwrap())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("license.json")]);
}

#[test]
fn save_replaces_previous_record() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    let mut record = store.load(t0()).unwrap();

    record.status = LicenseStatus::Expired;
    store.save(&record).unwrap();

    assert_eq!(store.load(t0()).unwrap().status, LicenseStatus::Expired);
}

#[cfg(unix)]
#[test]
fn state_file_and_directory_are_private() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    store.load(t0()).unwrap();

    let file_mode = fs::metadata(state_file(&dir)).unwrap().permissions().mode() & 0o777;
    let dir_mode = fs::metadata(state_file(&dir).parent().unwrap())
        .unwrap()
        .permissions()
        .mode()
        & 0o777;
    assert_eq!(file_mode, 0o600);
    assert_eq!(dir_mode, 0o700);
}
