use kubify_core::secrets::generate_value;
use kubify_core::{Error, SecretOrigin, SecretStore};
use tempfile::TempDir;

#[test]
fn generated_values_are_alphanumeric_with_requested_length() {
    let value = generate_value(40);
    assert_eq!(value.len(), 40);
    assert!(value.chars().all(|c| c.is_ascii_alphanumeric()));
    assert_ne!(generate_value(40), value);
}

#[test]
fn get_or_generate_returns_the_first_value() {
    let store = SecretStore::new();
    let first = store.get_or_generate("pw", 22);
    let second = store.get_or_generate("pw", 64);

    assert_eq!(first, second);
    assert_eq!(first.len(), 22);
    assert_eq!(store.len(), 1);
    assert_eq!(store.generated_count(), 1);
}

#[test]
fn load_missing_file_starts_empty() {
    let tmp = TempDir::new().unwrap();
    let store = SecretStore::load(&tmp.path().join("absent.json")).unwrap();
    assert!(store.is_empty());
}

#[test]
fn save_and_load_round_trip() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("nested/dir/secrets.json");

    let store = SecretStore::new();
    let value = store.get_or_generate("db-password", 30);
    store.save(&path).unwrap();

    let loaded = SecretStore::load(&path).unwrap();
    assert_eq!(loaded.get("db-password").as_deref(), Some(value.as_str()));
    assert_eq!(loaded.origin("db-password"), Some(SecretOrigin::Persisted));
    assert_eq!(loaded.generated_count(), 0);
}

#[cfg(unix)]
#[test]
fn saved_state_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("secrets.json");
    let store = SecretStore::new();
    store.get_or_generate("pw", 8);
    store.save(&path).unwrap();

    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn corrupt_state_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("secrets.json");
    std::fs::write(&path, "not json").unwrap();

    assert!(matches!(
        SecretStore::load(&path).unwrap_err(),
        Error::SecretStateParse { .. }
    ));
}
