#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use muleguard_contracts::api_keys::{
    ApiKeyIssueRequest, ApiKeyStatus, Application, DISPLAY_KEY_ELISION,
};
use muleguard_contracts::UnixTimeMs;
use muleguard_storage::api_keys::{ApiKeyStore, KeyLifecycleAction, StorageError};
use muleguard_storage::repo::ApiKeyRepo;

fn req(app: Application, name: &str) -> ApiKeyIssueRequest {
    ApiKeyIssueRequest::v1(app, name).unwrap()
}

#[test]
fn at_keys_db_01_issue_prod_key_for_paysolutions() {
    let mut s = ApiKeyStore::new_in_memory();
    let issued = s
        .issue_api_key_row(req(Application::PaySolutions, "Prod"), UnixTimeMs(1_000))
        .unwrap();

    assert_eq!(issued.record.status, ApiKeyStatus::Active);
    let secret = issued.secret.expose().to_string();
    let body = issued.secret.body();
    let display = issued.record.display_key.as_str();
    assert!(display.contains(&body[..4]));
    assert!(display.contains(&body[body.len() - 4..]));
    assert!(display.contains(DISPLAY_KEY_ELISION));
    assert!(!display.contains(&secret));

    // Every later read only yields the masked form.
    for row in s.api_key_rows_newest_first() {
        assert!(!format!("{row:?}").contains(&secret));
    }
}

#[test]
fn at_keys_db_02_full_lifecycle_issue_revoke_delete() {
    let mut s = ApiKeyStore::with_demo_rows().unwrap();
    let before = s.api_key_row_count();
    let id = s
        .issue_api_key_row(req(Application::GroupFin, "Batch jobs"), UnixTimeMs(10))
        .unwrap()
        .record
        .id;
    assert_eq!(s.api_key_row_count(), before + 1);

    let err = s.delete_api_key_row(&id).unwrap_err();
    assert!(matches!(
        err,
        StorageError::StateConflict {
            action: KeyLifecycleAction::Delete,
            ..
        }
    ));

    s.revoke_api_key_row(&id, UnixTimeMs(20)).unwrap();
    assert!(matches!(
        s.revoke_api_key_row(&id, UnixTimeMs(30)),
        Err(StorageError::StateConflict { .. })
    ));

    s.delete_api_key_row(&id).unwrap();
    assert_eq!(s.api_key_row_count(), before);
    assert!(s.get_api_key_row(&id).is_none());
    assert!(s
        .api_key_rows_newest_first()
        .iter()
        .all(|row| row.id != id));
}

#[test]
fn at_keys_db_03_seeded_revoked_key_can_be_deleted() {
    let mut s = ApiKeyStore::with_demo_rows().unwrap();
    let revoked = s
        .api_key_rows_newest_first()
        .into_iter()
        .find(|row| row.status == ApiKeyStatus::Revoked)
        .map(|row| row.id.clone())
        .unwrap();
    s.delete_api_key_row(&revoked).unwrap();
    assert_eq!(s.api_key_row_count(), 1);
}

#[test]
fn at_keys_db_04_ids_are_pairwise_distinct() {
    let mut s = ApiKeyStore::new_in_memory();
    let mut ids = BTreeSet::new();
    for i in 0..50u64 {
        let app = Application::all()[(i % 4) as usize];
        let issued = s
            .issue_api_key_row(req(app, &format!("key {i}")), UnixTimeMs(i + 1))
            .unwrap();
        if i % 3 == 0 {
            s.revoke_api_key_row(&issued.record.id, UnixTimeMs(i + 2)).unwrap();
            s.delete_api_key_row(&issued.record.id).unwrap();
        }
        assert!(ids.insert(issued.record.id));
    }
    assert_eq!(ids.len(), 50);
}

#[test]
fn at_keys_db_05_unknown_application_never_reaches_the_store() {
    let s = ApiKeyStore::new_in_memory();
    assert!(Application::parse("NotAnApp").is_err());
    assert_eq!(s.api_key_row_count(), 0);
}
