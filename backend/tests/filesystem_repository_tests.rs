//! Filesystem plan store on a temporary directory.

mod support;

use fram_bridge::api::{FieldId, Period, PlanId, PlanStatus};
use fram_bridge::db::{FileSystemRepository, PlanRepository, RepositoryError};
use support::{field, plan};

fn repo() -> (tempfile::TempDir, FileSystemRepository) {
    let dir = tempfile::tempdir().unwrap();
    let repo = FileSystemRepository::new(dir.path().join("plans"));
    (dir, repo)
}

#[tokio::test]
async fn test_store_writes_document_and_fields_table() {
    let (_dir, repo) = repo();
    let stored = plan(1, 3.0, vec![field(1, 10.0, 20.0, 0.5), field(2, 30.0, -40.0, 0.25)]);

    let summary = repo.store_plan(&stored).await.unwrap();
    assert_eq!(summary.field_count, 2);
    assert!(repo.health_check().await.unwrap());

    let json_path = repo.root().join(format!("{}.json", stored.name));
    let fields_path = repo.root().join(format!("{}.fields", stored.name));
    assert!(json_path.exists());
    let table = std::fs::read_to_string(&fields_path).unwrap();
    assert!(table.starts_with("# id ra dec weight"));
    assert_eq!(table.lines().count(), 3);

    assert!(repo.has_plan(&stored.name).await.unwrap());
    assert!(!repo.has_plan("2024-01-01T00:00:00_other").await.unwrap());

    let loaded = repo.get_plan(PlanId::new(1)).await.unwrap();
    assert_eq!(loaded.fields.len(), 2);
    assert_eq!(loaded.event_name, stored.event_name);
    assert_eq!(loaded.priority, 3.0);
}

#[tokio::test]
async fn test_update_fields_rewrites_table_and_completes_plan() {
    let (_dir, repo) = repo();
    let stored = plan(2, 1.0, vec![field(1, 10.0, 20.0, 0.5), field(2, 30.0, -40.0, 0.25)]);
    repo.store_plan(&stored).await.unwrap();
    let fields_path = repo.root().join(format!("{}.fields", stored.name));

    let status = repo
        .update_fields(PlanId::new(2), &stored.fields[1..])
        .await
        .unwrap();
    assert_eq!(status, PlanStatus::Pending);
    let loaded = repo.get_plan(PlanId::new(2)).await.unwrap();
    assert_eq!(loaded.fields.len(), 1);
    assert_eq!(loaded.fields[0].id, FieldId::new(2));

    let status = repo.update_fields(PlanId::new(2), &[]).await.unwrap();
    assert_eq!(status, PlanStatus::Completed);
    assert!(!fields_path.exists());
    assert!(repo.list_pending_plans().await.unwrap().is_empty());
    // the plan document survives so the listener does not fetch it again
    assert!(repo.has_plan(&stored.name).await.unwrap());
}

#[tokio::test]
async fn test_validity_windows_survive_reload() {
    let (_dir, repo) = repo();
    let window = Period::from_mjd(60389.0, 60389.5);
    let stored = plan(
        3,
        1.0,
        vec![
            field(1, 10.0, 20.0, 0.5).with_validity(window),
            field(2, 30.0, -40.0, 0.25),
        ],
    );
    repo.store_plan(&stored).await.unwrap();

    let loaded = repo.get_plan(PlanId::new(3)).await.unwrap();
    assert_eq!(loaded.fields[0].validity, Some(window));
    assert_eq!(loaded.fields[1].validity, None);
}

#[tokio::test]
async fn test_mark_expired_and_retire_superseded() {
    let (_dir, repo) = repo();
    let mut first = plan(4, 1.0, vec![field(1, 10.0, 20.0, 0.5)]);
    first.name = "2024-03-19T12:00:00_GRANDMA_1".to_string();
    let mut second = plan(5, 1.0, vec![field(1, 10.0, 20.0, 0.5)]);
    second.name = "2024-03-19T12:00:00_GRANDMA_2".to_string();
    let mut other = plan(6, 1.0, vec![field(1, 10.0, 20.0, 0.5)]);
    other.name = "2024-03-18T00:00:00_GRANDMA_1".to_string();
    other.dateobs = "2024-03-18T00:00:00".to_string();
    for p in [&first, &second, &other] {
        repo.store_plan(p).await.unwrap();
    }

    let retired = repo
        .retire_superseded(&second.dateobs, &second.name)
        .await
        .unwrap();
    assert_eq!(retired, 1);
    assert_eq!(
        repo.get_plan(PlanId::new(4)).await.unwrap().status,
        PlanStatus::Expired
    );

    let expired = repo
        .mark_expired(&[PlanId::new(6), PlanId::new(4)])
        .await
        .unwrap();
    // plan 4 was already closed
    assert_eq!(expired, 1);

    let pending: Vec<PlanId> = repo
        .list_pending_plans()
        .await
        .unwrap()
        .iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(pending, vec![PlanId::new(5)]);

    let listed: Vec<PlanId> = repo
        .list_plans()
        .await
        .unwrap()
        .iter()
        .map(|s| s.plan_id)
        .collect();
    assert_eq!(listed, vec![PlanId::new(5), PlanId::new(4), PlanId::new(6)]);
}

#[tokio::test]
async fn test_missing_plan_is_not_found() {
    let (_dir, repo) = repo();
    let err = repo.get_plan(PlanId::new(99)).await.unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound { .. }));
    assert!(repo.list_plans().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_corrupt_document_is_serialization_error() {
    let (_dir, repo) = repo();
    std::fs::create_dir_all(repo.root()).unwrap();
    std::fs::write(repo.root().join("broken.json"), "{not json").unwrap();

    let err = repo.list_pending_plans().await.unwrap_err();
    assert!(matches!(err, RepositoryError::SerializationError { .. }));
    assert_eq!(err.context().operation.as_deref(), Some("list_pending_plans"));
}

#[tokio::test]
async fn test_hand_edited_fields_table_is_honoured() {
    let (_dir, repo) = repo();
    let stored = plan(7, 1.0, vec![field(1, 10.0, 20.0, 0.5), field(2, 30.0, -40.0, 0.25)]);
    repo.store_plan(&stored).await.unwrap();

    // an operator removed field 1 by hand
    let fields_path = repo.root().join(format!("{}.fields", stored.name));
    let table = std::fs::read_to_string(&fields_path).unwrap();
    let edited: Vec<&str> = table.lines().filter(|l| !l.starts_with("1 ")).collect();
    std::fs::write(&fields_path, edited.join("\n")).unwrap();

    let loaded = repo.get_plan(PlanId::new(7)).await.unwrap();
    let ids: Vec<FieldId> = loaded.fields.iter().map(|f| f.id).collect();
    assert_eq!(ids, vec![FieldId::new(2)]);
}
