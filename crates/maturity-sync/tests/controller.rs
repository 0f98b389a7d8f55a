use std::sync::Arc;
use std::time::Duration;

use maturity_core::{Answer, Assessment, CoreError, QuestionCatalog, keys};
use maturity_storage::{MemoryFolder, MemoryStore, SyncFolderHandle};
use maturity_sync::{AppEvent, AssessmentController, SaveStatus, SyncError, SyncSettings};
use serde_json::json;
use tokio::sync::broadcast;

fn catalog() -> QuestionCatalog {
    let text = json!([
        {"id": "q1", "theme": "Delivery", "profiles": ["all"], "question": "Automated builds?", "weight": 2},
        {"id": "q2", "theme": "Delivery", "profiles": ["devops"], "question": "Automated deploys?", "weight": 3},
        {"id": "q3", "theme": "Quality", "profiles": ["qa"], "question": "Test plans?", "weight": 1}
    ])
    .to_string();
    QuestionCatalog::from_questions_json(&text).unwrap()
}

async fn open(store: &Arc<MemoryStore>) -> AssessmentController {
    AssessmentController::open(store.clone(), catalog(), SyncSettings::default()).await
}

fn drain(rx: &mut broadcast::Receiver<AppEvent>) -> Vec<AppEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test(start_paused = true)]
async fn answers_are_saved_and_survive_a_restart() {
    let store = Arc::new(MemoryStore::new());
    let controller = open(&store).await;

    let started = controller
        .start_assessment("Billing", Some("Team A"), Some("devops"))
        .await
        .unwrap();
    assert!(started.answers.is_empty());
    controller.record_answer("q1", Answer::Yes, Some("devops")).await.unwrap();
    controller.record_answer("q2", Answer::No, Some("devops")).await.unwrap();
    controller.record_comment("q2", "manual release").await.unwrap();
    controller.save_now().await.unwrap();
    assert_eq!(controller.save_status(), SaveStatus::Saved);

    let scores = controller.compute_scores().await.unwrap();
    assert_eq!(scores.get("Delivery"), Some(3));
    assert_eq!(scores.get("Quality"), Some(1));
    controller.shutdown().await;

    let reopened = open(&store).await;
    let all = reopened.assessments().await;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].interview_name.as_deref(), Some("Team A"));
    assert_eq!(all[0].answer("q2"), Some(Answer::No));
    assert_eq!(all[0].comment("q2"), Some("manual release"));
    assert_eq!(all[0].app_version.as_deref(), Some(env!("CARGO_PKG_VERSION")));
}

#[tokio::test(start_paused = true)]
async fn edits_are_debounced_into_one_local_write() {
    let store = Arc::new(MemoryStore::new());
    let controller = open(&store).await;

    controller.start_assessment("App", None, Some("qa")).await.unwrap();
    for q in ["q1", "q2", "q3"] {
        controller.record_answer(q, Answer::Yes, None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
    }
    assert!(controller.tracker().is_editing("App", None));
    assert_eq!(store.write_count(), 0);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(store.write_count(), 1);
    assert!(store.raw(keys::STORE_ASSESSMENTS).unwrap().contains("\"q3\":\"yes\""));
}

#[tokio::test(start_paused = true)]
async fn invalid_operations_are_rejected() {
    let store = Arc::new(MemoryStore::new());
    let controller = open(&store).await;

    let err = controller.record_answer("q1", Answer::Yes, None).await.unwrap_err();
    assert!(matches!(err, SyncError::NoCurrentAssessment));

    let err = controller.start_assessment("  ", None, None).await.unwrap_err();
    assert!(matches!(err, SyncError::UnnamedAssessment));

    controller.start_assessment("App", None, None).await.unwrap();
    let err = controller.record_answer("nope", Answer::Yes, None).await.unwrap_err();
    assert!(matches!(err, SyncError::Core(CoreError::UnknownQuestion(_))));

    let err = controller.open_assessment("Missing", None).await.unwrap_err();
    assert!(matches!(err, SyncError::NotFound { .. }));
}

#[tokio::test(start_paused = true)]
async fn starting_an_existing_key_resumes_it() {
    let store = Arc::new(MemoryStore::new());
    let controller = open(&store).await;

    controller.start_assessment("App", None, Some("qa")).await.unwrap();
    controller.record_answer("q3", Answer::Yes, None).await.unwrap();
    controller.save_now().await.unwrap();

    let resumed = controller.start_assessment("App", Some("App"), None).await.unwrap();
    assert_eq!(resumed.answer("q3"), Some(Answer::Yes));
    assert_eq!(controller.assessments().await.len(), 1);

    assert_eq!(controller.clear_answer("q3").await.unwrap(), Some(Answer::Yes));
    assert!(controller.current().await.unwrap().answers.is_empty());
}

#[tokio::test(start_paused = true)]
async fn saves_are_exported_and_deletes_remove_the_file() {
    let store = Arc::new(MemoryStore::new());
    let folder = Arc::new(MemoryFolder::new());
    let controller = open(&store).await;
    controller.attach_folder(folder.clone());

    controller.start_assessment("App", None, Some("qa")).await.unwrap();
    controller.record_answer("q1", Answer::Yes, None).await.unwrap();
    controller.save_now().await.unwrap();

    let current = controller.current().await.unwrap();
    let file = keys::assessment_file(&current);
    assert_eq!(folder.names(), [file.clone()]);
    assert_eq!(current.file_last_modified, folder.modified(&file));

    controller.delete_assessment("App", None).await.unwrap();
    assert!(folder.names().is_empty());
    assert!(controller.current().await.is_none());
    assert!(controller.assessments().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn remote_changes_refresh_the_open_assessment_once_idle() {
    let store = Arc::new(MemoryStore::new());
    let folder = Arc::new(MemoryFolder::new());
    let controller = open(&store).await;
    controller.attach_folder(folder.clone());
    let mut events = controller.subscribe();

    controller.start_assessment("App", None, Some("qa")).await.unwrap();
    controller.record_answer("q1", Answer::Yes, None).await.unwrap();
    controller.save_now().await.unwrap();

    let mut remote: Assessment = controller.current().await.unwrap().without_file_metadata();
    remote.record_answer("q1", Answer::No, Some("manager"));
    folder.put_external(&keys::assessment_file(&remote), serde_json::to_vec_pretty(&remote).unwrap());

    // Still inside the edit window.
    let report = controller.sync_now().await.unwrap();
    assert_eq!(report.import.skipped_editing.len(), 1);
    assert_eq!(controller.current().await.unwrap().answer("q1"), Some(Answer::Yes));

    // The export above rewrote the file with local data; the other device
    // writes again once the user has stopped typing.
    tokio::time::sleep(Duration::from_secs(6)).await;
    drain(&mut events);
    folder.put_external(&keys::assessment_file(&remote), serde_json::to_vec_pretty(&remote).unwrap());

    let report = controller.sync_now().await.unwrap();
    assert_eq!(report.import.adopted.len(), 1);
    assert_eq!(controller.current().await.unwrap().answer("q1"), Some(Answer::No));

    let events = drain(&mut events);
    assert!(events.contains(&AppEvent::Imported { added: 0, adopted: 1 }));
    assert!(events.iter().any(|e| matches!(e, AppEvent::CurrentRefreshed(_))));
}

#[tokio::test(start_paused = true)]
async fn scheduled_import_picks_up_new_assessments() {
    let store = Arc::new(MemoryStore::new());
    let folder = Arc::new(MemoryFolder::new());
    let controller = open(&store).await;
    controller.attach_folder(folder.clone());

    let mut remote = Assessment::new("Remote", None, Some("qa".to_string()), "2024-03-01T10:00:00Z".parse().unwrap());
    remote.record_answer("q3", Answer::Yes, None);
    folder.put_external(&keys::assessment_file(&remote), serde_json::to_vec_pretty(&remote).unwrap());

    tokio::time::sleep(Duration::from_secs(11)).await;
    let all = controller.assessments().await;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].name, "Remote");
    assert_eq!(folder.write_count(), 0, "imports are not echoed back");
    assert!(store.raw(keys::STORE_ASSESSMENTS).unwrap().contains("Remote"));
}

#[tokio::test(start_paused = true)]
async fn lost_folder_access_disables_sync_but_keeps_local_save() {
    let store = Arc::new(MemoryStore::new());
    let folder = Arc::new(MemoryFolder::new());
    let controller = open(&store).await;
    controller.attach_folder(folder.clone());
    let mut events = controller.subscribe();

    controller.start_assessment("App", None, Some("qa")).await.unwrap();
    controller.record_answer("q1", Answer::Yes, None).await.unwrap();
    folder.revoke();
    controller.save_now().await.unwrap();

    assert!(!controller.is_sync_enabled());
    assert_eq!(store.raw(keys::STORE_SYNC_ENABLED).as_deref(), Some("false"));
    assert_eq!(controller.assessments().await.len(), 1);
    assert!(
        drain(&mut events)
            .iter()
            .any(|e| matches!(e, AppEvent::SyncDisabled { .. }))
    );
}

#[tokio::test(start_paused = true)]
async fn backup_round_trips_into_a_fresh_store() {
    let store = Arc::new(MemoryStore::new());
    let controller = open(&store).await;
    controller.start_assessment("A", None, Some("qa")).await.unwrap();
    controller.record_answer("q1", Answer::Yes, None).await.unwrap();
    controller.save_now().await.unwrap();
    controller.start_assessment("B", Some("Night"), Some("qa")).await.unwrap();
    controller.save_now().await.unwrap();

    let backup = controller.export_backup().await.unwrap();
    assert!(!backup.contains("_fileLastModified"));

    let other = open(&Arc::new(MemoryStore::new())).await;
    let report = other.import_backup(&backup).await.unwrap();
    assert_eq!(report.added.len(), 2);
    assert_eq!(other.assessments().await.len(), 2);

    let again = other.import_backup(&backup).await.unwrap();
    assert!(!again.changed());

    let err = other.import_backup("{\"name\": \"A\"}").await.unwrap_err();
    assert!(matches!(err, SyncError::InvalidBackup(_)));
}

#[tokio::test]
async fn selected_folder_is_restored_next_session() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());

    let controller = open(&store).await;
    controller.start_assessment("App", None, Some("qa")).await.unwrap();
    controller.save_now().await.unwrap();
    let report = controller
        .select_sync_folder(SyncFolderHandle::new(dir.path()))
        .await
        .unwrap();
    assert_eq!(report.export.written, 1);
    controller.shutdown().await;

    let reopened = open(&store).await;
    assert!(reopened.restore_sync_folder().await.unwrap());
    assert!(reopened.is_sync_enabled());
    reopened.shutdown().await;

    // The folder vanishes between sessions.
    drop(dir);
    let third = open(&store).await;
    assert!(!third.restore_sync_folder().await.unwrap());
    assert_eq!(store.raw(keys::STORE_SYNC_ENABLED).as_deref(), Some("false"));
}

#[tokio::test(start_paused = true)]
async fn switching_assessments_keeps_pending_edits() {
    let store = Arc::new(MemoryStore::new());
    let controller = open(&store).await;

    controller.start_assessment("B", None, Some("qa")).await.unwrap();
    controller.save_now().await.unwrap();
    controller.start_assessment("A", None, Some("qa")).await.unwrap();
    controller.save_now().await.unwrap();

    controller.record_answer("q1", Answer::Yes, None).await.unwrap();
    controller.open_assessment("B", None).await.unwrap();
    controller.record_answer("q3", Answer::No, None).await.unwrap();
    assert!(controller.tracker().is_editing("A", None), "A keeps its edit window");
    assert!(controller.tracker().is_editing("B", None));

    tokio::time::sleep(Duration::from_secs(3)).await;
    let all = controller.assessments().await;
    let a = all.iter().find(|x| x.name == "A").unwrap();
    let b = all.iter().find(|x| x.name == "B").unwrap();
    assert_eq!(a.answer("q1"), Some(Answer::Yes));
    assert_eq!(b.answer("q3"), Some(Answer::No));
    assert!(b.answer("q1").is_none());

    let reopened = open(&store).await;
    let stored = reopened.assessments().await;
    assert_eq!(
        stored.iter().find(|x| x.name == "A").unwrap().answer("q1"),
        Some(Answer::Yes)
    );
}

#[tokio::test(start_paused = true)]
async fn starting_another_assessment_saves_the_open_one() {
    let store = Arc::new(MemoryStore::new());
    let controller = open(&store).await;

    controller.start_assessment("A", None, Some("qa")).await.unwrap();
    controller.record_answer("q1", Answer::No, None).await.unwrap();
    controller.start_assessment("B", None, Some("qa")).await.unwrap();

    let all = controller.assessments().await;
    let a = all.iter().find(|x| x.name == "A").unwrap();
    assert_eq!(a.answer("q1"), Some(Answer::No));
    assert_eq!(store.write_count(), 1);
    assert_eq!(controller.current().await.unwrap().name, "B");
}

#[tokio::test(start_paused = true)]
async fn save_now_replaces_the_pending_debounced_save() {
    let store = Arc::new(MemoryStore::new());
    let folder = Arc::new(MemoryFolder::new());
    let controller = open(&store).await;
    controller.attach_folder(folder.clone());

    controller.start_assessment("App", None, Some("qa")).await.unwrap();
    controller.record_answer("q1", Answer::Yes, None).await.unwrap();
    controller.save_now().await.unwrap();
    let saved = controller.current().await.unwrap();
    let writes = store.write_count();

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(store.write_count(), writes);
    assert_eq!(folder.write_count(), 1);
    assert_eq!(controller.current().await.unwrap().date, saved.date);

    controller.shutdown().await;
    assert_eq!(store.write_count(), writes);
    assert_eq!(folder.write_count(), 1);
}

#[tokio::test]
async fn disabling_sync_forgets_the_folder() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let controller = open(&store).await;
    controller
        .select_sync_folder(SyncFolderHandle::new(dir.path()))
        .await
        .unwrap();
    assert!(store.raw(keys::STORE_SYNC_FOLDER).is_some());

    controller.disable_sync().await.unwrap();
    assert!(!controller.is_sync_enabled());
    assert!(store.raw(keys::STORE_SYNC_FOLDER).is_none());
    assert_eq!(store.raw(keys::STORE_SYNC_ENABLED).as_deref(), Some("false"));
    controller.shutdown().await;

    let reopened = open(&store).await;
    assert!(!reopened.restore_sync_folder().await.unwrap());
}
