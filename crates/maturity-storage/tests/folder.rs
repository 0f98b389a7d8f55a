use maturity_storage::{
    DirectoryFolder, MemoryFolder, StorageError, SyncFolder, SyncFolderHandle,
};

#[tokio::test]
async fn directory_folder_writes_lists_reads_and_deletes() {
    let dir = tempfile::tempdir().unwrap();
    let folder = DirectoryFolder::new(dir.path());
    folder.request_permission().await.unwrap();

    let modified = folder
        .write("assessment-a-a-2024-01-01.json", b"{}".to_vec())
        .await
        .unwrap();
    folder.write("notes.txt", b"hi".to_vec()).await.unwrap();
    std::fs::create_dir(dir.path().join("nested")).unwrap();

    let entries = folder.list().await.unwrap();
    let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["assessment-a-a-2024-01-01.json", "notes.txt"]);
    assert_eq!(entries[0].modified, modified);

    let read = folder.read("assessment-a-a-2024-01-01.json").await.unwrap();
    assert_eq!(read.bytes, b"{}");
    assert_eq!(read.modified, modified);

    folder.delete("notes.txt").await.unwrap();
    folder.delete("notes.txt").await.unwrap();
    assert!(!dir.path().join("notes.txt").exists());
}

#[tokio::test]
async fn directory_folder_rejects_nested_names() {
    let dir = tempfile::tempdir().unwrap();
    let folder = DirectoryFolder::new(dir.path());
    let err = folder.write("../x.json", Vec::new()).await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidKey(_)));
}

#[tokio::test]
async fn missing_directory_reports_lost_access() {
    let dir = tempfile::tempdir().unwrap();
    let gone = dir.path().join("gone");
    let folder = DirectoryFolder::new(&gone);

    let err = folder.request_permission().await.unwrap_err();
    assert!(err.is_access_lost());
    let err = folder.list().await.unwrap_err();
    assert!(err.is_access_lost());
    let err = folder.write("a.json", Vec::new()).await.unwrap_err();
    assert!(err.is_access_lost(), "{err}");
}

#[tokio::test]
async fn file_errors_in_a_reachable_folder_are_not_access_loss() {
    let dir = tempfile::tempdir().unwrap();
    let folder = DirectoryFolder::new(dir.path());

    let err = folder.read("assessment-missing.json").await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }), "{err}");
    assert!(!err.is_access_lost());

    // A directory where a file is expected fails that entry only.
    std::fs::create_dir(dir.path().join("assessment-dir.json")).unwrap();
    let err = folder.read("assessment-dir.json").await.unwrap_err();
    assert!(matches!(err, StorageError::Io { .. }), "{err}");
    assert!(!err.is_access_lost());
    let err = folder
        .write("assessment-dir.json", b"{}".to_vec())
        .await
        .unwrap_err();
    assert!(!err.is_access_lost(), "{err}");

    folder.write("other.json", b"{}".to_vec()).await.unwrap();
}

#[tokio::test]
async fn memory_folder_denies_single_files() {
    let folder = MemoryFolder::new();
    folder.put_external("locked.json", "{}");
    folder.put_external("open.json", "{}");
    folder.deny_file("locked.json");

    for err in [
        folder.read("locked.json").await.map(|_| ()).unwrap_err(),
        folder.write("locked.json", Vec::new()).await.map(|_| ()).unwrap_err(),
        folder.delete("locked.json").await.unwrap_err(),
    ] {
        assert!(matches!(err, StorageError::Io { .. }), "{err}");
        assert!(!err.is_access_lost());
    }
    folder.request_permission().await.unwrap();
    assert_eq!(folder.read("open.json").await.unwrap().bytes, b"{}");
    assert_eq!(folder.names(), ["locked.json", "open.json"]);
}

#[tokio::test]
async fn handle_reopens_existing_folder_only() {
    let dir = tempfile::tempdir().unwrap();
    let handle = SyncFolderHandle::new(dir.path());
    let folder = handle.open().await.unwrap();
    assert_eq!(folder.describe(), dir.path().display().to_string());

    let missing = SyncFolderHandle::new(dir.path().join("missing"));
    assert!(missing.open().await.is_err());

    let json = serde_json::to_string(&handle).unwrap();
    let back: SyncFolderHandle = serde_json::from_str(&json).unwrap();
    assert_eq!(back, handle);
}

#[tokio::test]
async fn memory_folder_clock_and_counters() {
    let folder = MemoryFolder::new();
    let external = folder.put_external("a.json", "{}");
    let written = folder.write("b.json", b"[]".to_vec()).await.unwrap();
    assert!(written > external);
    assert_eq!(folder.write_count(), 1);

    folder.delete("a.json").await.unwrap();
    assert_eq!(folder.delete_count(), 1);
    assert_eq!(folder.names(), ["b.json"]);

    folder.fail_writes_to("c.json");
    assert!(!folder.write("c.json", Vec::new()).await.unwrap_err().is_access_lost());

    folder.revoke();
    assert!(folder.list().await.unwrap_err().is_access_lost());
    folder.restore();
    assert!(folder.list().await.is_ok());
}
