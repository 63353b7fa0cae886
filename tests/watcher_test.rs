use anyhow::Result;
use filer::index::{FileWatcher, IndexFilter, IndexManager, IndexedFile};
use std::fs;
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::mpsc;
use tokio::time::timeout;

#[tokio::test]
async fn watcher_detects_new_files() -> Result<()> {
    let temp = tempdir()?;
    let watch_root = temp.path().to_path_buf();

    let (tx, mut rx) = mpsc::channel(100);
    let _watcher = FileWatcher::new(&watch_root, tx)?;

    let file_path = watch_root.join("new_file.txt");
    fs::write(&file_path, "initial content")?;

    // Notify may coalesce or split events; scan until our path shows up.
    let deadline = Duration::from_secs(5);
    let found = timeout(deadline, async {
        while let Some(event) = rx.recv().await {
            if event
                .paths
                .iter()
                .any(|p| p.file_name() == Some(std::ffi::OsStr::new("new_file.txt")))
            {
                return true;
            }
        }
        false
    })
    .await;

    assert!(
        found.unwrap_or(false),
        "should observe new_file.txt being created"
    );
    Ok(())
}

#[tokio::test]
async fn watcher_events_drive_index_updates() -> Result<()> {
    let temp = tempdir()?;
    let content_root = temp.path().join("files");
    fs::create_dir_all(&content_root)?;

    let manager = IndexManager::open(temp.path().join("index"), &content_root)?;
    manager.rebuild(&IndexFilter::permissive())?;
    assert!(manager.is_empty());

    let (tx, mut rx) = mpsc::channel(100);
    let _watcher = FileWatcher::new(&content_root, tx)?;

    let file_path = content_root.join("fresh.txt");
    fs::write(&file_path, "fresh content")?;

    // Apply events exactly as the server's watcher task would.
    let deadline = Duration::from_secs(5);
    let indexed = timeout(deadline, async {
        while let Some(event) = rx.recv().await {
            let filter = IndexFilter::permissive();
            manager.apply_event(&event, &filter).ok();
            if !manager.search("fresh", true).unwrap_or_default().is_empty() {
                return true;
            }
        }
        false
    })
    .await;

    assert!(
        indexed.unwrap_or(false),
        "created file should become searchable"
    );

    // Removal takes it back out of the index.
    fs::remove_file(&file_path)?;
    let removed = timeout(deadline, async {
        while let Some(event) = rx.recv().await {
            let filter = IndexFilter::permissive();
            manager.apply_event(&event, &filter).ok();
            if manager.search("fresh", true).unwrap_or_default().is_empty() {
                return true;
            }
        }
        false
    })
    .await;

    assert!(
        removed.unwrap_or(false),
        "deleted file should leave the index"
    );
    Ok(())
}

#[tokio::test]
async fn manual_upsert_matches_watcher_shape() -> Result<()> {
    // The watcher path and the manual path share IndexedFile::from_path;
    // verify the record carries real metadata.
    let temp = tempdir()?;
    let file = temp.path().join("sample.bin");
    fs::write(&file, vec![0u8; 2048])?;

    let record = IndexedFile::from_path(&file)?;
    assert_eq!(record.filename, "sample.bin");
    assert_eq!(record.size, 2048);
    assert!(record.mtime > 0);
    assert!(!record.path.contains('\\'));
    Ok(())
}
