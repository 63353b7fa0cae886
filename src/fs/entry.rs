use crate::core::errors::{Error, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::task;

/// A single directory child as the browser renders it. Timestamps are epoch
/// seconds; `None` when the platform cannot provide them.
#[derive(Debug, Clone, Serialize)]
pub struct Entry {
    pub filename: String,
    pub path: String,
    pub size: u64,
    pub is_dir: bool,
    pub created: Option<u64>,
    pub last_modified: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    pub parent: Option<String>,
    pub entries: Vec<Entry>,
}

impl Entry {
    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata = path.metadata()?;
        let filename = path
            .file_name()
            .ok_or_else(|| Error::invalid_input("unable to determine filename"))?
            .to_string_lossy()
            .into_owned();

        Ok(Entry {
            filename,
            path: path.to_string_lossy().into_owned(),
            size: metadata.len(),
            is_dir: metadata.is_dir(),
            created: metadata.created().ok().map(epoch_secs),
            last_modified: metadata.modified().ok().map(epoch_secs),
        })
    }
}

/// Reads a directory listing on a blocking task; directory IO must not stall
/// the request executor.
pub async fn read_listing(path: PathBuf) -> Result<Listing> {
    task::spawn_blocking(move || read_listing_sync(&path))
        .await
        .map_err(|e| Error::Internal(e.into()))?
}

fn read_listing_sync(path: &Path) -> Result<Listing> {
    let path = path
        .canonicalize()
        .map_err(|_| Error::not_found(path.to_string_lossy()))?;

    let mut entries = Vec::new();
    for child in fs::read_dir(&path)? {
        let child = match child {
            Ok(child) => child,
            Err(_) => continue,
        };
        let child_path = child.path();
        if is_special_file(&child_path) {
            continue;
        }
        if let Ok(entry) = Entry::from_path(&child_path) {
            entries.push(entry);
        }
    }

    Ok(Listing {
        parent: path.parent().map(|p| p.to_string_lossy().into_owned()),
        entries,
    })
}

/// Device nodes, sockets and the like would hang or error a read; they are
/// hidden from listings entirely.
pub fn is_special_file(path: &Path) -> bool {
    #[cfg(unix)]
    {
        if let Ok(metadata) = path.symlink_metadata() {
            use std::os::unix::fs::FileTypeExt;
            let file_type = metadata.file_type();
            return file_type.is_char_device()
                || file_type.is_block_device()
                || file_type.is_fifo()
                || file_type.is_socket()
                || file_type.is_symlink();
        }
    }

    #[cfg(windows)]
    {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            return name.eq_ignore_ascii_case("desktop.ini")
                || name.eq_ignore_ascii_case("thumbs.db")
                || name.starts_with('$')
                || name.starts_with("~$");
        }
    }

    let _ = path;
    false
}

pub fn epoch_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn lists_files_and_directories() -> Result<()> {
        let dir = tempdir().map_err(|e| anyhow::anyhow!(e))?;
        fs::write(dir.path().join("report.txt"), "contents")?;
        fs::create_dir(dir.path().join("photos"))?;

        let listing = read_listing(dir.path().to_path_buf()).await?;
        assert_eq!(listing.entries.len(), 2);

        let file = listing
            .entries
            .iter()
            .find(|e| e.filename == "report.txt")
            .expect("file entry");
        assert!(!file.is_dir);
        assert_eq!(file.size, "contents".len() as u64);
        assert!(file.last_modified.is_some());

        let folder = listing
            .entries
            .iter()
            .find(|e| e.filename == "photos")
            .expect("dir entry");
        assert!(folder.is_dir);
        Ok(())
    }

    #[tokio::test]
    async fn listing_reports_parent() -> Result<()> {
        let dir = tempdir().map_err(|e| anyhow::anyhow!(e))?;
        let child = dir.path().join("nested");
        fs::create_dir(&child)?;

        let listing = read_listing(child).await?;
        let parent = listing.parent.expect("parent path");
        assert!(parent.ends_with(
            dir.path()
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
        ));
        Ok(())
    }

    #[tokio::test]
    async fn missing_directory_is_not_found() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let result = read_listing(missing).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinks_are_filtered_out() -> Result<()> {
        let dir = tempdir().map_err(|e| anyhow::anyhow!(e))?;
        fs::write(dir.path().join("real.txt"), "x")?;
        std::os::unix::fs::symlink(dir.path().join("real.txt"), dir.path().join("link.txt"))?;

        let listing = read_listing(dir.path().to_path_buf()).await?;
        assert_eq!(listing.entries.len(), 1);
        assert_eq!(listing.entries[0].filename, "real.txt");
        Ok(())
    }
}
