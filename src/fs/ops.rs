use crate::core::errors::{Error, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tokio::task;

/// Copies each source into `dest`, recursing into directories. All sources
/// are checked for existence before anything is copied.
pub async fn copy_entries(sources: Vec<PathBuf>, dest: PathBuf) -> Result<()> {
    task::spawn_blocking(move || {
        ensure_sources_exist(&sources)?;
        for source in &sources {
            let target = dest.join(source.file_name().unwrap_or_default());
            if source.is_dir() {
                copy_dir_all(source, &target)?;
            } else {
                fs::copy(source, &target)?;
            }
        }
        Ok(())
    })
    .await
    .map_err(|e| Error::Internal(e.into()))?
}

/// Moves each source into `dest`. Rename and move are the same operation at
/// the filesystem level.
pub async fn move_entries(sources: Vec<PathBuf>, dest: PathBuf) -> Result<()> {
    task::spawn_blocking(move || {
        ensure_sources_exist(&sources)?;
        for source in &sources {
            let target = dest.join(source.file_name().unwrap_or_default());
            fs::rename(source, &target)?;
        }
        Ok(())
    })
    .await
    .map_err(|e| Error::Internal(e.into()))?
}

/// Deletes files and directory trees. Deletions already performed are not
/// rolled back when a later path fails.
pub async fn delete_entries(paths: Vec<PathBuf>) -> Result<()> {
    task::spawn_blocking(move || {
        for path in &paths {
            if !path.exists() {
                return Err(Error::not_found(path.to_string_lossy()));
            }
            if path.is_dir() {
                fs::remove_dir_all(path)?;
            } else {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    })
    .await
    .map_err(|e| Error::Internal(e.into()))?
}

/// Creates an empty file, or a directory chain when `is_dir` is set.
pub async fn create_entry(path: PathBuf, is_dir: bool) -> Result<()> {
    if is_dir {
        tokio::fs::create_dir_all(&path).await?;
    } else {
        tokio::fs::File::create(&path).await?;
    }
    Ok(())
}

fn ensure_sources_exist(sources: &[PathBuf]) -> Result<()> {
    for source in sources {
        if !source.exists() {
            return Err(Error::not_found(source.to_string_lossy()));
        }
    }
    Ok(())
}

fn copy_dir_all(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> io::Result<()> {
    fs::create_dir_all(&dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let src_path = entry.path();
        let dst_path = dst.as_ref().join(entry.file_name());

        if file_type.is_dir() {
            copy_dir_all(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn copies_files_and_directory_trees() -> Result<()> {
        let dir = tempdir().map_err(|e| anyhow::anyhow!(e))?;
        let src_dir = dir.path().join("src");
        fs::create_dir_all(src_dir.join("nested"))?;
        fs::write(src_dir.join("a.txt"), "aa")?;
        fs::write(src_dir.join("nested/b.txt"), "bb")?;
        fs::write(dir.path().join("loose.txt"), "loose")?;
        let dest = dir.path().join("dest");
        fs::create_dir(&dest)?;

        copy_entries(
            vec![src_dir.clone(), dir.path().join("loose.txt")],
            dest.clone(),
        )
        .await?;

        assert_eq!(fs::read_to_string(dest.join("src/a.txt"))?, "aa");
        assert_eq!(fs::read_to_string(dest.join("src/nested/b.txt"))?, "bb");
        assert_eq!(fs::read_to_string(dest.join("loose.txt"))?, "loose");
        // Sources are untouched.
        assert!(src_dir.join("a.txt").exists());
        Ok(())
    }

    #[tokio::test]
    async fn move_removes_the_source() -> Result<()> {
        let dir = tempdir().map_err(|e| anyhow::anyhow!(e))?;
        fs::write(dir.path().join("file.txt"), "data")?;
        let dest = dir.path().join("dest");
        fs::create_dir(&dest)?;

        move_entries(vec![dir.path().join("file.txt")], dest.clone()).await?;

        assert!(!dir.path().join("file.txt").exists());
        assert_eq!(fs::read_to_string(dest.join("file.txt"))?, "data");
        Ok(())
    }

    #[tokio::test]
    async fn missing_source_aborts_before_copying() -> Result<()> {
        let dir = tempdir().map_err(|e| anyhow::anyhow!(e))?;
        fs::write(dir.path().join("real.txt"), "x")?;
        let dest = dir.path().join("dest");
        fs::create_dir(&dest)?;

        let result = copy_entries(
            vec![dir.path().join("ghost.txt"), dir.path().join("real.txt")],
            dest.clone(),
        )
        .await;

        assert!(matches!(result, Err(Error::NotFound { .. })));
        assert!(
            !dest.join("real.txt").exists(),
            "nothing should be copied when a source is missing"
        );
        Ok(())
    }

    #[tokio::test]
    async fn deletes_files_and_trees() -> Result<()> {
        let dir = tempdir().map_err(|e| anyhow::anyhow!(e))?;
        let tree = dir.path().join("tree");
        fs::create_dir_all(tree.join("deep"))?;
        fs::write(tree.join("deep/file.txt"), "x")?;
        fs::write(dir.path().join("single.txt"), "y")?;

        delete_entries(vec![tree.clone(), dir.path().join("single.txt")]).await?;

        assert!(!tree.exists());
        assert!(!dir.path().join("single.txt").exists());
        Ok(())
    }

    #[tokio::test]
    async fn create_entry_makes_files_and_directories() -> Result<()> {
        let dir = tempdir().map_err(|e| anyhow::anyhow!(e))?;

        create_entry(dir.path().join("made/of/dirs"), true).await?;
        assert!(dir.path().join("made/of/dirs").is_dir());

        create_entry(dir.path().join("empty.txt"), false).await?;
        assert!(dir.path().join("empty.txt").is_file());
        Ok(())
    }
}
