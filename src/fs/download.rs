use archflow::compress::tokio::archive::ZipArchive;
use archflow::compress::FileOptions;
use archflow::compression::CompressionMethod;
use archflow::error::ArchiveError;
use archflow::types::FileDateTime;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{duplex, DuplexStream};
use tracing::{debug, error, warn};
use walkdir::WalkDir;

/// Starts a background task that zips `items` into one end of a duplex pipe
/// and returns the other end for use as a streaming response body. Nothing
/// is buffered beyond the pipe capacity, so arbitrarily large trees download
/// at disk speed.
///
/// With `single_dir` set, `items` holds one directory whose children become
/// the archive's top level (downloading `photos/` should not produce a zip
/// whose only root entry is `photos`).
pub fn spawn_zip_stream(cwd: PathBuf, items: Vec<PathBuf>, single_dir: bool) -> DuplexStream {
    let (writer, reader) = duplex(4096);

    tokio::spawn(async move {
        if let Err(e) = write_zip(writer, cwd, items, single_dir).await {
            error!("zip download stream failed: {e}");
        }
    });

    reader
}

async fn write_zip(
    writer: DuplexStream,
    cwd: PathBuf,
    items: Vec<PathBuf>,
    single_dir: bool,
) -> anyhow::Result<()> {
    let mut archive = ZipArchive::new_streamable(writer);
    let options = FileOptions::default()
        .last_modified_time(FileDateTime::Now)
        .compression_method(CompressionMethod::Store());

    let items = if single_dir {
        directory_children(&items[0]).await.unwrap_or(items)
    } else {
        items
    };

    for item in items {
        let Some(name) = item.file_name() else {
            continue;
        };
        let name = name.to_string_lossy().into_owned();

        if item.is_dir() {
            if let Err(e) = archive.append_directory(&name, &options).await {
                error!("failed to add directory to zip stream: {e}");
                continue;
            }

            for entry in WalkDir::new(&item).into_iter().flatten() {
                let path = entry.path();
                let relative = path.strip_prefix(&cwd).unwrap_or(path);
                let relative_name = relative.to_string_lossy().replace('\\', "/");

                if path.is_dir() {
                    debug!("zip stream: {} -> {}", path.display(), relative_name);
                    if let Err(e) = archive.append_directory(&relative_name, &options).await {
                        error!("failed to add directory to zip stream: {e}");
                    }
                    continue;
                }

                debug!("zip stream: {} -> {}", path.display(), relative_name);
                if let Ok(mut file) = File::open(path).await {
                    match archive.append(&relative_name, &options, &mut file).await {
                        Ok(()) => {}
                        Err(e) if is_client_disconnect(&e) => {
                            warn!("zip stream closed by the client, aborting download");
                            return Ok(());
                        }
                        Err(e) => error!("failed to add file to zip stream: {e}"),
                    }
                }
            }
        } else if let Ok(mut file) = File::open(&item).await {
            debug!("zip stream: {} -> {}", item.display(), name);
            match archive.append(&name, &options, &mut file).await {
                Ok(()) => {}
                Err(e) if is_client_disconnect(&e) => {
                    warn!("zip stream closed by the client, aborting download");
                    return Ok(());
                }
                Err(e) => error!("failed to add file to zip stream: {e}"),
            }
        }
    }

    archive.finalize().await?;
    Ok(())
}

fn is_client_disconnect(err: &ArchiveError) -> bool {
    matches!(err, ArchiveError::IoError(io_err) if io_err.kind() == ErrorKind::BrokenPipe)
}

async fn directory_children(dir: &Path) -> Option<Vec<PathBuf>> {
    let mut read_dir = tokio::fs::read_dir(dir).await.ok()?;
    let mut children = Vec::new();
    while let Ok(Some(entry)) = read_dir.next_entry().await {
        children.push(entry.path());
    }
    Some(children)
}
