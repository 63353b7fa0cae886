use crate::core::errors::{Error, Result};
use crate::progress::ProgressSender;
use axum::response::sse::Event;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Progress events are rate limited to roughly this interval so a fast
/// archive job does not flood the SSE stream.
const PROGRESS_INTERVAL_MS: u128 = 100;

/// Creates `archive_path` as a zip of `entries`, streaming percentage events
/// on `progress`. Runs blocking IO; call from a blocking task.
///
/// Entries are stored uncompressed: the archive lands on the same disk the
/// sources live on and store keeps the job IO-bound rather than CPU-bound.
pub fn create_archive(
    archive_path: &Path,
    entries: Vec<PathBuf>,
    progress: &ProgressSender,
) -> Result<()> {
    let file = std::fs::File::create(archive_path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .unix_permissions(0o755);

    let total_bytes = total_input_bytes(&entries);
    let mut tracker = ProgressTracker::new(total_bytes, progress);
    tracker.send_percent(0.0);

    for entry in entries {
        if entry.is_dir() {
            let dir_name = entry
                .file_name()
                .ok_or_else(|| Error::invalid_input("invalid directory name"))?
                .to_string_lossy()
                .into_owned();
            zip.add_directory(&dir_name, options)?;

            for dir_entry in WalkDir::new(&entry) {
                let dir_entry = dir_entry.map_err(|e| Error::Internal(e.into()))?;
                let path = dir_entry.path();
                if path == entry {
                    continue;
                }

                let rel = path
                    .strip_prefix(&entry)
                    .map_err(|e| Error::Internal(e.into()))?;
                let rel_name = Path::new(&dir_name)
                    .join(rel)
                    .to_string_lossy()
                    .replace('\\', "/");

                if path.is_file() {
                    debug!("archiving {} -> {}", path.display(), rel_name);
                    zip.start_file(rel_name, options)?;
                    append_file(path, &mut zip, &mut tracker)?;
                } else if path.is_dir() {
                    zip.add_directory(rel_name, options)?;
                }
            }
        } else {
            let name = entry
                .file_name()
                .ok_or_else(|| Error::invalid_input("invalid file name"))?
                .to_string_lossy()
                .into_owned();
            debug!("archiving {} -> {}", entry.display(), name);
            zip.start_file(name, options)?;
            append_file(&entry, &mut zip, &mut tracker)?;
        }
    }

    tracker.send_complete();
    zip.finish()?;
    Ok(())
}

fn append_file(
    path: &Path,
    zip: &mut ZipWriter<std::fs::File>,
    tracker: &mut ProgressTracker<'_>,
) -> Result<()> {
    let file = std::fs::File::open(path)?;
    let mut reader = BufReader::with_capacity(8192, file);
    let mut buffer = [0u8; 4096];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        zip.write_all(&buffer[..bytes_read])?;
        tracker.advance(bytes_read as u64);
    }
    Ok(())
}

/// Sums the file bytes below `entries` so progress can be reported as an
/// accurate percentage. Unreadable files count as zero.
fn total_input_bytes(entries: &[PathBuf]) -> u64 {
    let mut total = 0u64;
    for entry in entries {
        if entry.is_dir() {
            for dir_entry in WalkDir::new(entry).into_iter().flatten() {
                if dir_entry.path().is_file() {
                    if let Ok(metadata) = dir_entry.metadata() {
                        total += metadata.len();
                    }
                }
            }
        } else if let Ok(metadata) = std::fs::metadata(entry) {
            total += metadata.len();
        }
    }
    total
}

struct ProgressTracker<'a> {
    total: u64,
    processed: u64,
    last_sent: Instant,
    sender: &'a ProgressSender,
}

impl<'a> ProgressTracker<'a> {
    fn new(total: u64, sender: &'a ProgressSender) -> Self {
        Self {
            total,
            processed: 0,
            last_sent: Instant::now(),
            sender,
        }
    }

    fn advance(&mut self, bytes: u64) {
        self.processed += bytes;
        if self.last_sent.elapsed().as_millis() > PROGRESS_INTERVAL_MS {
            let percent = if self.total > 0 {
                (self.processed as f32 / self.total as f32) * 100.0
            } else {
                0.0
            };
            self.send_percent(percent);
            self.last_sent = Instant::now();
        }
    }

    fn send_percent(&self, percent: f32) {
        // A dropped receiver means the client closed the status stream; the
        // archive still finishes.
        let _ = self
            .sender
            .blocking_send(Event::default().data(format!("{{ \"progress\": {percent:.1} }}")));
    }

    fn send_complete(&self) {
        let _ = self.sender.blocking_send(
            Event::default().data("{ \"progress\": 100.0, \"status\": \"complete\" }"),
        );
    }
}
