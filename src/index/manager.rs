use crate::core::errors::{Error, Result};
use crate::fs::entry::epoch_secs;
use crate::index::IndexFilter;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use tantivy::collector::TopDocs;
use tantivy::query::{AllQuery, QueryParser};
use tantivy::schema::{Document, Field, Schema, FAST, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, Term};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Search responses are capped at this many hits.
const SEARCH_LIMIT: usize = 100;

/// One indexed file, as returned from search. Timestamps are epoch seconds.
#[derive(Debug, Clone, Serialize)]
pub struct IndexedFile {
    pub path: String,
    pub filename: String,
    pub size: u64,
    pub mtime: u64,
    pub ctime: u64,
}

impl IndexedFile {
    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path)?;
        let filename = path
            .file_name()
            .ok_or_else(|| Error::invalid_input("path has no filename"))?
            .to_string_lossy()
            .into_owned();

        Ok(Self {
            path: index_key(path),
            filename,
            size: metadata.len(),
            mtime: metadata.modified().ok().map(epoch_secs).unwrap_or(0),
            ctime: metadata.created().ok().map(epoch_secs).unwrap_or(0),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexStats {
    pub file_count: u64,
    pub total_size: u64,
    pub average_size: u64,
}

struct Fields {
    path: Field,
    filename: Field,
    path_text: Field,
    size: Field,
    mtime: Field,
    ctime: Field,
}

impl Fields {
    fn resolve(schema: &Schema) -> Result<Self> {
        Ok(Self {
            path: schema.get_field("path")?,
            filename: schema.get_field("filename")?,
            path_text: schema.get_field("path_text")?,
            size: schema.get_field("size")?,
            mtime: schema.get_field("mtime")?,
            ctime: schema.get_field("ctime")?,
        })
    }
}

/// Metadata index over the files below `root`.
///
/// `path` is indexed raw and doubles as the document identity (upserts
/// delete by the exact path term first); `filename` and `path_text` are
/// tokenized for querying.
pub struct IndexManager {
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    fields: Fields,
    root: PathBuf,
}

impl IndexManager {
    pub fn open(index_dir: impl AsRef<Path>, root: impl Into<PathBuf>) -> Result<Self> {
        let index_dir = index_dir.as_ref();
        fs::create_dir_all(index_dir)?;

        let index = if index_dir.join("meta.json").exists() {
            Index::open_in_dir(index_dir)?
        } else {
            Index::create_in_dir(index_dir, Self::schema())?
        };

        let fields = Fields::resolve(&index.schema())?;
        // 50MB indexing heap
        let writer = index.writer(50_000_000)?;
        let reader = index.reader()?;

        Ok(Self {
            index,
            reader,
            writer: Mutex::new(writer),
            fields,
            root: root.into(),
        })
    }

    fn schema() -> Schema {
        let mut builder = Schema::builder();
        builder.add_text_field("path", STRING | STORED);
        builder.add_text_field("filename", TEXT | STORED);
        builder.add_text_field("path_text", TEXT);
        builder.add_u64_field("size", STORED | FAST);
        builder.add_u64_field("mtime", STORED);
        builder.add_u64_field("ctime", STORED);
        builder.build()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_empty(&self) -> bool {
        self.reader.searcher().num_docs() == 0
    }

    /// Drops all documents and re-walks the root. Returns the number of
    /// files indexed.
    pub fn rebuild(&self, filter: &IndexFilter) -> Result<usize> {
        info!("starting file indexing of {}", self.root.display());
        let started = Instant::now();

        let mut writer = self.writer()?;
        writer.delete_all_documents()?;

        let mut indexed = 0usize;
        let mut errors = 0usize;
        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if !filter.allows(path) {
                continue;
            }

            match IndexedFile::from_path(path) {
                Ok(record) => {
                    writer.add_document(self.document(&record))?;
                    indexed += 1;
                }
                Err(e) => {
                    debug!("skipping {}: {e}", path.display());
                    errors += 1;
                }
            }
        }

        writer.commit()?;
        drop(writer);
        self.reader.reload()?;

        info!(
            "indexing completed in {:.1?}: {indexed} files, {errors} errors",
            started.elapsed()
        );
        Ok(indexed)
    }

    /// Inserts or replaces the document for one file.
    pub fn upsert(&self, record: &IndexedFile) -> Result<()> {
        let mut writer = self.writer()?;
        writer.delete_term(Term::from_field_text(self.fields.path, &record.path));
        writer.add_document(self.document(record))?;
        writer.commit()?;
        drop(writer);
        self.reader.reload()?;
        Ok(())
    }

    pub fn remove(&self, path: &Path) -> Result<()> {
        let key = index_key(path);
        let mut writer = self.writer()?;
        writer.delete_term(Term::from_field_text(self.fields.path, &key));
        writer.commit()?;
        drop(writer);
        self.reader.reload()?;
        Ok(())
    }

    /// Routes a watcher event to upserts or removals.
    pub fn apply_event(&self, event: &notify::Event, filter: &IndexFilter) -> Result<()> {
        use notify::EventKind;

        match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) => {
                for path in &event.paths {
                    if !filter.allows(path) || !path.is_file() {
                        continue;
                    }
                    match IndexedFile::from_path(path) {
                        Ok(record) => {
                            debug!("updating index for {}", record.path);
                            self.upsert(&record)?;
                        }
                        Err(e) => debug!("skipping changed file {}: {e}", path.display()),
                    }
                }
            }
            EventKind::Remove(_) => {
                for path in &event.paths {
                    if !filter.allows(path) {
                        continue;
                    }
                    debug!("removing index entry for {}", path.display());
                    self.remove(path)?;
                }
            }
            _ => {}
        }

        Ok(())
    }

    pub fn search(&self, query_str: &str, filename_only: bool) -> Result<Vec<IndexedFile>> {
        if query_str.trim().is_empty() {
            return Ok(Vec::new());
        }

        let query_fields = if filename_only {
            vec![self.fields.filename]
        } else {
            vec![self.fields.filename, self.fields.path_text]
        };
        let parser = QueryParser::for_index(&self.index, query_fields);
        let query = parser
            .parse_query(query_str)
            .map_err(|e| Error::invalid_input(format!("failed to parse search query: {e}")))?;

        let searcher = self.reader.searcher();
        let top_docs = searcher.search(&query, &TopDocs::with_limit(SEARCH_LIMIT))?;

        let mut results = Vec::with_capacity(top_docs.len());
        for (_score, address) in top_docs {
            let retrieved = searcher.doc(address)?;
            results.push(self.record_from(&retrieved));
        }
        Ok(results)
    }

    pub fn stats(&self) -> Result<IndexStats> {
        let searcher = self.reader.searcher();
        let file_count = searcher.num_docs();
        if file_count == 0 {
            return Ok(IndexStats::default());
        }

        let top_docs = searcher.search(&AllQuery, &TopDocs::with_limit(file_count as usize))?;
        let mut total_size = 0u64;
        for (_score, address) in top_docs {
            let retrieved = searcher.doc(address)?;
            total_size += retrieved
                .get_first(self.fields.size)
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
        }

        Ok(IndexStats {
            file_count,
            total_size,
            average_size: total_size / file_count,
        })
    }

    fn writer(&self) -> Result<MutexGuard<'_, IndexWriter>> {
        self.writer
            .lock()
            .map_err(|_| Error::Internal(anyhow::anyhow!("index writer lock poisoned")))
    }

    fn document(&self, record: &IndexedFile) -> Document {
        doc!(
            self.fields.path => record.path.clone(),
            self.fields.filename => record.filename.clone(),
            self.fields.path_text => record.path.clone(),
            self.fields.size => record.size,
            self.fields.mtime => record.mtime,
            self.fields.ctime => record.ctime
        )
    }

    fn record_from(&self, doc: &Document) -> IndexedFile {
        let text = |field: Field| {
            doc.get_first(field)
                .and_then(|v| v.as_text())
                .unwrap_or("")
                .to_string()
        };
        let number = |field: Field| doc.get_first(field).and_then(|v| v.as_u64()).unwrap_or(0);

        IndexedFile {
            path: text(self.fields.path),
            filename: text(self.fields.filename),
            size: number(self.fields.size),
            mtime: number(self.fields.mtime),
            ctime: number(self.fields.ctime),
        }
    }
}

/// Canonical string form under which a file is stored in the index.
pub fn index_key(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
