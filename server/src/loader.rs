//! Record loading from a directory of JSON files.
//!
//! A record file holds one concept object, or an array of them. Each object
//! carries the concept fields plus an optional `relations` array:
//!
//! ```json
//! {
//!   "id": "regression",
//!   "pref_label": "Regression",
//!   "definition": "Predicting continuous values",
//!   "relations": [{ "relation": "broader", "target": "supervised_learning" }]
//! }
//! ```
//!
//! The loader remembers which ids every file produced, so a rewritten or
//! deleted file turns into `Remove` operations for the ids it no longer
//! provides.

use dashmap::DashMap;
use globset::GlobSet;
use ontograph_core::{Concept, RelationSpec, UpdateOp};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::error::{ServerError, ServerResult};

/// Appended to content cut at the configured maximum length.
pub const TRUNCATION_MARKER: &str = "\n[... content truncated ...]";

/// Directories never descended into.
const SKIPPED_DIRS: [&str; 4] = ["node_modules", "target", "__pycache__", "dist"];

#[derive(Debug, Deserialize)]
struct RecordEntry {
    #[serde(flatten)]
    concept: Concept,
    #[serde(default)]
    relations: Vec<RelationSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecordFile {
    Many(Vec<RecordEntry>),
    One(RecordEntry),
}

impl RecordFile {
    fn into_entries(self) -> Vec<RecordEntry> {
        match self {
            RecordFile::Many(entries) => entries,
            RecordFile::One(entry) => vec![entry],
        }
    }
}

/// Turns record files into update batches.
pub struct RecordLoader {
    root: PathBuf,
    matcher: GlobSet,
    max_content_length: usize,

    /// Record file -> ids it produced on its last successful load.
    produced: DashMap<PathBuf, Vec<String>>,
}

impl RecordLoader {
    /// Create a loader for the records directory in `settings`.
    pub fn new(settings: &Settings) -> ServerResult<Self> {
        let root = std::fs::canonicalize(&settings.records)?;
        Ok(Self {
            root,
            matcher: settings.record_matcher()?,
            max_content_length: settings.limits.max_content_length,
            produced: DashMap::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of record files currently contributing concepts.
    pub fn file_count(&self) -> usize {
        self.produced.len()
    }

    /// Ids the file produced on its last successful load.
    pub fn ids_for(&self, path: &Path) -> Vec<String> {
        self.produced
            .get(path)
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }

    /// Whether `path` is a record file this loader is responsible for.
    pub fn is_record_file(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        let hidden = relative.components().any(|c| {
            c.as_os_str()
                .to_str()
                .map(|name| name.starts_with('.'))
                .unwrap_or(true)
        });
        !hidden && self.matcher.is_match(relative)
    }

    /// Load every record file below the root.
    ///
    /// Files that fail to parse are logged and skipped.
    pub async fn scan(&self) -> ServerResult<Vec<UpdateOp>> {
        let mut files = Vec::new();
        collect_files(&self.root, &mut files)?;
        files.sort();

        let mut ops = Vec::new();
        let mut loaded = 0;
        for path in files.iter().filter(|p| self.is_record_file(p)) {
            match self.load_file(path).await {
                Ok(file_ops) => {
                    loaded += 1;
                    ops.extend(file_ops);
                }
                Err(e) => tracing::warn!("Skipping {}: {}", path.display(), e),
            }
        }

        tracing::info!(
            "Scanned {}: {} record files, {} operations",
            self.root.display(),
            loaded,
            ops.len()
        );
        Ok(ops)
    }

    /// Read one record file and produce the operations that bring the graph
    /// in line with it. Ids the file produced before but no longer contains
    /// are removed first.
    pub async fn load_file(&self, path: &Path) -> ServerResult<Vec<UpdateOp>> {
        let text = tokio::fs::read_to_string(path).await?;
        let file: RecordFile = serde_json::from_str(&text).map_err(|source| ServerError::Record {
            path: path.to_path_buf(),
            source,
        })?;

        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let mut upserts = Vec::new();
        let mut ids = Vec::new();
        for entry in file.into_entries() {
            let mut concept = entry.concept;
            if concept.source.is_none() {
                concept.source = Some(relative.display().to_string());
            }
            concept.content = truncate_content(concept.content, self.max_content_length);
            ids.push(concept.id.clone());
            upserts.push(UpdateOp::upsert(concept, entry.relations));
        }

        let current: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let vanished: Vec<String> = self
            .ids_for(path)
            .into_iter()
            .filter(|id| !current.contains(id.as_str()))
            .collect();

        self.produced.insert(path.to_path_buf(), ids);

        let mut ops = self.removals(path, vanished);
        ops.extend(upserts);
        Ok(ops)
    }

    /// Operations for a record file that no longer exists.
    pub fn remove_file(&self, path: &Path) -> Vec<UpdateOp> {
        match self.produced.remove(path) {
            Some((_, ids)) => self.removals(path, ids),
            None => Vec::new(),
        }
    }

    /// Remove ops for `ids`, except those another file still provides.
    fn removals(&self, path: &Path, ids: Vec<String>) -> Vec<UpdateOp> {
        ids.into_iter()
            .filter(|id| {
                let claimed_elsewhere = self
                    .produced
                    .iter()
                    .any(|entry| entry.key() != path && entry.value().contains(id));
                !claimed_elsewhere
            })
            .map(UpdateOp::remove)
            .collect()
    }
}

/// Cut `content` to `max` characters, marking the cut.
pub fn truncate_content(content: String, max: usize) -> String {
    match content.char_indices().nth(max) {
        Some((cut, _)) => {
            let mut truncated = content[..cut].to_string();
            truncated.push_str(TRUNCATION_MARKER);
            truncated
        }
        None => content,
    }
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.starts_with('.') || SKIPPED_DIRS.contains(&name) {
                continue;
            }
        }
        if path.is_dir() {
            collect_files(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}
