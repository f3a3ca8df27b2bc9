use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub scanned_files: usize,
    pub skipped_hidden: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Collected {
    pub files: Vec<PathBuf>,
    pub missing: Vec<PathBuf>,
    /// Entries the walk could not read, with the error message.
    pub unreadable: Vec<(PathBuf, String)>,
    pub stats: ScanStats,
}

/// Walks every input in order. Inside a folder, files come before subfolders and
/// both are sorted by name. A file reached twice, under any spelling, is only
/// yielded once. Entries that cannot be read are recorded and the walk goes on.
pub fn collect_files(
    inputs: &[PathBuf],
    recursive: bool,
    include_hidden: bool,
) -> Result<Collected> {
    let mut out = Collected::default();
    let mut seen = HashSet::<PathBuf>::new();

    for input in inputs {
        if !input.exists() {
            warn!(path = %input.display(), "input path does not exist");
            out.missing.push(input.clone());
            continue;
        }

        if input.is_file() {
            out.stats.scanned_files += 1;
            if seen.insert(identity(input)) {
                out.files.push(input.clone());
            }
            continue;
        }

        debug!(path = %input.display(), recursive, "scanning folder");
        let max_depth = if recursive { usize::MAX } else { 1 };
        let walker = WalkDir::new(input)
            .max_depth(max_depth)
            .sort_by(files_before_folders)
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || include_hidden
                    || !(entry.file_type().is_dir() && is_hidden(entry.path()))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().unwrap_or(input).to_path_buf();
                    warn!(path = %path.display(), error = %err, "skipping unreadable entry");
                    out.unreadable.push((path, err.to_string()));
                    continue;
                }
            };
            if entry.file_type().is_dir() {
                continue;
            }
            out.stats.scanned_files += 1;

            if !include_hidden && is_hidden(entry.path()) {
                out.stats.skipped_hidden += 1;
                continue;
            }

            let path = entry.into_path();
            if seen.insert(identity(&path)) {
                out.files.push(path);
            }
        }
    }

    Ok(out)
}

fn identity(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn files_before_folders(a: &DirEntry, b: &DirEntry) -> Ordering {
    a.file_type()
        .is_dir()
        .cmp(&b.file_type().is_dir())
        .then_with(|| a.file_name().cmp(b.file_name()))
}

pub(crate) fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}
