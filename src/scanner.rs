use crate::{
    error::{Error, Result},
    file::{FileEntry, has_binary_extension, is_likely_binary},
    filter::PathFilter,
};
use ignore::{DirEntry, WalkBuilder};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, trace, warn};

/// Statistics collected during scanning.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    /// Files that passed the path filter
    pub total_files: usize,

    /// Text files read into entries
    pub text_files: usize,

    /// Binary files skipped
    pub binary_files: usize,

    /// Files and directories excluded by ignore rules
    pub ignored_paths: usize,

    /// Files that could not be read
    pub read_failures: usize,
}

/// Result of scanning a repository.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Readable text files in traversal order
    pub entries: Vec<FileEntry>,

    /// Non-fatal read failures, one per skipped file
    pub failures: Vec<Error>,

    /// Counters
    pub stats: ScanStats,
}

/// Walks a repository working tree and reads every included text file.
pub(crate) struct Scanner {
    root_dir: PathBuf,
    filter: PathFilter,
}

impl Scanner {
    pub(crate) const fn new(root_dir: PathBuf, filter: PathFilter) -> Self {
        Self { root_dir, filter }
    }

    /// Scans the root directory.
    ///
    /// Traversal is depth-first with siblings in file-name order, so the
    /// entry order is reproducible for identical trees. Unreadable files are
    /// recorded in [`ScanReport::failures`] and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory does not exist.
    pub(crate) fn scan(&self) -> Result<ScanReport> {
        if !self.root_dir.is_dir() {
            return Err(Error::io(
                &self.root_dir,
                std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
            ));
        }

        debug!("Starting scan of {}", self.root_dir.display());

        let ignored = Arc::new(AtomicUsize::new(0));
        let walker = {
            let filter = self.filter.clone();
            let root = self.root_dir.clone();
            let ignored = Arc::clone(&ignored);

            WalkBuilder::new(&self.root_dir)
                .standard_filters(false)
                .follow_links(false)
                .sort_by_file_name(|a, b| a.cmp(b))
                .filter_entry(move |entry| {
                    if entry.depth() == 0 {
                        return true;
                    }
                    let relative = relative_path(entry.path(), &root);
                    let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                    let decision = filter.decide(&relative, is_dir);
                    if !decision.is_included() {
                        trace!("Ignoring {} ({:?})", relative.display(), decision);
                        ignored.fetch_add(1, Ordering::Relaxed);
                    }
                    decision.is_included()
                })
                .build()
        };

        let mut report = ScanReport::default();

        for result in walker {
            match result {
                Ok(entry) if is_file_or_file_link(&entry) => {
                    report.stats.total_files += 1;
                    self.process_entry(&entry, &mut report);
                }
                Ok(entry) if entry.path_is_symlink() => {
                    debug!(
                        "Skipping symlink that is not a file: {}",
                        entry.path().display()
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Walk error: {}", e);
                    report.stats.read_failures += 1;
                }
            }
        }

        report.stats.ignored_paths = ignored.load(Ordering::Relaxed);

        debug!(
            "Scan complete: {} total, {} text, {} binary, {} ignored, {} unreadable",
            report.stats.total_files,
            report.stats.text_files,
            report.stats.binary_files,
            report.stats.ignored_paths,
            report.stats.read_failures
        );

        if !report.failures.is_empty() {
            warn!(
                "Skipped {} unreadable file(s) during scanning (non-fatal)",
                report.failures.len()
            );
        }

        Ok(report)
    }

    fn process_entry(&self, entry: &DirEntry, report: &mut ScanReport) {
        let path = entry.path();
        let relative = to_slash(&relative_path(path, &self.root_dir));

        trace!("Processing file: {}", relative);

        match Self::read_entry(path, relative) {
            Ok(Some(file)) => {
                report.stats.text_files += 1;
                report.entries.push(file);
            }
            Ok(None) => report.stats.binary_files += 1,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                report.stats.read_failures += 1;
                report.failures.push(e);
            }
        }
    }

    /// Reads a file as UTF-8 text, returning `None` for binary files.
    fn read_entry(path: &Path, relative: String) -> Result<Option<FileEntry>> {
        if has_binary_extension(path) {
            debug!("Skipping binary file (by extension): {}", relative);
            return Ok(None);
        }

        let is_binary =
            is_likely_binary(path).map_err(|e| Error::read_failure(path, e.to_string()))?;
        if is_binary {
            debug!("Skipping binary file (by content): {}", relative);
            return Ok(None);
        }

        let bytes = fs::read(path).map_err(|e| Error::read_failure(path, e.to_string()))?;
        let content = String::from_utf8(bytes)
            .map_err(|_| Error::read_failure(path, "invalid UTF-8 encoding"))?;

        Ok(Some(FileEntry::new(relative, content)))
    }
}

/// Regular files, plus symlinks that resolve to a regular file.
///
/// Directory links are not followed, so the walk cannot leave the tree or
/// loop.
fn is_file_or_file_link(entry: &DirEntry) -> bool {
    entry.file_type().is_some_and(|ft| {
        ft.is_file() || (ft.is_symlink() && entry.path().is_file())
    })
}

fn relative_path(path: &Path, root: &Path) -> PathBuf {
    pathdiff::diff_paths(path, root).unwrap_or_else(|| path.to_path_buf())
}

/// Joins path components with `/` regardless of platform.
pub(crate) fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
