use crate::error::{Error, Result};
use git2::Repository;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// Where the repository comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoSource {
    /// A path that exists on disk.
    Local(PathBuf),
    /// Anything else, treated as a clone URL.
    Remote(String),
}

impl RepoSource {
    /// Classifies user input: existing paths are local, everything else remote.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let path = Path::new(input);
        if path.exists() {
            Self::Local(path.to_path_buf())
        } else {
            Self::Remote(input.to_string())
        }
    }
}

/// A repository with a working tree on disk.
///
/// Remote repositories are cloned into a temporary directory owned by this
/// value; the clone is deleted when it is dropped.
#[derive(Debug)]
pub struct ResolvedRepository {
    workdir: PathBuf,
    clone_dir: Option<TempDir>,
}

impl ResolvedRepository {
    /// Opens a local repository or clones a remote one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRepository`] if a local path is not a Git
    /// repository with a working tree, or if cloning fails.
    pub fn open(input: &str) -> Result<Self> {
        match RepoSource::parse(input) {
            RepoSource::Local(path) => Self::open_local(input, &path),
            RepoSource::Remote(url) => Self::clone_remote(&url),
        }
    }

    fn open_local(input: &str, path: &Path) -> Result<Self> {
        let repo =
            Repository::open(path).map_err(|e| Error::invalid_repository(input, e.message()))?;

        let workdir = repo
            .workdir()
            .ok_or_else(|| {
                Error::invalid_repository(input, "The repository has no valid working directory")
            })?
            .to_path_buf();

        debug!("Opened local repository at {}", workdir.display());

        Ok(Self {
            workdir,
            clone_dir: None,
        })
    }

    fn clone_remote(url: &str) -> Result<Self> {
        let temp = tempfile::Builder::new()
            .prefix("repo-chunker-")
            .tempdir()
            .map_err(|e| Error::io(std::env::temp_dir(), e))?;
        let target = temp.path().join(repo_name_from_url(url));

        info!("Cloning {} into {}", url, target.display());

        let repo = Repository::clone(url, &target)
            .map_err(|e| Error::invalid_repository(url, e.message()))?;

        let workdir = repo
            .workdir()
            .ok_or_else(|| {
                Error::invalid_repository(url, "The repository has no valid working directory")
            })?
            .to_path_buf();

        Ok(Self {
            workdir,
            clone_dir: Some(temp),
        })
    }

    /// Root of the working tree.
    #[must_use]
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Returns true if the working tree is a temporary clone.
    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        self.clone_dir.is_some()
    }
}

/// Last path segment of a clone URL without a `.git` suffix.
fn repo_name_from_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    let last = trimmed
        .rsplit(['/', ':'])
        .next()
        .unwrap_or(trimmed);
    let name = last.strip_suffix(".git").unwrap_or(last);

    if name.is_empty() {
        "repository".to_string()
    } else {
        name.to_string()
    }
}
