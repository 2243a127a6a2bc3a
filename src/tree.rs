use crate::filter::PathFilter;
use std::path::Path;
use tracing::warn;
use walkdir::WalkDir;

const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const PIPE_INDENT: &str = "│   ";
const SPACE_INDENT: &str = "    ";

/// Renders the repository layout as a text tree.
///
/// The first line is the root directory name. Siblings are sorted by name
/// and ignored paths are left out along with everything beneath them.
#[must_use]
pub fn render_tree(root: &Path, filter: &PathFilter) -> String {
    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .or_else(|| {
            root.canonicalize()
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        })
        .unwrap_or_else(|| root.display().to_string());

    let mut lines = vec![name];
    walk(root, root, "", filter, &mut lines);
    lines.join("\n")
}

fn walk(root: &Path, dir: &Path, prefix: &str, filter: &PathFilter, lines: &mut Vec<String>) {
    let children: Vec<_> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Failed to list {}: {}", dir.display(), e);
                None
            }
        })
        .filter(|entry| {
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            filter
                .decide(relative, entry.file_type().is_dir())
                .is_included()
        })
        .collect();

    for (i, entry) in children.iter().enumerate() {
        let is_last = i + 1 == children.len();
        let connector = if is_last { LAST_BRANCH } else { BRANCH };
        lines.push(format!(
            "{prefix}{connector}{}",
            entry.file_name().to_string_lossy()
        ));

        if entry.file_type().is_dir() {
            let indent = if is_last { SPACE_INDENT } else { PIPE_INDENT };
            walk(root, entry.path(), &format!("{prefix}{indent}"), filter, lines);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn test_render_tree_structure() {
        let temp = assert_fs::TempDir::new().unwrap();
        let repo = temp.child("repo");
        repo.child("file1.txt").write_str("Content of file1").unwrap();
        repo.child("dir1/file2.txt").write_str("Content of file2").unwrap();
        repo.child("dir1/file3.log").write_str("Content of file3").unwrap();
        repo.child("dir2/file4.txt").write_str("Content of file4").unwrap();
        repo.child(".gitignore").write_str("*.log\ndir2/\n").unwrap();

        let filter = PathFilter::new(repo.path(), &[]).unwrap();
        let tree = render_tree(repo.path(), &filter);

        assert_eq!(tree, "repo\n├── dir1\n│   └── file2.txt\n└── file1.txt");
    }

    #[test]
    fn test_render_tree_nested_last_branch() {
        let temp = assert_fs::TempDir::new().unwrap();
        let repo = temp.child("project");
        repo.child("a.py").write_str("x").unwrap();
        repo.child("subdir/inner/b.py").write_str("y").unwrap();
        repo.child("subdir/c.py").write_str("z").unwrap();

        let filter = PathFilter::new(repo.path(), &[]).unwrap();
        let tree = render_tree(repo.path(), &filter);

        let expected = "project\n\
                        ├── a.py\n\
                        └── subdir\n    \
                        ├── c.py\n    \
                        └── inner\n        \
                        └── b.py";
        assert_eq!(tree, expected);
    }

    #[test]
    fn test_render_tree_hides_git_directory() {
        let temp = assert_fs::TempDir::new().unwrap();
        let repo = temp.child("repo");
        repo.child(".git/HEAD").write_str("ref: refs/heads/main").unwrap();
        repo.child("main.rs").write_str("fn main() {}").unwrap();

        let filter = PathFilter::new(repo.path(), &[]).unwrap();

        assert_eq!(render_tree(repo.path(), &filter), "repo\n└── main.rs");
    }

    #[test]
    fn test_render_tree_empty_repository() {
        let temp = assert_fs::TempDir::new().unwrap();
        let repo = temp.child("empty");
        repo.create_dir_all().unwrap();

        let filter = PathFilter::new(repo.path(), &[]).unwrap();

        assert_eq!(render_tree(repo.path(), &filter), "empty");
    }
}
