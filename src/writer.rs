use crate::{
    chunker::Chunk,
    error::{Error, Result},
    file::FileEntry,
};
use serde::Serialize;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, info};

pub(crate) const SUMMARY_FILE: &str = "summary.json";

/// Manifest of one run, written as `summary.json`.
#[derive(Debug, Serialize)]
pub(crate) struct WriteSummary {
    /// Total number of chunks written
    pub total_chunks: usize,

    /// Total number of files across all chunks
    pub total_files: usize,

    /// Total estimated tokens across all chunks
    pub total_tokens: usize,

    /// Configured token limit
    pub max_tokens: usize,

    /// Execution duration in seconds
    pub duration_secs: f64,

    /// Output directory path
    pub output_directory: String,

    /// Individual chunk summaries
    pub chunks: Vec<ChunkSummary>,

    /// Generation timestamp
    pub generated_at: String,
}

/// Summary of a single chunk.
#[derive(Debug, Serialize)]
pub(crate) struct ChunkSummary {
    /// Chunk index (1-based, as in the file name)
    pub index: usize,

    /// Output filename
    pub filename: String,

    /// Estimated tokens
    pub tokens: usize,

    /// Content bytes of the files in this chunk
    pub bytes: u64,

    /// True if the chunk is a single entry above the limit
    pub oversized: bool,

    /// Repository paths in this chunk, in order
    pub files: Vec<String>,
}

/// Writes chunk bodies to numbered files with atomic operations.
pub(crate) struct Writer {
    output_dir: PathBuf,
    output_pattern: String,
}

impl Writer {
    pub(crate) fn new(output_dir: impl Into<PathBuf>, output_pattern: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            output_pattern: output_pattern.into(),
        }
    }

    /// Writes every chunk to its own file, the preamble opening the first one.
    ///
    /// With no chunks and a preamble, a single preamble-only file is written
    /// so the repository structure is still delivered. Returns the written
    /// paths in chunk order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WriteFailure`] if the output directory cannot be
    /// created or a file cannot be written. The error carries the paths that
    /// were completed before the failure.
    pub(crate) fn write_chunks(
        &self,
        chunks: &[Chunk],
        preamble: Option<&str>,
    ) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.output_dir)
            .map_err(|e| Error::write_failure(&self.output_dir, &e, Vec::new()))?;

        info!("Writing {} chunks to {}", chunks.len(), self.output_dir.display());

        let mut written = Vec::with_capacity(chunks.len().max(1));

        if chunks.is_empty() {
            if let Some(preamble) = preamble {
                let path = self.output_path(0);
                self.write_file_atomic(&path, preamble, &written)?;
                debug!("Wrote preamble-only file {}", path.display());
                written.push(path);
            }
            return Ok(written);
        }

        for chunk in chunks {
            let path = self.output_path(chunk.index);
            let content = match preamble {
                Some(preamble) if chunk.index == 0 => format!("{preamble}{}", chunk.body),
                _ => chunk.body.clone(),
            };

            self.write_file_atomic(&path, &content, &written)?;

            debug!(
                "Wrote chunk {}/{} ({} files, {} tokens) to {}",
                chunk.index + 1,
                chunks.len(),
                chunk.file_count(),
                chunk.total_tokens,
                path.display()
            );
            written.push(path);
        }

        info!("Successfully wrote {} chunk files", written.len());
        Ok(written)
    }

    /// Output file path for a 0-based chunk index.
    pub(crate) fn output_path(&self, index: usize) -> PathBuf {
        let number = index + 1;
        let filename = self
            .output_pattern
            .replace("{index:03}", &format!("{number:03}"))
            .replace("{index:02}", &format!("{number:02}"))
            .replace("{index}", &number.to_string());

        self.output_dir.join(filename)
    }

    /// Glob matching every file name the output pattern can produce.
    pub(crate) fn file_name_glob(&self) -> String {
        let mut glob = String::new();
        let mut rest = self.output_pattern.as_str();

        while let Some(start) = rest.find("{index") {
            glob.push_str(&globset::escape(&rest[..start]));
            glob.push('*');
            rest = rest[start..]
                .find('}')
                .map_or("", |end| &rest[start + end + 1..]);
        }
        glob.push_str(&globset::escape(rest));

        glob
    }

    /// Writes content to a sibling temp file, syncs it, then renames it over
    /// the target.
    fn write_file_atomic(&self, path: &Path, content: &str, written: &[PathBuf]) -> Result<()> {
        let temp_path = path.with_extension("tmp");

        let result = (|| {
            let mut temp_file = fs::File::create(&temp_path)?;
            temp_file.write_all(content.as_bytes())?;
            temp_file.sync_all()?;
            drop(temp_file);
            fs::rename(&temp_path, path)
        })();

        result.map_err(|e| {
            // Cleanup failure is ignored; the write error is reported.
            let _ = fs::remove_file(&temp_path);
            Error::write_failure(path, &e, written.to_vec())
        })
    }

    /// Writes `summary.json` next to the chunk files.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the file write fails.
    pub(crate) fn write_summary(
        &self,
        chunks: &[Chunk],
        max_tokens: usize,
        duration: Duration,
    ) -> Result<PathBuf> {
        let summary = WriteSummary {
            total_chunks: chunks.len(),
            total_files: chunks.iter().map(Chunk::file_count).sum(),
            total_tokens: chunks.iter().map(|c| c.total_tokens).sum(),
            max_tokens,
            duration_secs: duration.as_secs_f64(),
            output_directory: self.output_dir.display().to_string(),
            chunks: chunks
                .iter()
                .map(|c| ChunkSummary {
                    index: c.index + 1,
                    filename: self
                        .output_path(c.index)
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    tokens: c.total_tokens,
                    bytes: c.entries.iter().map(FileEntry::size_bytes).sum(),
                    oversized: c.is_oversized(max_tokens),
                    files: c.entries.iter().map(|e| e.path().to_string()).collect(),
                })
                .collect(),
            generated_at: chrono::Local::now()
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
        };

        let json = serde_json::to_string_pretty(&summary)?;
        let summary_path = self.output_dir.join(SUMMARY_FILE);
        self.write_file_atomic(&summary_path, &json, &[])?;

        info!("Wrote summary to {}", summary_path.display());
        Ok(summary_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{template::TemplateEngine, token::TokenizerKind, Chunker};
    use assert_fs::prelude::*;

    fn make_chunks(max_tokens: usize, entries: Vec<FileEntry>) -> Vec<Chunk> {
        Chunker::new(max_tokens, TokenizerKind::Simple.create(), TemplateEngine::new().unwrap())
            .unwrap()
            .chunk(entries)
            .unwrap()
    }

    fn three_chunks() -> Vec<Chunk> {
        make_chunks(
            60,
            vec![
                FileEntry::new("a.py", "a".repeat(150)),
                FileEntry::new("b.py", "b".repeat(150)),
                FileEntry::new("c.py", "c".repeat(150)),
            ],
        )
    }

    #[test]
    fn test_writer_creates_output_directory() {
        let temp = assert_fs::TempDir::new().unwrap();
        let output_dir = temp.child("nested/output");

        let writer = Writer::new(output_dir.path(), "chunk_{index}.txt");
        writer
            .write_chunks(&make_chunks(100, vec![FileEntry::new("a.py", "x")]), None)
            .unwrap();

        assert!(output_dir.child("chunk_1.txt").exists());
    }

    #[test]
    fn test_writer_creates_numbered_files() {
        let temp = assert_fs::TempDir::new().unwrap();
        let chunks = three_chunks();
        assert_eq!(chunks.len(), 3);

        let writer = Writer::new(temp.path(), "chunk_{index}.txt");
        let written = writer.write_chunks(&chunks, None).unwrap();

        assert_eq!(
            written,
            vec![
                temp.path().join("chunk_1.txt"),
                temp.path().join("chunk_2.txt"),
                temp.path().join("chunk_3.txt"),
            ]
        );
        temp.child("chunk_2.txt")
            .assert(predicates::str::diff(chunks[1].body.clone()));
        temp.child("chunk_2.tmp").assert(predicates::path::missing());
    }

    #[test]
    fn test_preamble_opens_first_file_only() {
        let temp = assert_fs::TempDir::new().unwrap();
        let chunks = three_chunks();
        let preamble = "Repo Structure:\n\nrepo\n\n";

        let writer = Writer::new(temp.path(), "chunk_{index}.txt");
        writer.write_chunks(&chunks, Some(preamble)).unwrap();

        let first = fs::read_to_string(temp.child("chunk_1.txt").path()).unwrap();
        let second = fs::read_to_string(temp.child("chunk_2.txt").path()).unwrap();
        assert_eq!(first, format!("{preamble}{}", chunks[0].body));
        assert!(!second.contains("Repo Structure:"));
    }

    #[test]
    fn test_preamble_only_file_without_chunks() {
        let temp = assert_fs::TempDir::new().unwrap();

        let writer = Writer::new(temp.path(), "chunk_{index}.txt");
        let written = writer.write_chunks(&[], Some("Repo Structure:\n\nempty\n\n")).unwrap();

        assert_eq!(written.len(), 1);
        temp.child("chunk_1.txt").assert("Repo Structure:\n\nempty\n\n");
    }

    #[test]
    fn test_nothing_written_without_chunks_or_preamble() {
        let temp = assert_fs::TempDir::new().unwrap();

        let writer = Writer::new(temp.path(), "chunk_{index}.txt");

        assert!(writer.write_chunks(&[], None).unwrap().is_empty());
    }

    #[test]
    fn test_output_path_patterns() {
        let writer = Writer::new("out", "chunk_{index}.txt");
        assert_eq!(writer.output_path(0), PathBuf::from("out/chunk_1.txt"));
        assert_eq!(writer.output_path(9), PathBuf::from("out/chunk_10.txt"));

        let writer = Writer::new("out", "part_{index:03}.md");
        assert_eq!(writer.output_path(0), PathBuf::from("out/part_001.md"));

        let writer = Writer::new("out", "part_{index:02}.md");
        assert_eq!(writer.output_path(11), PathBuf::from("out/part_12.md"));
    }

    #[test]
    fn test_file_name_glob() {
        assert_eq!(Writer::new("out", "chunk_{index}.txt").file_name_glob(), "chunk_*.txt");
        assert_eq!(Writer::new("out", "part[{index:03}].md").file_name_glob(), "part[[]*[]].md");
    }

    #[test]
    fn test_output_directory_failure_writes_nothing() {
        let temp = assert_fs::TempDir::new().unwrap();
        let blocker = temp.child("output");
        blocker.write_str("a file, not a directory").unwrap();

        let writer = Writer::new(blocker.path(), "chunk_{index}.txt");
        let err = writer.write_chunks(&three_chunks(), None).unwrap_err();

        match err {
            Error::WriteFailure { written, .. } => assert!(written.is_empty()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_write_failure_lists_written_files() {
        let temp = assert_fs::TempDir::new().unwrap();
        // A directory in place of the second file makes its rename fail.
        temp.child("chunk_2.txt/occupied").write_str("").unwrap();

        let writer = Writer::new(temp.path(), "chunk_{index}.txt");
        let err = writer.write_chunks(&three_chunks(), None).unwrap_err();

        match err {
            Error::WriteFailure { path, written, .. } => {
                assert_eq!(path, temp.path().join("chunk_2.txt"));
                assert_eq!(written, vec![temp.path().join("chunk_1.txt")]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        temp.child("chunk_3.txt").assert(predicates::path::missing());
        temp.child("chunk_2.tmp").assert(predicates::path::missing());
    }

    #[test]
    fn test_writer_creates_summary() {
        let temp = assert_fs::TempDir::new().unwrap();
        let chunks = three_chunks();

        let writer = Writer::new(temp.path(), "chunk_{index}.txt");
        writer.write_chunks(&chunks, None).unwrap();
        let path = writer
            .write_summary(&chunks, 60, Duration::from_millis(1500))
            .unwrap();

        let summary: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(summary["total_chunks"], 3);
        assert_eq!(summary["total_files"], 3);
        assert_eq!(summary["max_tokens"], 60);
        assert_eq!(summary["chunks"][1]["filename"], "chunk_2.txt");
        assert_eq!(summary["chunks"][1]["files"][0], "b.py");
        assert_eq!(summary["chunks"][1]["bytes"], 150);
        assert!(summary["generated_at"].is_string());
    }
}
