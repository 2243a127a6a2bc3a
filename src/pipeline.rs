use crate::{
    chunker::{Chunk, Chunker},
    config::Config,
    error::{Error, Result},
    filter::{PathFilter, literal_glob},
    repository::ResolvedRepository,
    scanner::{ScanStats, Scanner},
    template::TemplateEngine,
    token::TokenEstimator,
    tree::render_tree,
    writer::{SUMMARY_FILE, Writer},
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Wall-clock time spent in each stage.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StageTimings {
    /// Opening or cloning the repository
    pub resolve: Duration,

    /// Walking and reading files
    pub scan: Duration,

    /// Grouping entries into chunks
    pub chunk: Duration,

    /// Writing output files
    pub write: Duration,

    /// Whole run
    pub total: Duration,
}

/// Statistics collected during pipeline execution.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    /// Files that passed the path filter
    pub total_files: usize,

    /// Text files included in the output
    pub text_files: usize,

    /// Binary files skipped
    pub binary_files: usize,

    /// Paths excluded by ignore rules
    pub ignored_paths: usize,

    /// Files skipped because they could not be read
    pub read_failures: usize,

    /// Total number of chunks created
    pub total_chunks: usize,

    /// Chunks holding a single entry above the limit
    pub oversized_chunks: usize,

    /// Estimated tokens across all chunks, preamble included
    pub total_tokens: usize,

    /// Average tokens per chunk
    pub avg_tokens_per_chunk: usize,

    /// Largest chunk size in tokens
    pub max_chunk_tokens: usize,

    /// Smallest chunk size in tokens
    pub min_chunk_tokens: usize,

    /// Per-stage durations
    pub timings: StageTimings,

    /// Output directory path
    pub output_directory: String,

    /// Files written, in order
    pub output_files: Vec<PathBuf>,
}

impl PipelineStats {
    /// Creates statistics from pipeline execution data.
    #[must_use]
    pub fn new(
        scan: ScanStats,
        chunks: &[Chunk],
        max_tokens: usize,
        timings: StageTimings,
        output_directory: String,
        output_files: Vec<PathBuf>,
    ) -> Self {
        let total_chunks = chunks.len();
        let total_tokens: usize = chunks.iter().map(|c| c.total_tokens).sum();

        let avg_tokens_per_chunk = if total_chunks > 0 {
            total_tokens / total_chunks
        } else {
            0
        };

        Self {
            total_files: scan.total_files,
            text_files: scan.text_files,
            binary_files: scan.binary_files,
            ignored_paths: scan.ignored_paths,
            read_failures: scan.read_failures,
            total_chunks,
            oversized_chunks: chunks.iter().filter(|c| c.is_oversized(max_tokens)).count(),
            total_tokens,
            avg_tokens_per_chunk,
            max_chunk_tokens: chunks.iter().map(|c| c.total_tokens).max().unwrap_or(0),
            min_chunk_tokens: chunks.iter().map(|c| c.total_tokens).min().unwrap_or(0),
            timings,
            output_directory,
            output_files,
        }
    }

    /// Number of files written.
    #[must_use]
    pub fn files_written(&self) -> usize {
        self.output_files.len()
    }

    /// Returns the throughput in files per second.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn throughput_files_per_sec(&self) -> f64 {
        let secs = self.timings.total.as_secs_f64();
        if secs > 0.0 {
            self.text_files as f64 / secs
        } else {
            0.0
        }
    }

    /// Prints a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║               Repository Chunk Summary                ║");
        println!("╠═══════════════════════════════════════════════════════╣");
        println!("║ Files Scanned:        {:>8}                        ║", self.total_files);
        println!("║   - Text files:       {:>8}                        ║", self.text_files);
        println!("║   - Binary files:     {:>8}                        ║", self.binary_files);
        println!("║   - Unreadable:       {:>8}                        ║", self.read_failures);
        println!("║   - Ignored paths:    {:>8}                        ║", self.ignored_paths);
        println!("║                                                       ║");
        println!("║ Chunks Created:       {:>8}                        ║", self.total_chunks);
        println!("║   - Oversized:        {:>8}                        ║", self.oversized_chunks);
        println!("║ Total Tokens:         {:>8}                        ║", self.total_tokens);
        println!("║ Avg Tokens/Chunk:     {:>8}                        ║", self.avg_tokens_per_chunk);
        println!("║ Min Chunk Size:       {:>8} tokens                 ║", self.min_chunk_tokens);
        println!("║ Max Chunk Size:       {:>8} tokens                 ║", self.max_chunk_tokens);
        println!("║                                                       ║");
        println!("║ Files Written:        {:>8}                        ║", self.files_written());
        println!("║ Output Directory:                                     ║");
        println!("║   {}", self.output_directory);
        println!("║                                                       ║");
        println!("║ Timing Breakdown:                                     ║");
        println!(
            "║   - Resolving:        {:>8.2}s                     ║",
            self.timings.resolve.as_secs_f64()
        );
        println!(
            "║   - Scanning:         {:>8.2}s                     ║",
            self.timings.scan.as_secs_f64()
        );
        println!(
            "║   - Chunking:         {:>8.2}s                     ║",
            self.timings.chunk.as_secs_f64()
        );
        println!(
            "║   - Writing:          {:>8.2}s                     ║",
            self.timings.write.as_secs_f64()
        );
        println!(
            "║   - Total:            {:>8.2}s ({:.0} files/s)     ║",
            self.timings.total.as_secs_f64(),
            self.throughput_files_per_sec()
        );
        println!("╚═══════════════════════════════════════════════════════╝\n");
    }
}

/// Orchestrates resolve, scan, chunk and write for one repository.
pub struct Pipeline {
    config: Config,
    templates: TemplateEngine,
    tokenizer: Arc<dyn TokenEstimator>,
    writer: Writer,
}

impl Pipeline {
    /// Creates a new pipeline with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - The custom entry template cannot be loaded or rendered
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let templates = match config.template_path {
            Some(ref path) => TemplateEngine::with_entry_template(path)?,
            None => TemplateEngine::new()?,
        };
        let tokenizer = config.tokenizer.create();
        let writer = Writer::new(&config.output_dir, &config.output_pattern);

        Ok(Self {
            config,
            templates,
            tokenizer,
            writer,
        })
    }

    /// Executes the complete pipeline and returns statistics.
    ///
    /// # Process
    ///
    /// 1. **Resolve**: opens the local repository or clones the remote one
    /// 2. **Scan**: reads every non-ignored text file in traversal order
    /// 3. **Chunk**: groups entries under the token limit, preamble first
    /// 4. **Write**: persists one file per chunk
    ///
    /// A temporary clone is removed when this returns, on success or error.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be resolved or output
    /// cannot be written. Unreadable source files are skipped, not fatal.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use repo_chunker::{Config, Pipeline};
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let config = Config::builder()
    ///     .repo("https://github.com/user/project")
    ///     .max_tokens(100_000)
    ///     .build()?;
    ///
    /// let stats = Pipeline::new(config)?.run()?;
    /// stats.print_summary();
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self), fields(repo = %self.config.repo, max_tokens = self.config.max_tokens))]
    pub fn run(self) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let mut timings = StageTimings::default();

        info!("Stage 1/4: Resolving repository...");
        let stage = Instant::now();
        let repository = ResolvedRepository::open(&self.config.repo)?;
        timings.resolve = stage.elapsed();
        info!(
            "✓ Using working tree at {}{}",
            repository.workdir().display(),
            if repository.is_temporary() { " (temporary clone)" } else { "" }
        );

        let filter = self.build_filter(repository.workdir())?;

        info!("Stage 2/4: Scanning repository...");
        let stage = Instant::now();
        let report = Scanner::new(repository.workdir().to_path_buf(), filter.clone()).scan()?;
        timings.scan = stage.elapsed();
        info!(
            "✓ Scanned {} files ({} text, {} binary, {} unreadable) in {:.2}s",
            report.stats.total_files,
            report.stats.text_files,
            report.stats.binary_files,
            report.stats.read_failures,
            timings.scan.as_secs_f64()
        );

        let preamble = if self.config.include_tree {
            let tree = render_tree(repository.workdir(), &filter);
            let reserve = self.tokenizer.estimate(&tree);
            debug!("Repository structure reserves {} tokens in the first chunk", reserve);
            Some((self.templates.render_preamble(&tree)?, reserve))
        } else {
            None
        };

        info!("Stage 3/4: Chunking...");
        let stage = Instant::now();
        let chunker = Chunker::new(
            self.config.max_tokens,
            Arc::clone(&self.tokenizer),
            self.templates.clone(),
        )?
        .with_first_chunk_reserve(preamble.as_ref().map_or(0, |(_, reserve)| *reserve));
        let chunks = chunker.chunk(report.entries)?;
        timings.chunk = stage.elapsed();
        info!(
            "✓ Created {} chunks (limit {} tokens) in {:.2}s",
            chunks.len(),
            chunker.max_tokens(),
            timings.chunk.as_secs_f64()
        );

        self.log_chunk_distribution(&chunks);

        let stage = Instant::now();
        let output_files = if self.config.dry_run {
            warn!("Dry run mode enabled - skipping file writes");
            self.log_dry_run(&chunks);
            Vec::new()
        } else {
            info!("Stage 4/4: Writing output files...");
            let mut written = self
                .writer
                .write_chunks(&chunks, preamble.as_ref().map(|(text, _)| text.as_str()))?;
            if self.config.write_summary {
                written.push(self.writer.write_summary(
                    &chunks,
                    self.config.max_tokens,
                    start_time.elapsed(),
                )?);
            }
            written
        };
        timings.write = stage.elapsed();

        timings.total = start_time.elapsed();

        let stats = PipelineStats::new(
            report.stats,
            &chunks,
            self.config.max_tokens,
            timings,
            self.config.output_dir.display().to_string(),
            output_files,
        );

        info!(
            "✓ Pipeline completed successfully in {:.2}s",
            timings.total.as_secs_f64()
        );

        Ok(stats)
    }

    /// Builds the path filter, excluding earlier output when the output
    /// directory lives inside the working tree.
    fn build_filter(&self, workdir: &Path) -> Result<PathFilter> {
        let mut excludes = self.config.exclude_patterns.clone();

        match output_dir_within(workdir, &self.config.output_dir) {
            Some(relative) if relative.as_os_str().is_empty() => {
                // Output goes to the repository root: exclude the files, not the root.
                let glob = self.writer.file_name_glob();
                debug!("Excluding output files matching {}", glob);
                excludes.push(glob);
                if self.config.write_summary {
                    excludes.push(literal_glob(Path::new(SUMMARY_FILE)));
                }
            }
            Some(relative) => {
                debug!("Excluding output directory {}", relative.display());
                excludes.push(literal_glob(&relative));
            }
            None => {}
        }

        PathFilter::new(workdir, &excludes)
    }

    /// Logs information about chunk distribution.
    fn log_chunk_distribution(&self, chunks: &[Chunk]) {
        if chunks.is_empty() {
            return;
        }

        let total_tokens: usize = chunks.iter().map(|c| c.total_tokens).sum();
        let max_tokens = chunks.iter().map(|c| c.total_tokens).max().unwrap_or(0);
        let min_tokens = chunks.iter().map(|c| c.total_tokens).min().unwrap_or(0);

        info!(
            "  Chunk stats: avg={}, min={}, max={} tokens",
            total_tokens / chunks.len(),
            min_tokens,
            max_tokens
        );

        let oversized = chunks
            .iter()
            .filter(|c| c.is_oversized(self.config.max_tokens))
            .count();

        if oversized > 0 {
            warn!(
                "  {} chunk(s) hold a single file above the {} token limit",
                oversized, self.config.max_tokens
            );
        }
    }

    /// Logs the files a real run would produce.
    fn log_dry_run(&self, chunks: &[Chunk]) {
        for chunk in chunks {
            info!(
                "  Would write {} ({} files, {} tokens)",
                self.writer.output_path(chunk.index).display(),
                chunk.file_count(),
                chunk.total_tokens
            );
        }
    }
}

/// Output directory relative to the working tree, if it lies inside.
///
/// Returns an empty path when the output directory is the working tree.
fn output_dir_within(workdir: &Path, output_dir: &Path) -> Option<PathBuf> {
    let workdir = workdir.canonicalize().ok()?;
    let output = absolute(output_dir).ok()?;

    output
        .strip_prefix(&workdir)
        .ok()
        .map(Path::to_path_buf)
}

/// Canonicalizes the longest existing ancestor and appends the rest, since
/// the output directory usually does not exist yet.
fn absolute(path: &Path) -> Result<PathBuf> {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| Error::io(path, e))?
            .join(path)
    };

    let mut existing = path.as_path();
    let mut rest = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                existing = parent;
            }
            _ => break,
        }
    }

    let mut resolved = existing
        .canonicalize()
        .map_err(|e| Error::io(existing, e))?;
    resolved.extend(rest.iter().rev());
    Ok(resolved)
}
