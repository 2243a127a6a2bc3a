use anyhow::Context;
use clap::Parser;
use repo_chunker::{Config, Pipeline, TokenizerKind};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "repo-chunker",
    version,
    author,
    about = "Split a Git repository into token-bounded text files",
    long_about = "Split a Git repository into token-bounded text files for LLM context windows.\n\n\
    The repository may be a local path or a remote URL, which is cloned into a \
    temporary directory and removed afterwards. Files matched by .gitignore are \
    skipped and each file appears whole in exactly one output file.\n\n\
    USAGE EXAMPLES:\n  \
      # Chunk the current repository\n  \
      repo-chunker .\n\n  \
      # Chunk a remote repository into 100k-token files\n  \
      repo-chunker https://github.com/user/project --max-tokens 100000\n\n  \
      # Leave out documentation and skip the structure preamble\n  \
      repo-chunker ./project --exclude 'docs/**' --exclude '*.md' --no-tree"
)]
struct Cli {
    /// Local repository path or remote clone URL
    #[arg(value_name = "REPO")]
    repo: String,

    /// Output directory for chunk files
    #[arg(short, long, default_value = "output", value_name = "PATH")]
    output_dir: PathBuf,

    /// Output filename pattern ({index}, {index:02} or {index:03}, 1-based)
    #[arg(long, default_value = "chunk_{index}.txt")]
    pattern: String,

    /// Max estimated tokens per output file
    #[arg(short, long, default_value_t = 2_000_000)]
    max_tokens: usize,

    /// Tokenizer to use
    #[arg(long, value_enum, default_value = "simple")]
    tokenizer: CliTokenizer,

    /// Extra glob to exclude (can be used multiple times)
    #[arg(short, long, value_name = "GLOB")]
    exclude: Vec<String>,

    /// Do not prepend the repository structure to the first file
    #[arg(long)]
    no_tree: bool,

    /// Path to a custom Tera template for file sections
    ///
    /// The template receives `path`, `content` and `lines`, and may use the
    /// `detect_language` filter on `path`.
    #[arg(long, value_name = "FILE")]
    template: Option<PathBuf>,

    /// Write summary.json next to the chunk files
    #[arg(long)]
    summary: bool,

    /// Dry run (don't write files)
    #[arg(long)]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliTokenizer {
    Simple,
    Enhanced,
    Whitespace,
}

impl From<CliTokenizer> for TokenizerKind {
    fn from(t: CliTokenizer) -> Self {
        match t {
            CliTokenizer::Simple => Self::Simple,
            CliTokenizer::Enhanced => Self::Enhanced,
            CliTokenizer::Whitespace => Self::Whitespace,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose)?;

    let mut builder = Config::builder()
        .repo(cli.repo)
        .output_dir(cli.output_dir)
        .output_pattern(cli.pattern)
        .max_tokens(cli.max_tokens)
        .tokenizer(cli.tokenizer.into())
        .exclude_patterns(cli.exclude)
        .include_tree(!cli.no_tree)
        .write_summary(cli.summary)
        .dry_run(cli.dry_run);

    if let Some(template_path) = cli.template {
        builder = builder.template_path(template_path);
    }

    let config = builder.build().context("Failed to build configuration")?;

    let stats = Pipeline::new(config)
        .context("Failed to create pipeline")?
        .run()
        .context("Pipeline execution failed")?;

    stats.print_summary();

    Ok(())
}

fn setup_tracing(verbosity: u8) -> anyhow::Result<()> {
    let filter = match verbosity {
        0 => EnvFilter::new("repo_chunker=info"),
        1 => EnvFilter::new("repo_chunker=debug"),
        _ => EnvFilter::new("repo_chunker=trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}
