use crate::error::{Error, Result};
use crate::token::TokenizerKind;
use std::path::PathBuf;

const DEFAULT_MAX_TOKENS: usize = 2_000_000;
const DEFAULT_OUTPUT_DIR: &str = "output";
const DEFAULT_OUTPUT_PATTERN: &str = "chunk_{index}.txt";

/// Configuration for the repo-chunker pipeline.
///
/// Use [`Config::builder()`] to construct a new configuration.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// Local repository path or remote clone URL
    pub repo: String,

    /// Output directory for chunk files
    pub output_dir: PathBuf,

    /// Output filename pattern (supports {index}, {index:02}, {index:03})
    pub output_pattern: String,

    /// Maximum estimated tokens per output file
    pub max_tokens: usize,

    /// Tokenizer implementation to use
    pub tokenizer: TokenizerKind,

    /// Extra glob patterns to exclude, on top of ignore files
    pub exclude_patterns: Vec<String>,

    /// Prepend the repository structure to the first output file
    pub include_tree: bool,

    /// External Tera template for file sections
    pub template_path: Option<PathBuf>,

    /// Write `summary.json` next to the chunk files
    pub write_summary: bool,

    /// Dry run mode (no file writes)
    pub dry_run: bool,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use repo_chunker::Config;
    ///
    /// let config = Config::builder()
    ///     .repo("https://github.com/user/project")
    ///     .max_tokens(50_000)
    ///     .build()
    ///     .expect("valid configuration");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `max_tokens` is zero ([`Error::InvalidLimit`])
    /// - The repository input is empty
    /// - The output pattern is invalid
    /// - The template path is not a file
    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 {
            return Err(Error::InvalidLimit {
                limit: self.max_tokens,
            });
        }

        if self.repo.trim().is_empty() {
            return Err(Error::config("Repository path or URL must not be empty"));
        }

        if !self.output_pattern.contains("{index") {
            return Err(Error::invalid_pattern(
                &self.output_pattern,
                "Pattern must contain {index} or {index:03} placeholder",
            ));
        }

        if self.output_pattern.contains('/') || self.output_pattern.contains('\\') {
            return Err(Error::invalid_pattern(
                &self.output_pattern,
                "Pattern must be a file name, not a path",
            ));
        }

        if let Some(ref template_path) = self.template_path {
            if !template_path.is_file() {
                return Err(Error::config(format!(
                    "Template file does not exist: {}",
                    template_path.display()
                )));
            }
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repo: ".".to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            output_pattern: DEFAULT_OUTPUT_PATTERN.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            tokenizer: TokenizerKind::default(),
            exclude_patterns: Vec::new(),
            include_tree: true,
            template_path: None,
            write_summary: false,
            dry_run: false,
        }
    }
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    repo: Option<String>,
    output_dir: Option<PathBuf>,
    output_pattern: Option<String>,
    max_tokens: Option<usize>,
    tokenizer: Option<TokenizerKind>,
    exclude_patterns: Vec<String>,
    include_tree: Option<bool>,
    template_path: Option<PathBuf>,
    write_summary: bool,
    dry_run: bool,
}

impl ConfigBuilder {
    /// Sets the repository: a local path or a remote URL.
    #[must_use]
    pub fn repo(mut self, repo: impl Into<String>) -> Self {
        self.repo = Some(repo.into());
        self
    }

    /// Sets the output directory for chunk files.
    #[must_use]
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Sets the output filename pattern.
    ///
    /// Pattern must contain an `{index}` placeholder; indices are 1-based.
    #[must_use]
    pub fn output_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.output_pattern = Some(pattern.into());
        self
    }

    /// Sets the maximum tokens per output file.
    #[must_use]
    pub fn max_tokens(mut self, tokens: usize) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    /// Sets the tokenizer implementation.
    #[must_use]
    pub fn tokenizer(mut self, kind: TokenizerKind) -> Self {
        self.tokenizer = Some(kind);
        self
    }

    /// Adds glob patterns to exclude from the output.
    #[must_use]
    pub fn exclude_patterns(mut self, patterns: Vec<String>) -> Self {
        self.exclude_patterns.extend(patterns);
        self
    }

    /// Enables or disables the repository-structure preamble.
    #[must_use]
    pub fn include_tree(mut self, enabled: bool) -> Self {
        self.include_tree = Some(enabled);
        self
    }

    /// Sets an external Tera template for file sections.
    ///
    /// The template receives `path`, `content` and `lines`.
    #[must_use]
    pub fn template_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_path = Some(path.into());
        self
    }

    /// Enables or disables writing `summary.json`.
    #[must_use]
    pub fn write_summary(mut self, enabled: bool) -> Self {
        self.write_summary = enabled;
        self
    }

    /// Enables dry run mode (no file writes).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<Config> {
        let config = Config {
            repo: self.repo.unwrap_or_else(|| ".".to_string()),
            output_dir: self
                .output_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            output_pattern: self
                .output_pattern
                .unwrap_or_else(|| DEFAULT_OUTPUT_PATTERN.to_string()),
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            tokenizer: self.tokenizer.unwrap_or_default(),
            exclude_patterns: self.exclude_patterns,
            include_tree: self.include_tree.unwrap_or(true),
            template_path: self.template_path,
            write_summary: self.write_summary,
            dry_run: self.dry_run,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn test_default_config() {
        let config = Config::builder().build().unwrap();

        assert_eq!(config.repo, ".");
        assert_eq!(config.max_tokens, 2_000_000);
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert_eq!(config.output_pattern, "chunk_{index}.txt");
        assert_eq!(config.tokenizer, TokenizerKind::Simple);
        assert!(config.include_tree);
        assert!(!config.write_summary);
    }

    #[test]
    fn test_zero_max_tokens_is_invalid_limit() {
        let result = Config::builder().max_tokens(0).build();

        assert!(result.unwrap_err().is_invalid_limit());
    }

    #[test]
    fn test_empty_repo_rejected() {
        let result = Config::builder().repo("  ").build();

        assert!(result.unwrap_err().is_config());
    }

    #[test]
    fn test_invalid_pattern() {
        let result = Config::builder().output_pattern("chunk.txt").build();
        assert!(matches!(result, Err(Error::InvalidPattern { .. })));

        let result = Config::builder().output_pattern("nested/chunk_{index}.txt").build();
        assert!(matches!(result, Err(Error::InvalidPattern { .. })));
    }

    #[test]
    fn test_missing_template_rejected() {
        let result = Config::builder().template_path("/nonexistent/entry.tera").build();

        assert!(result.unwrap_err().is_config());
    }

    #[test]
    fn test_builder_collects_excludes() {
        let temp = assert_fs::TempDir::new().unwrap();
        let template = temp.child("entry.tera");
        template.write_str("{{ path }}").unwrap();

        let config = Config::builder()
            .exclude_patterns(vec!["*.md".to_string()])
            .exclude_patterns(vec!["docs/**".to_string()])
            .template_path(template.path())
            .include_tree(false)
            .build()
            .unwrap();

        assert_eq!(config.exclude_patterns, vec!["*.md", "docs/**"]);
        assert!(!config.include_tree);
        assert_eq!(config.template_path.as_deref(), Some(template.path()));
    }
}
