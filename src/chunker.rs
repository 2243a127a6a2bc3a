use crate::{
    error::{Error, Result},
    file::FileEntry,
    template::TemplateEngine,
    token::{TokenEstimator, TokenizerKind},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// A contiguous, order-preserving group of entries that fits the token budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Sequential chunk index (0-based)
    pub index: usize,

    /// Entries in this chunk, in input order. Empty only for a first chunk
    /// that holds nothing but its reserve.
    pub entries: Vec<FileEntry>,

    /// Estimated tokens of all rendered sections, plus any reserve
    pub total_tokens: usize,

    /// Rendered sections of `entries`, concatenated
    #[serde(skip)]
    pub body: String,
}

impl Chunk {
    /// Returns the number of entries in this chunk.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if this chunk holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if this is a single entry larger than `max_tokens`.
    #[must_use]
    pub fn is_oversized(&self, max_tokens: usize) -> bool {
        self.entries.len() == 1 && self.total_tokens > max_tokens
    }

    /// Returns the utilization ratio (1.0 means exactly at the limit).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn utilization(&self, max_tokens: usize) -> f64 {
        if max_tokens == 0 {
            return 0.0;
        }
        self.total_tokens as f64 / max_tokens as f64
    }
}

/// Groups file entries into chunks that respect a token limit.
///
/// Each entry is sized by rendering its section (path header plus content)
/// and estimating the tokens of that text. An entry that alone exceeds the
/// limit is emitted as its own oversized chunk; file content is never split.
pub struct Chunker {
    max_tokens: usize,
    first_chunk_reserve: usize,
    tokenizer: Arc<dyn TokenEstimator>,
    templates: TemplateEngine,
}

impl Chunker {
    /// Creates a chunker.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLimit`] if `max_tokens` is zero.
    pub fn new(
        max_tokens: usize,
        tokenizer: Arc<dyn TokenEstimator>,
        templates: TemplateEngine,
    ) -> Result<Self> {
        if max_tokens < 1 {
            return Err(Error::InvalidLimit { limit: max_tokens });
        }

        Ok(Self {
            max_tokens,
            first_chunk_reserve: 0,
            tokenizer,
            templates,
        })
    }

    /// Counts `tokens` as already used in the first chunk.
    ///
    /// Used for the repository-structure preamble that opens the first
    /// output file. If the first entry does not fit next to the reserve,
    /// chunk 0 is emitted with no entries (the preamble alone) and the entry
    /// starts chunk 1.
    #[must_use]
    pub fn with_first_chunk_reserve(mut self, tokens: usize) -> Self {
        self.first_chunk_reserve = tokens;
        self
    }

    /// The configured token limit.
    #[must_use]
    pub const fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Estimated tokens of an entry's rendered section.
    ///
    /// # Errors
    ///
    /// Returns an error if the section template fails to render.
    pub fn section_tokens(&self, entry: &FileEntry) -> Result<usize> {
        let section = self.templates.render_entry(entry)?;
        Ok(self.tokenizer.estimate(&section))
    }

    /// Splits entries into chunks, preserving their order.
    ///
    /// Concatenating the entries of the returned chunks yields `entries`
    /// exactly. Every chunk with more than one entry stays within the limit.
    ///
    /// # Errors
    ///
    /// Returns an error if a section template fails to render.
    pub fn chunk(&self, entries: Vec<FileEntry>) -> Result<Vec<Chunk>> {
        let mut chunks = Vec::new();
        let mut builder = ChunkBuilder::new(0, self.first_chunk_reserve);

        for entry in entries {
            let section = self.templates.render_entry(&entry)?;
            let tokens = self.tokenizer.estimate(&section);

            if builder.has_content() && !builder.can_fit(tokens, self.max_tokens) {
                Self::seal(&mut builder, &mut chunks);
            }

            let oversized = tokens > self.max_tokens;
            if oversized {
                warn!(
                    "File '{}' has {} tokens (exceeds limit of {}), emitting it as its own chunk",
                    entry.path(),
                    tokens,
                    self.max_tokens
                );
            }

            builder.add(entry, &section, tokens);

            if oversized {
                Self::seal(&mut builder, &mut chunks);
            }
        }

        // A reserve with nothing after it is left to the caller.
        if !builder.is_empty() {
            Self::seal(&mut builder, &mut chunks);
        }

        self.log_results(&chunks);

        Ok(chunks)
    }

    /// Pushes the running chunk and starts an empty one.
    fn seal(builder: &mut ChunkBuilder, chunks: &mut Vec<Chunk>) {
        if !builder.has_content() {
            return;
        }

        let next = ChunkBuilder::new(chunks.len() + 1, 0);
        let finished = std::mem::replace(builder, next);
        chunks.push(finished.build());
    }

    fn log_results(&self, chunks: &[Chunk]) {
        if chunks.is_empty() {
            return;
        }

        let total_files: usize = chunks.iter().map(Chunk::file_count).sum();
        #[allow(clippy::cast_precision_loss)]
        let avg_utilization = chunks
            .iter()
            .map(|c| c.utilization(self.max_tokens))
            .sum::<f64>()
            / chunks.len() as f64;

        debug!(
            "Created {} chunks from {} files (avg utilization: {:.1}%)",
            chunks.len(),
            total_files,
            avg_utilization * 100.0
        );
    }
}

/// Chunks entries with the default tokenizer and section format.
///
/// # Errors
///
/// Returns [`Error::InvalidLimit`] if `max_tokens` is zero.
///
/// # Examples
///
/// ```
/// use repo_chunker::{chunk, FileEntry};
///
/// let entries = vec![
///     FileEntry::new("a.py", "x".repeat(10)),
///     FileEntry::new("b.py", "y".repeat(10)),
/// ];
/// let chunks = chunk(entries, 1_000).unwrap();
/// assert_eq!(chunks.len(), 1);
/// assert_eq!(chunks[0].file_count(), 2);
/// ```
pub fn chunk(entries: Vec<FileEntry>, max_tokens: usize) -> Result<Vec<Chunk>> {
    Chunker::new(max_tokens, TokenizerKind::default().create(), TemplateEngine::new()?)?
        .chunk(entries)
}

/// Running chunk: accumulates entries until sealed.
struct ChunkBuilder {
    index: usize,
    entries: Vec<FileEntry>,
    body: String,
    reserved_tokens: usize,
    current_tokens: usize,
}

impl ChunkBuilder {
    const fn new(index: usize, reserved_tokens: usize) -> Self {
        Self {
            index,
            entries: Vec::new(),
            body: String::new(),
            reserved_tokens,
            current_tokens: reserved_tokens,
        }
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True once the chunk holds an entry or a reserve.
    fn has_content(&self) -> bool {
        !self.entries.is_empty() || self.reserved_tokens > 0
    }

    const fn can_fit(&self, tokens: usize, max_tokens: usize) -> bool {
        self.current_tokens.saturating_add(tokens) <= max_tokens
    }

    fn add(&mut self, entry: FileEntry, section: &str, tokens: usize) {
        self.current_tokens = self.current_tokens.saturating_add(tokens);
        self.body.push_str(section);
        self.entries.push(entry);
    }

    fn build(self) -> Chunk {
        Chunk {
            index: self.index,
            entries: self.entries,
            total_tokens: self.current_tokens,
            body: self.body,
        }
    }
}
