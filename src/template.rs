use crate::{
    error::{Error, Result},
    file::FileEntry,
};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tera::{Context, Tera, Value};

const ENTRY_TEMPLATE: &str = "entry";
const PREAMBLE_TEMPLATE: &str = "preamble";

/// Maximum size of an external entry template (1MB).
const MAX_TEMPLATE_SIZE: u64 = 1024 * 1024;

#[derive(Serialize)]
struct EntryView<'a> {
    path: &'a str,
    content: &'a str,
    lines: usize,
}

#[derive(Serialize)]
struct PreambleView<'a> {
    tree: &'a str,
}

/// Renders file sections and the repository-structure preamble.
///
/// The rendered section of an entry is exactly the text whose tokens the
/// chunker counts, so the same engine must be used for sizing and output.
#[derive(Debug, Clone)]
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// Creates an engine with the built-in templates.
    ///
    /// # Errors
    ///
    /// Returns an error if a built-in template fails to compile.
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();

        tera.add_raw_template(ENTRY_TEMPLATE, include_str!("../templates/entry.tera"))
            .map_err(|e| Error::template(ENTRY_TEMPLATE, &e))?;
        tera.add_raw_template(PREAMBLE_TEMPLATE, include_str!("../templates/preamble.tera"))
            .map_err(|e| Error::template(PREAMBLE_TEMPLATE, &e))?;

        tera.register_filter("detect_language", detect_language_filter);

        Ok(Self { tera })
    }

    /// Creates an engine whose entry section comes from an external Tera file.
    ///
    /// The template sees `path`, `content` and `lines`, and is rendered once
    /// against a sample entry so missing variables fail here rather than
    /// halfway through a run.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, too large, or does not render.
    pub fn with_entry_template(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path).map_err(|e| Error::io(path, e))?;
        if !metadata.is_file() {
            return Err(Error::config(format!(
                "Template path is not a file: {}",
                path.display()
            )));
        }
        if metadata.len() > MAX_TEMPLATE_SIZE {
            return Err(Error::config(format!(
                "Template file is too large ({} bytes, limit {} bytes): {}",
                metadata.len(),
                MAX_TEMPLATE_SIZE,
                path.display()
            )));
        }

        let source = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;

        let mut engine = Self::new()?;
        engine
            .tera
            .add_raw_template(ENTRY_TEMPLATE, &source)
            .map_err(|e| Error::template(path.display().to_string(), &e))?;

        engine.render_entry(&FileEntry::new("src/sample.rs", "fn sample() {}"))?;

        Ok(engine)
    }

    /// Renders the section for one file: a path header followed by its content.
    ///
    /// # Errors
    ///
    /// Returns an error if template rendering fails.
    pub fn render_entry(&self, entry: &FileEntry) -> Result<String> {
        let view = EntryView {
            path: entry.path(),
            content: entry.content(),
            lines: entry.line_count(),
        };

        self.render(ENTRY_TEMPLATE, &view)
    }

    /// Renders the repository-structure block that opens the first output file.
    ///
    /// # Errors
    ///
    /// Returns an error if template rendering fails.
    pub fn render_preamble(&self, tree: &str) -> Result<String> {
        self.render(PREAMBLE_TEMPLATE, &PreambleView { tree })
    }

    fn render(&self, name: &str, view: &impl Serialize) -> Result<String> {
        let context = Context::from_serialize(view).map_err(|e| Error::template(name, &e))?;

        self.tera
            .render(name, &context)
            .map_err(|e| Error::template(name, &e))
    }
}

/// Detects programming language from a path's extension.
fn detect_language_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let Some(path) = value.as_str() else {
        return Ok(Value::String(String::new()));
    };

    let file_name = path.rsplit('/').next().unwrap_or(path);
    let ext = file_name
        .rsplit_once('.')
        .map_or(file_name, |(_, ext)| ext)
        .to_ascii_lowercase();

    let language = match ext.as_str() {
        "rs" => "rust",
        "py" => "python",
        "js" | "mjs" | "cjs" => "javascript",
        "ts" => "typescript",
        "jsx" => "jsx",
        "tsx" => "tsx",
        "go" => "go",
        "java" => "java",
        "c" | "h" => "c",
        "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "kt" => "kotlin",
        "scala" => "scala",
        "sh" | "bash" => "bash",
        "html" | "htm" => "html",
        "css" => "css",
        "scss" => "scss",
        "xml" => "xml",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "md" | "markdown" => "markdown",
        "sql" => "sql",
        "proto" => "protobuf",
        "dockerfile" => "dockerfile",
        "makefile" => "makefile",
        _ => "",
    };

    Ok(Value::String(language.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn test_render_entry_format() {
        let engine = TemplateEngine::new().unwrap();
        let entry = FileEntry::new("subdir/file2.txt", "Content of file2");

        let rendered = engine.render_entry(&entry).unwrap();

        let expected = format!(
            "{}\nFile: subdir/file2.txt\n```\nContent of file2\n```\n\n",
            "-".repeat(120)
        );
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_render_entry_does_not_escape_content() {
        let engine = TemplateEngine::new().unwrap();
        let entry = FileEntry::new("index.html", "<a href=\"x\">{{ not_a_var }}</a> & more");

        let rendered = engine.render_entry(&entry).unwrap();

        assert!(rendered.contains("<a href=\"x\">{{ not_a_var }}</a> & more"));
    }

    #[test]
    fn test_render_preamble() {
        let engine = TemplateEngine::new().unwrap();

        let rendered = engine.render_preamble("repo\n└── file1.txt").unwrap();

        assert_eq!(rendered, "Repo Structure:\n\nrepo\n└── file1.txt\n\n");
    }

    #[test]
    fn test_custom_entry_template() {
        let temp = assert_fs::TempDir::new().unwrap();
        let template = temp.child("entry.tera");
        template
            .write_str("## {{ path }} ({{ lines }} lines)\n```{{ path | detect_language }}\n{{ content }}\n```\n")
            .unwrap();

        let engine = TemplateEngine::with_entry_template(template.path()).unwrap();
        let rendered = engine
            .render_entry(&FileEntry::new("src/lib.rs", "pub fn a() {}\npub fn b() {}"))
            .unwrap();

        assert_eq!(
            rendered,
            "## src/lib.rs (2 lines)\n```rust\npub fn a() {}\npub fn b() {}\n```\n"
        );
    }

    #[test]
    fn test_custom_template_with_unknown_variable_is_rejected() {
        let temp = assert_fs::TempDir::new().unwrap();
        let template = temp.child("bad.tera");
        template.write_str("{{ missing_variable }}").unwrap();

        let result = TemplateEngine::with_entry_template(template.path());

        assert!(matches!(result, Err(Error::Template { .. })));
    }

    #[test]
    fn test_custom_template_syntax_error() {
        let temp = assert_fs::TempDir::new().unwrap();
        let template = temp.child("broken.tera");
        template.write_str("{% if path %}unterminated").unwrap();

        assert!(TemplateEngine::with_entry_template(template.path()).is_err());
    }

    #[test]
    fn test_custom_template_missing_file() {
        let result = TemplateEngine::with_entry_template(Path::new("/nonexistent/entry.tera"));

        assert!(result.is_err());
    }

    #[test]
    fn test_detect_language_filter() {
        let cases = [
            ("test.rs", "rust"),
            ("a/b/script.py", "python"),
            ("web/app.js", "javascript"),
            ("Dockerfile", "dockerfile"),
            ("config.TOML", "toml"),
            ("unknown.xyz", ""),
        ];

        for (path, expected) in cases {
            let value = Value::String(path.to_string());
            let result = detect_language_filter(&value, &HashMap::new()).unwrap();
            assert_eq!(result.as_str().unwrap(), expected, "path: {path}");
        }
    }
}
