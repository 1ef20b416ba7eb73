//! Document loaders.
//!
//! A [`DocumentLoader`] turns `[data]` into [`Fragment`]s: raw text with the
//! file it came from and a page number. Fragments are not chunked yet; the
//! splitter runs afterwards.
//!
//! | `data.loader` | Loader | Page |
//! |---------------|--------|------|
//! | `pdf` | [`PdfDirectoryLoader`] | 0-based PDF page |
//! | `json` | [`JsonLoader`] | record's `page`, else `-1` |
//! | `text` | [`TextDirectoryLoader`] | `-1` |
//!
//! Directory loaders return fragments in path order so repeated runs see the
//! same sequence.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ragsync_core::models::UNKNOWN_PAGE;
use ragsync_core::Fragment;
use walkdir::WalkDir;

use crate::config::{DataConfig, LoaderKind};
use crate::extract;

pub trait DocumentLoader {
    fn load(&self) -> Result<Vec<Fragment>>;
}

/// Build the loader selected by `data.loader`.
pub fn create_loader(config: &DataConfig) -> Result<Box<dyn DocumentLoader>> {
    Ok(match config.loader {
        LoaderKind::Pdf => Box::new(PdfDirectoryLoader::new(&config.path)),
        LoaderKind::Json => Box::new(JsonLoader::new(&config.path, &config.text_key)),
        LoaderKind::Text => Box::new(TextDirectoryLoader::new(
            &config.path,
            &config.include_globs,
            &config.exclude_globs,
        )?),
    })
}

// ============ PDF ============

/// Every `*.pdf` below a directory, one fragment per non-empty page.
///
/// A PDF that cannot be parsed is skipped with a warning.
pub struct PdfDirectoryLoader {
    root: PathBuf,
}

impl PdfDirectoryLoader {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

impl DocumentLoader for PdfDirectoryLoader {
    fn load(&self) -> Result<Vec<Fragment>> {
        let files = walk_files(&self.root, |rel| rel.to_ascii_lowercase().ends_with(".pdf"))?;

        let mut fragments = Vec::new();
        for path in files {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let pages = match extract::extract_pdf_pages(&bytes) {
                Ok(pages) => pages,
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "skipping unreadable PDF");
                    continue;
                }
            };

            let source = path.to_string_lossy().to_string();
            for (page, text) in pages.into_iter().enumerate() {
                if text.trim().is_empty() {
                    continue;
                }
                fragments.push(Fragment::new(text, source.clone(), page as i64));
            }
        }

        tracing::info!(count = fragments.len(), root = %self.root.display(), "loaded PDF pages");
        Ok(fragments)
    }
}

// ============ JSON ============

/// A JSON array of records.
///
/// Each record must carry a string under `text_key`. Optional `"source"`
/// (string) and `"page"` (integer) fields override the defaults of the JSON
/// file's own path and `-1`.
pub struct JsonLoader {
    path: PathBuf,
    text_key: String,
}

impl JsonLoader {
    pub fn new(path: &Path, text_key: &str) -> Self {
        Self {
            path: path.to_path_buf(),
            text_key: text_key.to_string(),
        }
    }
}

impl DocumentLoader for JsonLoader {
    fn load(&self) -> Result<Vec<Fragment>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read JSON data file: {}", self.path.display()))?;
        let value: serde_json::Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON data file: {}", self.path.display()))?;
        let records = value
            .as_array()
            .ok_or_else(|| anyhow!("JSON data file must contain an array of records"))?;

        let default_source = self.path.to_string_lossy().to_string();
        records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let text = record
                    .get(&self.text_key)
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| {
                        anyhow!("record {} has no string field '{}'", i, self.text_key)
                    })?;
                let source = record
                    .get("source")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| default_source.clone());
                let page = record
                    .get("page")
                    .and_then(|v| v.as_i64())
                    .unwrap_or(UNKNOWN_PAGE);
                Ok(Fragment::new(text, source, page))
            })
            .collect()
    }
}

// ============ Text / DOCX ============

/// Plain-text files (and `.docx`) below a directory, filtered by globs.
///
/// Globs match paths relative to the root. `.git`, `target` and
/// `node_modules` are always excluded.
pub struct TextDirectoryLoader {
    root: PathBuf,
    include: GlobSet,
    exclude: GlobSet,
}

impl TextDirectoryLoader {
    pub fn new(root: &Path, include_globs: &[String], exclude_globs: &[String]) -> Result<Self> {
        let mut excludes = vec![
            "**/.git/**".to_string(),
            "**/target/**".to_string(),
            "**/node_modules/**".to_string(),
        ];
        excludes.extend(exclude_globs.iter().cloned());

        Ok(Self {
            root: root.to_path_buf(),
            include: build_globset(include_globs)?,
            exclude: build_globset(&excludes)?,
        })
    }
}

impl DocumentLoader for TextDirectoryLoader {
    fn load(&self) -> Result<Vec<Fragment>> {
        let files = walk_files(&self.root, |rel| {
            !self.exclude.is_match(rel) && self.include.is_match(rel)
        })?;

        let mut fragments = Vec::new();
        for path in files {
            let is_docx = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("docx"));

            let text = if is_docx {
                let bytes = std::fs::read(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                match extract::extract_docx(&bytes) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(file = %path.display(), error = %e, "skipping unreadable document");
                        continue;
                    }
                }
            } else {
                match std::fs::read_to_string(&path) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(file = %path.display(), error = %e, "skipping non-UTF-8 file");
                        continue;
                    }
                }
            };

            if text.trim().is_empty() {
                continue;
            }
            fragments.push(Fragment::new(
                text,
                path.to_string_lossy().to_string(),
                UNKNOWN_PAGE,
            ));
        }

        tracing::info!(count = fragments.len(), root = %self.root.display(), "loaded text files");
        Ok(fragments)
    }
}

/// Files below `root` whose root-relative path passes `keep`, sorted.
fn walk_files(root: &Path, keep: impl Fn(&str) -> bool) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        bail!("Data directory does not exist: {}", root.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");
        if keep(&rel_str) {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn globs(patterns: &[&str]) -> Vec<String> {
        patterns.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_json_loader_reads_records() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.json");
        std::fs::write(
            &path,
            r#"[
                {"text": "first", "source": "a.pdf", "page": 2},
                {"text": "second"}
            ]"#,
        )
        .unwrap();

        let fragments = JsonLoader::new(&path, "text").load().unwrap();
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0], Fragment::new("first", "a.pdf", 2));
        assert_eq!(fragments[1].page, UNKNOWN_PAGE);
        assert_eq!(fragments[1].source_file, path.to_string_lossy());
    }

    #[test]
    fn test_json_loader_custom_text_key() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.json");
        std::fs::write(&path, r#"[{"body": "hello"}]"#).unwrap();

        let fragments = JsonLoader::new(&path, "body").load().unwrap();
        assert_eq!(fragments[0].text, "hello");
    }

    #[test]
    fn test_json_loader_rejects_record_without_text() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.json");
        std::fs::write(&path, r#"[{"text": "ok"}, {"source": "x.pdf"}]"#).unwrap();

        let err = JsonLoader::new(&path, "text").load().unwrap_err();
        assert!(err.to_string().contains("record 1"));
    }

    #[test]
    fn test_json_loader_rejects_non_array() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.json");
        std::fs::write(&path, r#"{"text": "not a list"}"#).unwrap();

        assert!(JsonLoader::new(&path, "text").load().is_err());
    }

    #[test]
    fn test_text_loader_applies_globs_in_path_order() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("notes")).unwrap();
        std::fs::create_dir_all(root.join("drafts")).unwrap();
        std::fs::write(root.join("b.md"), "bee").unwrap();
        std::fs::write(root.join("notes/a.txt"), "ay").unwrap();
        std::fs::write(root.join("drafts/c.md"), "sea").unwrap();
        std::fs::write(root.join("image.png"), [0u8, 1, 2]).unwrap();
        std::fs::write(root.join("empty.md"), "   \n").unwrap();

        let loader = TextDirectoryLoader::new(
            root,
            &globs(&["**/*.md", "**/*.txt"]),
            &globs(&["drafts/**"]),
        )
        .unwrap();
        let fragments = loader.load().unwrap();

        let texts: Vec<&str> = fragments.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, vec!["bee", "ay"]);
        assert!(fragments.iter().all(|f| f.page == UNKNOWN_PAGE));
    }

    #[test]
    fn test_text_loader_missing_root_is_error() {
        let tmp = TempDir::new().unwrap();
        let loader =
            TextDirectoryLoader::new(&tmp.path().join("nope"), &globs(&["**/*"]), &[]).unwrap();
        assert!(loader.load().is_err());
    }

    #[test]
    fn test_invalid_glob_is_error() {
        let tmp = TempDir::new().unwrap();
        assert!(TextDirectoryLoader::new(tmp.path(), &globs(&["a[b"]), &[]).is_err());
    }

    #[test]
    fn test_pdf_loader_skips_unparseable_files() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("broken.pdf"), b"not really a pdf").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), b"ignored").unwrap();

        let fragments = PdfDirectoryLoader::new(tmp.path()).load().unwrap();
        assert!(fragments.is_empty());
    }

    #[test]
    fn test_create_loader_by_kind() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("one.txt"), "one").unwrap();
        let config = DataConfig {
            path: tmp.path().to_path_buf(),
            loader: LoaderKind::Text,
            ..DataConfig::default()
        };

        let fragments = create_loader(&config).unwrap().load().unwrap();
        assert_eq!(fragments.len(), 1);
    }
}
