//! Source file discovery and loading.
//!
//! Targets (files or directories) are expanded with `walkdir`, filtered to
//! source files, and read concurrently while preserving discovery order.

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Directories never descended into.
const IGNORED_DIRS: &[&str] = &[
    "node_modules",
    "target",
    "dist",
    "build",
    "out",
    "coverage",
    "vendor",
    "__pycache__",
    "venv",
    "ai-code-review-docs",
];

/// Extensions treated as reviewable source code.
const SOURCE_EXTENSIONS: &[&str] = &[
    "rs", "ts", "tsx", "js", "jsx", "mjs", "cjs", "py", "go", "java", "kt", "rb", "php", "cs",
    "cpp", "cc", "c", "h", "hpp", "swift", "scala", "vue", "svelte", "sql", "sh",
];

/// Files read concurrently.
const READ_CONCURRENCY: usize = 16;

/// A source file loaded for review. Immutable once read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUnit {
    pub path: PathBuf,
    /// Path relative to the project root, `/`-separated.
    pub relative_path: String,
    pub content: String,
    pub extension: Option<String>,
}

impl FileUnit {
    pub fn new(
        path: impl Into<PathBuf>,
        relative_path: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let path = path.into();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase());
        Self {
            path,
            relative_path: relative_path.into(),
            content: content.into(),
            extension,
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// File name without directories.
    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }
}

/// Filters applied during discovery.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    pub include_tests: bool,
    /// Glob patterns matched against project-relative paths.
    pub exclude: Vec<glob::Pattern>,
}

impl DiscoveryOptions {
    /// Compile exclude patterns, rejecting invalid globs.
    pub fn with_excludes(mut self, patterns: &[String]) -> Result<Self> {
        for pattern in patterns {
            let compiled = glob::Pattern::new(pattern)
                .with_context(|| format!("Invalid exclude pattern '{}'", pattern))?;
            self.exclude.push(compiled);
        }
        Ok(self)
    }

    fn is_excluded(&self, relative: &str) -> bool {
        self.exclude.iter().any(|p| p.matches(relative))
    }
}

/// Whether a path looks like test code.
pub fn is_test_file(relative: &str) -> bool {
    let lower = relative.to_lowercase();
    let components: Vec<&str> = lower.split('/').collect();
    if components[..components.len().saturating_sub(1)]
        .iter()
        .any(|c| matches!(*c, "test" | "tests" | "__tests__" | "spec" | "specs"))
    {
        return true;
    }

    let name = components.last().copied().unwrap_or_default();
    let stem = name.split('.').next().unwrap_or_default();
    name.contains(".test.")
        || name.contains(".spec.")
        || stem.starts_with("test_")
        || stem.ends_with("_test")
        || stem.ends_with("_tests")
        || stem.ends_with("_spec")
}

fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|e| SOURCE_EXTENSIONS.contains(&e.as_str()))
}

/// Path of `path` relative to `root`, `/`-separated.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn walk_filtered(root: &Path) -> impl Iterator<Item = walkdir::DirEntry> {
    walkdir::WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            !name.starts_with('.') && !IGNORED_DIRS.contains(&name.as_ref())
        })
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable path");
                None
            }
        })
}

/// Expand targets into a sorted, de-duplicated list of source files.
///
/// Relative targets resolve against `project_dir`. Explicitly named files
/// bypass the extension and test filters but not exclude patterns.
pub fn discover_files(
    project_dir: &Path,
    targets: &[PathBuf],
    options: &DiscoveryOptions,
) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();

    for target in targets {
        let full = if target.is_absolute() {
            target.clone()
        } else {
            project_dir.join(target)
        };
        if !full.exists() {
            anyhow::bail!("Target not found: {}", full.display());
        }

        if full.is_file() {
            if !options.is_excluded(&relative_path(project_dir, &full)) {
                found.push(full);
            }
            continue;
        }

        for entry in walk_filtered(&full) {
            if !entry.file_type().is_file() || !has_source_extension(entry.path()) {
                continue;
            }
            let relative = relative_path(project_dir, entry.path());
            if !options.include_tests && is_test_file(&relative) {
                tracing::debug!(file = %relative, "Skipping test file");
                continue;
            }
            if options.is_excluded(&relative) {
                tracing::debug!(file = %relative, "Skipping excluded file");
                continue;
            }
            found.push(entry.into_path());
        }
    }

    found.sort();
    found.dedup();
    tracing::debug!(count = found.len(), "Discovered source files");
    Ok(found)
}

/// Read files concurrently, keeping input order.
///
/// Unreadable or non-UTF-8 files are skipped with a warning.
pub async fn read_files(project_dir: &Path, paths: Vec<PathBuf>) -> Vec<FileUnit> {
    stream::iter(paths)
        .map(|path| async move {
            let result = tokio::fs::read(&path).await;
            (path, result)
        })
        .buffered(READ_CONCURRENCY)
        .filter_map(|(path, result)| async move {
            let relative = relative_path(project_dir, &path);
            match result {
                Ok(bytes) => match String::from_utf8(bytes) {
                    Ok(content) => Some(FileUnit::new(path, relative, content)),
                    Err(_) => {
                        tracing::warn!(file = %relative, "Skipping non-UTF-8 file");
                        None
                    }
                },
                Err(e) => {
                    tracing::warn!(file = %relative, error = %e, "Skipping unreadable file");
                    None
                }
            }
        })
        .collect()
        .await
}

/// SHA-256 over relative paths and contents, used to validate checkpoints.
pub fn fingerprint(files: &[FileUnit]) -> String {
    let mut hasher = Sha256::new();
    for file in files {
        hasher.update(file.relative_path.as_bytes());
        hasher.update([0u8]);
        hasher.update(file.content.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}
