use anyhow::{Context, Result};
use ignore::overrides::{Override, OverrideBuilder};
use ignore::WalkBuilder;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::{Config, ScanConfig};
use crate::dispatch::{dispatch_file, FileResult};
use crate::language::SourceFile;

fn excluded_dir_overrides(root: &Path, exclude_dir_names: &[String]) -> Result<Override> {
    let mut ob = OverrideBuilder::new(root);

    // `!` marks an ignore glob; with no whitelist globs everything else passes.
    for d in exclude_dir_names {
        let d = d.trim().trim_matches('/');
        if d.is_empty() {
            continue;
        }
        ob.add(&format!("!**/{d}"))?;
        ob.add(&format!("!**/{d}/**"))?;
    }

    Ok(ob.build()?)
}

/// A file the walk found but could not analyze.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Everything one scan produced.
///
/// `files` holds only files with at least one match, in walk order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionResult {
    pub root: PathBuf,
    pub targets: Vec<String>,
    pub files: Vec<FileResult>,
    pub skipped: Vec<SkippedFile>,
}

impl ExtractionResult {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, path: &Path) -> Option<&FileResult> {
        self.files.iter().find(|f| f.path == path)
    }
}

/// Every supported source file under `root`, in walk order.
///
/// Symlinks are not followed. Size limits are applied later, by the scan.
pub fn collect_source_files(root: &Path, opts: &ScanConfig) -> Result<Vec<SourceFile>> {
    let meta = std::fs::metadata(root)
        .with_context(|| format!("Scan root does not exist: {}", root.display()))?;

    if meta.is_file() {
        return Ok(SourceFile::detect(root).into_iter().collect());
    }

    let overrides = excluded_dir_overrides(root, &opts.exclude_dir_names)?;
    let walker = WalkBuilder::new(root)
        .standard_filters(opts.respect_ignore_files)
        .follow_links(false)
        .overrides(overrides)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut files = Vec::new();
    for item in walker {
        let dent = match item {
            Ok(d) => d,
            Err(e) => {
                crate::debug_log!("[callspan] walk error: {e}");
                continue;
            }
        };

        if !dent.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }

        if let Some(file) = SourceFile::detect(dent.into_path()) {
            files.push(file);
        }
    }

    Ok(files)
}

/// Scan `root` for self-recursive definitions of each name in `targets`.
pub fn scan_tree(root: &Path, targets: &[String], cfg: &Config) -> Result<ExtractionResult> {
    scan_tree_with_progress(root, targets, cfg, |_| {})
}

/// Like [`scan_tree`], calling `on_file` before each file is analyzed.
pub fn scan_tree_with_progress(
    root: &Path,
    targets: &[String],
    cfg: &Config,
    mut on_file: impl FnMut(&Path),
) -> Result<ExtractionResult> {
    let mut unique: Vec<String> = Vec::new();
    for t in targets {
        let t = t.trim();
        if !t.is_empty() && !unique.iter().any(|u| u == t) {
            unique.push(t.to_string());
        }
    }

    let mut result = ExtractionResult {
        root: root.to_path_buf(),
        targets: unique,
        ..ExtractionResult::default()
    };

    for file in collect_source_files(root, &cfg.scan)? {
        on_file(&file.path);

        let source = match read_source(&file.path, cfg.scan.max_file_bytes) {
            Ok(s) => s,
            Err(e) => {
                crate::debug_log!("[callspan] skipping {}: {e:#}", file.path.display());
                result.skipped.push(SkippedFile {
                    path: file.path,
                    reason: format!("{e:#}"),
                });
                continue;
            }
        };

        match dispatch_file(&file, &source, &result.targets, &cfg.analysis) {
            Ok(record) if record.has_match() => result.files.push(record),
            Ok(_) => {}
            Err(e) => {
                crate::debug_log!("[callspan] skipping {}: {e:#}", file.path.display());
                result.skipped.push(SkippedFile {
                    path: file.path,
                    reason: format!("{e:#}"),
                });
            }
        }
    }

    Ok(result)
}

/// UTF-8 contents of `path`. Files over `max_bytes` are refused before reading.
fn read_source(path: &Path, max_bytes: u64) -> Result<String> {
    let bytes = std::fs::metadata(path)
        .with_context(|| format!("Failed to stat {}", path.display()))?
        .len();
    if bytes > max_bytes {
        anyhow::bail!("{bytes} bytes exceeds max_file_bytes ({max_bytes})");
    }

    let raw = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    String::from_utf8(raw).with_context(|| format!("{} is not valid UTF-8", path.display()))
}
