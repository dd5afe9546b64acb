//! Filesystem discovery.
//!
//! Walks a folder with `walkdir` and produces one [`FileDescriptor`] per
//! supported file, sorted by path. Hidden entries and well-known cache
//! directories are skipped; oversized and empty files are dropped.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use std::fs::File;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

use crate::config::ScannerConfig;
use crate::models::FileDescriptor;

const SKIPPED_DIRS: &[&str] = &["__pycache__", "node_modules", "target"];

/// Extensions accepted for each `--types` group.
const TYPE_GROUPS: &[(&str, &[&str])] = &[
    ("pdf", &["pdf"]),
    ("docx", &["docx"]),
    ("txt", &["txt"]),
    ("images", &["png", "jpg", "jpeg"]),
];

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Lowercase extensions without the dot.
    pub extensions: Vec<String>,
    pub recursive: bool,
    pub max_depth: usize,
    pub max_file_size: u64,
    pub include_hidden: bool,
}

impl ScanOptions {
    pub fn from_config(config: &ScannerConfig) -> Self {
        Self {
            extensions: config
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            recursive: true,
            max_depth: config.max_depth,
            max_file_size: config.max_file_size,
            include_hidden: config.include_hidden,
        }
    }

    /// Restrict to the given type groups (`pdf`, `docx`, `txt`, `images`).
    pub fn with_types(mut self, types: &[String]) -> Result<Self> {
        let mut extensions = Vec::new();
        for t in types {
            let t = t.trim().to_lowercase();
            match TYPE_GROUPS.iter().find(|(name, _)| *name == t) {
                Some((_, exts)) => extensions.extend(exts.iter().map(|e| e.to_string())),
                None => bail!(
                    "Unknown file type '{}'. Expected one of: pdf, docx, txt, images",
                    t
                ),
            }
        }
        self.extensions = extensions;
        Ok(self)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|s| SKIPPED_DIRS.contains(&s))
            .unwrap_or(false)
}

/// MIME type guessed from the extension.
pub fn guess_mime(extension: &str) -> &'static str {
    match extension {
        "pdf" => "application/pdf",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" => "text/plain",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// List supported files under `root`, sorted by path.
pub fn scan_folder(root: &Path, options: &ScanOptions) -> Result<Vec<FileDescriptor>> {
    if !root.exists() {
        bail!("Folder does not exist: {}", root.display());
    }
    if !root.is_dir() {
        bail!("Not a folder: {}", root.display());
    }

    let depth = if options.recursive {
        options.max_depth.max(1)
    } else {
        1
    };
    let include_hidden = options.include_hidden;

    let walker = WalkDir::new(root)
        .max_depth(depth)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || ((include_hidden || !is_hidden(e)) && !is_skipped_dir(e)));

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        if !options.extensions.contains(&extension) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot stat file");
                continue;
            }
        };
        let size = metadata.len();
        if size == 0 {
            tracing::debug!(path = %path.display(), "skipping empty file");
            continue;
        }
        if size > options.max_file_size {
            tracing::warn!(path = %path.display(), size, "skipping file over size limit");
            continue;
        }

        let modified_at: DateTime<Utc> = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

        files.push(FileDescriptor {
            name: entry.file_name().to_string_lossy().to_string(),
            size,
            mime_type: guess_mime(&extension).to_string(),
            extension,
            readable: File::open(path).is_ok(),
            modified_at,
            path: absolute,
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}
