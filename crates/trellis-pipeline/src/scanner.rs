//! Corpus scanning.
//!
//! Walks a directory tree, prunes skip-listed directories before descent,
//! applies the extension allow-list and the size cap, and sniffs encodings
//! at read time. Re-running over an unchanged tree yields the same sequence:
//! entries are visited in sorted order and nothing here is time-dependent.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Scanner policy.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub recursive: bool,
    /// Lowercase extensions without the dot.
    pub extensions: Vec<String>,
    /// Directory names pruned before descent.
    pub skip_dirs: HashSet<String>,
    /// Units larger than this are skipped and logged.
    pub max_file_size: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        let skip_dirs = [
            ".git",
            ".svn",
            ".hg",
            ".obsidian",
            ".trash",
            ".idea",
            ".vscode",
            ".venv",
            "venv",
            "node_modules",
            "target",
            "build",
            "dist",
            "__pycache__",
            ".pytest_cache",
            ".mypy_cache",
            ".tox",
            "coverage",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        Self {
            recursive: true,
            extensions: [
                "md", "markdown", "txt", "py", "pyi", "rs", "js", "jsx", "ts", "tsx", "go",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            skip_dirs,
            max_file_size: 10 * 1024 * 1024,
        }
    }
}

impl ScanConfig {
    /// Whether a file path passes the allow-list and hidden-file policy.
    pub fn accepts(&self, path: &Path) -> bool {
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(true);
        if hidden {
            return false;
        }
        let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.extensions.iter().any(|e| e == &extension.to_lowercase())
    }

    /// Whether any component of the path is a skip-listed directory.
    pub fn crosses_skip_dir(&self, path: &Path) -> bool {
        path.components().any(|c| {
            c.as_os_str()
                .to_str()
                .map(|name| self.skip_dirs.contains(name))
                .unwrap_or(false)
        })
    }
}

/// One discovered candidate file.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

/// Result of a scan pass.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub files: Vec<ScannedFile>,
    pub skipped_oversize: usize,
    pub skipped_unreadable: usize,
}

/// Walk `root` under the configured policy.
pub fn scan(root: &Path, config: &ScanConfig) -> ScanOutcome {
    let mut outcome = ScanOutcome::default();

    let walker = WalkDir::new(root)
        .max_depth(if config.recursive { usize::MAX } else { 1 })
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_pruned(entry, config));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("scan error, skipping entry: {e}");
                outcome.skipped_unreadable += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() || !config.accepts(entry.path()) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(path = %entry.path().display(), "unreadable metadata, skipping: {e}");
                outcome.skipped_unreadable += 1;
                continue;
            }
        };
        if metadata.len() > config.max_file_size {
            debug!(
                path = %entry.path().display(),
                size = metadata.len(),
                "unit exceeds size cap, skipping"
            );
            outcome.skipped_oversize += 1;
            continue;
        }

        outcome.files.push(ScannedFile {
            path: entry.path().to_path_buf(),
            size: metadata.len(),
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        });
    }

    debug!(
        files = outcome.files.len(),
        oversize = outcome.skipped_oversize,
        "scan complete"
    );
    outcome
}

fn is_pruned(entry: &DirEntry, config: &ScanConfig) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| config.skip_dirs.contains(name))
            .unwrap_or(false)
}

/// Decode raw bytes into text, sniffing the encoding.
///
/// UTF-8 (with or without BOM) and BOM-marked UTF-16 decode cleanly; other
/// byte soups fall back to a Latin-1 view. Content with NUL bytes is
/// binary — `None` tells the caller to skip the unit.
pub fn decode(bytes: &[u8]) -> Option<(String, &'static str)> {
    if bytes.iter().take(8192).any(|b| *b == 0) {
        // UTF-16 BOMs legitimately contain NULs in the payload.
        match bytes {
            [0xFF, 0xFE, rest @ ..] => return Some((decode_utf16(rest, true), "utf-16le")),
            [0xFE, 0xFF, rest @ ..] => return Some((decode_utf16(rest, false), "utf-16be")),
            _ => return None,
        }
    }

    let without_bom = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    match std::str::from_utf8(without_bom) {
        Ok(text) => Some((text.to_string(), "utf-8")),
        Err(_) => Some((
            without_bom.iter().map(|b| *b as char).collect(),
            "latin-1",
        )),
    }
}

fn decode_utf16(bytes: &[u8], little_endian: bool) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| {
            if little_endian {
                u16::from_le_bytes([pair[0], pair[1]])
            } else {
                u16::from_be_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    String::from_utf16_lossy(&units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn scan_prunes_skip_dirs_and_filters_extensions() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.md", "# a");
        write(dir.path(), "sub/b.py", "import os");
        write(dir.path(), ".git/config.md", "not indexed");
        write(dir.path(), "node_modules/x.js", "not indexed");
        write(dir.path(), "image.png", "not text");
        write(dir.path(), ".hidden.md", "not indexed");

        let outcome = scan(dir.path(), &ScanConfig::default());
        let names: Vec<String> = outcome
            .files
            .iter()
            .map(|f| {
                f.path
                    .strip_prefix(dir.path())
                    .unwrap()
                    .to_string_lossy()
                    .to_string()
            })
            .collect();
        assert_eq!(names, vec!["a.md", "sub/b.py"]);
    }

    #[test]
    fn scan_is_restartable_with_stable_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["zeta.md", "alpha.md", "mid.md"] {
            write(dir.path(), name, "x");
        }

        let config = ScanConfig::default();
        let first = scan(dir.path(), &config);
        let second = scan(dir.path(), &config);
        assert_eq!(first.files, second.files);
    }

    #[test]
    fn non_recursive_scan_stays_at_the_top_level() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "top.md", "x");
        write(dir.path(), "deep/nested.md", "x");

        let config = ScanConfig {
            recursive: false,
            ..ScanConfig::default()
        };
        let outcome = scan(dir.path(), &config);
        assert_eq!(outcome.files.len(), 1);
        assert!(outcome.files[0].path.ends_with("top.md"));
    }

    #[test]
    fn oversized_files_are_skipped_and_counted() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "big.md", &"x".repeat(256));
        write(dir.path(), "small.md", "ok");

        let config = ScanConfig {
            max_file_size: 64,
            ..ScanConfig::default()
        };
        let outcome = scan(dir.path(), &config);
        assert_eq!(outcome.files.len(), 1);
        assert_eq!(outcome.skipped_oversize, 1);
    }

    #[test]
    fn decode_handles_utf8_and_boms() {
        assert_eq!(decode(b"plain"), Some(("plain".to_string(), "utf-8")));
        assert_eq!(
            decode(&[0xEF, 0xBB, 0xBF, b'h', b'i']),
            Some(("hi".to_string(), "utf-8"))
        );

        // "hi" as UTF-16LE with BOM.
        let (text, encoding) = decode(&[0xFF, 0xFE, b'h', 0, b'i', 0]).unwrap();
        assert_eq!((text.as_str(), encoding), ("hi", "utf-16le"));
    }

    #[test]
    fn decode_rejects_binary_and_tolerates_latin1() {
        assert_eq!(decode(&[0x7F, 0x45, 0x4C, 0x46, 0x00, 0x01]), None);

        let (text, encoding) = decode(&[b'c', b'a', b'f', 0xE9]).unwrap();
        assert_eq!((text.as_str(), encoding), ("café", "latin-1"));
    }
}
