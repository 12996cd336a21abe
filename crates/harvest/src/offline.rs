//! Offline scanning of previously exported files.

use crate::error::HarvestResult;
use crate::sink::JsonlSink;
use chatsweep_core::constants::{OFFLINE_CONTEXT_CHARS, OFFLINE_SCAN_EXTENSIONS};
use chatsweep_core::{OfflineMatchRecord, PatternSet};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// One match inside a scanned file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflineMatch {
    /// Pattern source text.
    pub pattern: String,
    /// Byte offset of the match start.
    pub start: usize,
    /// Byte offset just past the match end.
    pub end: usize,
    /// Match plus up to 80 characters on each side, newlines as spaces.
    pub excerpt: String,
}

/// Matches grouped by file, files in path order.
pub type GroupedMatches = BTreeMap<PathBuf, Vec<OfflineMatch>>;

/// Single-threaded directory scanner.
#[derive(Debug)]
pub struct OfflineScanner<'a> {
    patterns: &'a PatternSet,
    output: Option<&'a JsonlSink>,
}

impl<'a> OfflineScanner<'a> {
    /// Scanner that only collects matches.
    pub fn new(patterns: &'a PatternSet) -> Self {
        Self {
            patterns,
            output: None,
        }
    }

    /// Also append every match to `output`.
    pub fn with_output(mut self, output: &'a JsonlSink) -> Self {
        self.output = Some(output);
        self
    }

    /// Scan every whitelisted file under `root`.
    ///
    /// Unreadable files are skipped. The result is deterministic for an
    /// unchanged tree: files in path order, each file's matches by position.
    pub fn scan(&self, root: &Path) -> HarvestResult<GroupedMatches> {
        let mut grouped = GroupedMatches::new();
        let output_path = self.output.map(JsonlSink::path);

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!("Skipping unreadable entry: {}", err);
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_file() || !is_scannable(path) {
                continue;
            }
            if output_path.is_some_and(|out| same_file(out, path)) {
                continue;
            }

            let bytes = match std::fs::read(path) {
                Ok(bytes) => bytes,
                Err(err) => {
                    debug!("Skipping {}: {}", path.display(), err);
                    continue;
                }
            };
            let text = decode_lossy(&bytes);
            let matches = scan_text(self.patterns, &text);
            if matches.is_empty() {
                continue;
            }

            for found in &matches {
                info!(
                    "[OFFLINE MATCH] {} pattern={} -> ...{}...",
                    path.display(),
                    found.pattern,
                    found.excerpt
                );
                if let Some(output) = self.output {
                    let record = OfflineMatchRecord {
                        file: path.to_path_buf(),
                        pattern: found.pattern.clone(),
                        excerpt: found.excerpt.clone(),
                    };
                    if let Err(err) = output.append_record(&record) {
                        warn!("Failed to record offline match: {}", err);
                    }
                }
            }
            grouped.insert(path.to_path_buf(), matches);
        }

        Ok(grouped)
    }
}

/// Apply every pattern to `text`, ordered by match start then pattern order.
pub fn scan_text(patterns: &PatternSet, text: &str) -> Vec<OfflineMatch> {
    let mut matches: Vec<(usize, OfflineMatch)> = Vec::new();
    for (order, pattern) in patterns.iter().enumerate() {
        for found in pattern.regex.find_iter(text) {
            matches.push((
                order,
                OfflineMatch {
                    pattern: pattern.source.clone(),
                    start: found.start(),
                    end: found.end(),
                    excerpt: context_window(text, found.start(), found.end(), OFFLINE_CONTEXT_CHARS),
                },
            ));
        }
    }
    matches.sort_by_key(|(order, found)| (found.start, *order));
    matches.into_iter().map(|(_, found)| found).collect()
}

/// The match at `start..end` with up to `radius` characters on each side,
/// clamped to the text, with newlines replaced by spaces.
pub fn context_window(text: &str, start: usize, end: usize, radius: usize) -> String {
    let from = text[..start]
        .char_indices()
        .rev()
        .take(radius)
        .last()
        .map_or(start, |(idx, _)| idx);
    let to = text[end..]
        .char_indices()
        .nth(radius)
        .map_or(text.len(), |(idx, _)| end + idx);
    text[from..to].replace('\n', " ")
}

fn is_scannable(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| OFFLINE_SCAN_EXTENSIONS.contains(&ext))
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Decode UTF-8, dropping invalid byte sequences.
fn decode_lossy(bytes: &[u8]) -> String {
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_clamps_at_file_start_and_end() {
        let text = "token=abc";
        let patterns = PatternSet::compile([r"token=\w+"]).expect("pattern");
        let found = scan_text(&patterns, text);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].excerpt, "token=abc");
    }

    #[test]
    fn window_keeps_eighty_chars_each_side() {
        let before = "b".repeat(100);
        let after = "a".repeat(100);
        let text = format!("{}token=SECRET{}", before, after);
        let patterns = PatternSet::compile(["token=SECRET"]).expect("pattern");
        let found = scan_text(&patterns, &text);
        assert_eq!(found.len(), 1);
        assert_eq!(
            found[0].excerpt,
            format!("{}token=SECRET{}", "b".repeat(80), "a".repeat(80))
        );
    }

    #[test]
    fn window_counts_characters_not_bytes() {
        let text = format!("{}needle{}", "é".repeat(90), "ü".repeat(90));
        let window = context_window(&text, 180, 186, 80);
        assert_eq!(window, format!("{}needle{}", "é".repeat(80), "ü".repeat(80)));
    }

    #[test]
    fn newlines_collapse_to_spaces() {
        let text = "line one\ntoken=XYZ\nline three";
        let patterns = PatternSet::compile([r"token=\w+"]).expect("pattern");
        let found = scan_text(&patterns, text);
        assert_eq!(found[0].excerpt, "line one token=XYZ line three");
    }

    #[test]
    fn matches_are_ordered_by_position() {
        let patterns = PatternSet::compile(["beta", "alpha"]).expect("patterns");
        let found = scan_text(&patterns, "alpha beta alpha");
        let order: Vec<(&str, usize)> = found
            .iter()
            .map(|m| (m.pattern.as_str(), m.start))
            .collect();
        assert_eq!(order, vec![("alpha", 0), ("beta", 6), ("alpha", 11)]);
    }

    #[test]
    fn invalid_utf8_bytes_are_dropped() {
        let bytes = b"tok\xffen=ok";
        assert_eq!(decode_lossy(bytes), "token=ok");
    }

    #[test]
    fn only_whitelisted_extensions_are_scanned() {
        assert!(is_scannable(Path::new("a/b.txt")));
        assert!(is_scannable(Path::new("chats_index.json")));
        assert!(is_scannable(Path::new("notes.md")));
        assert!(!is_scannable(Path::new("messages.db")));
        assert!(!is_scannable(Path::new("README")));
    }
}
