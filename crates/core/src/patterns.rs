//! Compiled search patterns shared by live and offline scanning.

use crate::error::{Error, Result};
use regex::{Regex, RegexBuilder};
use std::path::Path;

/// One compiled pattern together with its source text.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    /// Pattern as written in the pattern file.
    pub source: String,
    /// Case-insensitive compiled form.
    pub regex: Regex,
}

/// An immutable, ordered set of case-insensitive patterns.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<CompiledPattern>,
}

impl PatternSet {
    /// Compile every pattern, failing on the first invalid one.
    pub fn compile<I, S>(sources: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = sources
            .into_iter()
            .map(|source| {
                let source = source.as_ref();
                RegexBuilder::new(source)
                    .case_insensitive(true)
                    .build()
                    .map(|regex| CompiledPattern {
                        source: source.to_string(),
                        regex,
                    })
                    .map_err(|e| Error::Pattern {
                        pattern: source.to_string(),
                        message: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Parse pattern file content: one pattern per line, blank lines and
    /// `#` comments skipped.
    pub fn parse(content: &str) -> Result<Self> {
        Self::compile(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#')),
        )
    }

    /// Load and compile a pattern file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read pattern file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&content)
    }

    /// Patterns in file order.
    pub fn iter(&self) -> impl Iterator<Item = &CompiledPattern> {
        self.patterns.iter()
    }

    /// Patterns that match somewhere in `text`, in file order.
    pub fn matching<'a>(&'a self, text: &'a str) -> impl Iterator<Item = &'a CompiledPattern> + 'a {
        self.patterns.iter().filter(move |p| p.regex.is_match(text))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
