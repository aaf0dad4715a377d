//! Trellis structural extractor
//!
//! Deterministic, pattern-based extraction of structural entities from a
//! source unit — no external calls, no filesystem access. Two profiles share
//! one output contract:
//!
//! - **Code profile**: import statements and top-level function/class
//!   definitions per language family. Pattern matching, not a grammar.
//! - **Note profile**: leading metadata block, inline and metadata tags,
//!   reference links (resolved case-insensitively against known titles),
//!   external links, and headers with nesting level.
//!
//! Both produce an [`ExtractionBundle`] so the store and synchronizer never
//! care which profile ran.

pub mod code;
pub mod note;

pub use code::LanguageFamily;
pub use note::Frontmatter;

use trellis_core::{ExtractionBundle, UnitProfile};

/// Case-insensitive set of unit titles used to resolve reference links.
#[derive(Debug, Clone, Default)]
pub struct TitleIndex {
    titles: std::collections::HashSet<String>,
}

impl TitleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, title: &str) {
        self.titles.insert(trellis_core::normalize_key(title));
    }

    /// Whether a link target resolves to a known title.
    pub fn resolves(&self, target: &str) -> bool {
        self.titles.contains(&trellis_core::normalize_key(target))
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for TitleIndex {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut index = Self::new();
        for title in iter {
            index.insert(title.as_ref());
        }
        index
    }
}

/// Result of structural extraction for one unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuralOutput {
    pub bundle: ExtractionBundle,
    /// Title from note metadata, when present.
    pub title: Option<String>,
    /// Alternate titles from note metadata.
    pub aliases: Vec<String>,
    /// Non-fatal parse degradations, e.g. an unterminated metadata block.
    pub warnings: Vec<String>,
}

/// Stateless structural extractor dispatching on the unit profile.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralExtractor;

impl StructuralExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract structural entities from one unit's decoded content.
    ///
    /// `titles` is consulted by the note profile to mark reference links as
    /// resolved or dangling; the code profile ignores it.
    pub fn extract(&self, extension: &str, content: &str, titles: &TitleIndex) -> StructuralOutput {
        match UnitProfile::for_extension(extension) {
            UnitProfile::Note => note::extract(content, titles),
            UnitProfile::Code => code::extract(extension, content),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::StructuralEntity;

    #[test]
    fn dispatch_selects_profile_by_extension() {
        let extractor = StructuralExtractor::new();
        let titles = TitleIndex::new();

        let code = extractor.extract("py", "import pandas\n", &titles);
        assert!(matches!(
            code.bundle.entities.as_slice(),
            [StructuralEntity::ImportedModule { name }] if name == "pandas"
        ));

        let notes = extractor.extract("md", "# Title\n", &titles);
        assert!(matches!(
            notes.bundle.entities.as_slice(),
            [StructuralEntity::Header { level: 1, .. }]
        ));
    }

    #[test]
    fn title_index_resolution_is_case_insensitive() {
        let index: TitleIndex = ["Other Note"].into_iter().collect();
        assert!(index.resolves("other note"));
        assert!(index.resolves("OTHER NOTE"));
        assert!(!index.resolves("missing"));
    }

    #[test]
    fn unchanged_content_extracts_identically() {
        let extractor = StructuralExtractor::new();
        let titles = TitleIndex::new();
        let content = "---\ntags: [alpha]\n---\nSee [[Beta]] and #gamma\n";

        let first = extractor.extract("md", content, &titles);
        let second = extractor.extract("md", content, &titles);
        assert_eq!(first, second);
    }
}
