//! Note profile: metadata block, tags, links, and headers.
//!
//! Mirrors the common note-vault conventions: a leading YAML metadata block
//! delimited by `---` lines, `#tag` inline markers, `[[target]]` /
//! `[[target|label]]` reference links, `[label](url)` external links, and
//! ATX headers. A malformed metadata block degrades the unit to unstructured
//! content instead of failing.

use std::sync::LazyLock;

use regex::Regex;
use trellis_core::{normalize_key, StructuralEntity};

use crate::{StructuralOutput, TitleIndex};

static REFERENCE_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\]|]+)(?:\|([^\]]+))?\]\]").expect("reference link regex"));

static EXTERNAL_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)").expect("external link regex"));

static INLINE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([A-Za-z0-9][A-Za-z0-9_/-]*)").expect("inline tag regex"));

static HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").expect("header regex"));

static FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(```|~~~)").expect("fence regex"));

/// Parsed leading metadata block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    pub title: Option<String>,
    pub aliases: Vec<String>,
    pub tags: Vec<String>,
}

/// Split a leading `---` metadata block from the body.
///
/// Returns `(frontmatter, body, warning)`. An unterminated or unparseable
/// block yields no frontmatter, keeps the entire raw content as the body,
/// and reports a warning — the unit is still indexed as plain content.
fn split_frontmatter(content: &str) -> (Option<Frontmatter>, &str, Option<String>) {
    let rest = match content.strip_prefix("---") {
        Some(rest) if rest.starts_with('\n') || rest.starts_with("\r\n") => rest,
        _ => return (None, content, None),
    };

    let Some(end) = rest.find("\n---") else {
        return (
            None,
            content,
            Some("unterminated metadata block; treating unit as unstructured".into()),
        );
    };
    let block = &rest[..end];
    let body = rest[end + 4..].trim_start_matches(['\r', '\n']);

    match serde_yaml::from_str::<serde_yaml::Value>(block) {
        Ok(value) => (Some(frontmatter_from_yaml(&value)), body, None),
        Err(e) => (
            None,
            content,
            Some(format!("malformed metadata block ({e}); treating unit as unstructured")),
        ),
    }
}

fn frontmatter_from_yaml(value: &serde_yaml::Value) -> Frontmatter {
    let title = value
        .get("title")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Frontmatter {
        title,
        aliases: string_or_list(value.get("aliases")),
        tags: string_or_list(value.get("tags")),
    }
}

/// Metadata values that may be a scalar or a list of scalars.
fn string_or_list(value: Option<&serde_yaml::Value>) -> Vec<String> {
    match value {
        Some(serde_yaml::Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        Some(serde_yaml::Value::Sequence(seq)) => seq
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Title from the metadata block alone, without a full extraction pass.
///
/// The index pipeline uses this to build the title index before any link
/// resolution happens.
pub fn peek_title(content: &str) -> Option<String> {
    let (frontmatter, _, _) = split_frontmatter(content);
    frontmatter.and_then(|fm| fm.title)
}

/// Extract the note-profile structural bundle from decoded content.
pub fn extract(content: &str, titles: &TitleIndex) -> StructuralOutput {
    let mut output = StructuralOutput::default();

    let (frontmatter, body, warning) = split_frontmatter(content);
    output.warnings.extend(warning);

    if let Some(fm) = &frontmatter {
        output.title = fm.title.clone();
        output.aliases = fm.aliases.clone();
        for tag in &fm.tags {
            output.bundle.push(StructuralEntity::Tag {
                name: normalize_key(tag),
            });
        }
    }

    let mut in_fence = false;
    for line in body.lines() {
        if FENCE.is_match(line) {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }

        if let Some(cap) = HEADER.captures(line.trim_end()) {
            output.bundle.push(StructuralEntity::Header {
                title: cap[2].trim().to_string(),
                level: cap[1].len() as u8,
            });
            // Header text never doubles as a tag line.
            continue;
        }

        for cap in REFERENCE_LINK.captures_iter(line) {
            let target = cap[1].trim().to_string();
            if target.is_empty() {
                continue;
            }
            output.bundle.push(StructuralEntity::InternalLink {
                resolved: titles.resolves(&target),
                target,
            });
        }

        for cap in EXTERNAL_LINK.captures_iter(line) {
            let text = cap[1].trim();
            let url = cap[2].trim();
            // Reference links already matched above; skip their overlap.
            if text.starts_with('[') || url.is_empty() {
                continue;
            }
            output.bundle.push(StructuralEntity::ExternalLink {
                url: url.to_string(),
                text: text.to_string(),
            });
        }

        for cap in INLINE_TAG.captures_iter(line) {
            let m = cap.get(0).expect("whole match");
            let before = &line[..m.start()];
            // Not a tag when it is a URL fragment or sits inside a code span.
            if before.contains("http") {
                continue;
            }
            if before.matches('`').count() % 2 == 1 {
                continue;
            }
            output.bundle.push(StructuralEntity::Tag {
                name: normalize_key(&cap[1]),
            });
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::EdgeKind;

    fn extract_plain(content: &str) -> StructuralOutput {
        extract(content, &TitleIndex::new())
    }

    fn tags(output: &StructuralOutput) -> Vec<&str> {
        output
            .bundle
            .entities
            .iter()
            .filter_map(|e| match e {
                StructuralEntity::Tag { name } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn frontmatter_title_aliases_and_tags() {
        let output = extract_plain(
            "---\ntitle: Garden Notes\naliases:\n  - Garden\ntags: [Soil, compost]\n---\nBody\n",
        );
        assert_eq!(output.title.as_deref(), Some("Garden Notes"));
        assert_eq!(output.aliases, vec!["Garden"]);
        assert_eq!(tags(&output), vec!["soil", "compost"]);
        assert!(output.warnings.is_empty());
    }

    #[test]
    fn scalar_tag_metadata_is_accepted() {
        let output = extract_plain("---\ntags: solo\n---\n");
        assert_eq!(tags(&output), vec!["solo"]);
    }

    #[test]
    fn unterminated_frontmatter_degrades_to_unstructured() {
        let output = extract_plain("---\ntitle: Broken\nBody with #tag\n");
        assert_eq!(output.title, None);
        assert_eq!(output.warnings.len(), 1);
        // The would-be metadata is ordinary content now; the tag still counts.
        assert_eq!(tags(&output), vec!["tag"]);
    }

    #[test]
    fn malformed_yaml_degrades_without_aborting() {
        let output = extract_plain("---\ntitle: [unclosed\n---\nBody #ok\n");
        assert_eq!(output.title, None);
        assert_eq!(output.warnings.len(), 1);
        assert_eq!(tags(&output), vec!["ok"]);
    }

    #[test]
    fn inline_and_metadata_tags_merge_case_insensitively() {
        let output = extract_plain("---\ntags: [Rust]\n---\nMore on #rust here\n");
        assert_eq!(tags(&output), vec!["rust"]);
        assert_eq!(output.bundle.edges.len(), 1);
    }

    #[test]
    fn reference_links_resolve_against_known_titles() {
        let titles: TitleIndex = ["Other Note"].into_iter().collect();
        let output = extract("See [[Other Note]] and [[Nowhere]]", &titles);

        let links: Vec<(&str, bool)> = output
            .bundle
            .entities
            .iter()
            .filter_map(|e| match e {
                StructuralEntity::InternalLink { target, resolved } => {
                    Some((target.as_str(), *resolved))
                }
                _ => None,
            })
            .collect();
        assert_eq!(links, vec![("Other Note", true), ("Nowhere", false)]);
    }

    #[test]
    fn labeled_reference_link_keeps_target() {
        let output = extract_plain("Link: [[Target Page|shown text]]");
        assert!(matches!(
            output.bundle.entities.as_slice(),
            [StructuralEntity::InternalLink { target, .. }] if target == "Target Page"
        ));
    }

    #[test]
    fn external_links_capture_text_and_url() {
        let output = extract_plain("Read [the docs](https://example.com/docs).");
        assert!(matches!(
            output.bundle.entities.as_slice(),
            [StructuralEntity::ExternalLink { url, text }]
                if url == "https://example.com/docs" && text == "the docs"
        ));
        assert_eq!(output.bundle.edges[0].kind, EdgeKind::LinksToExternal);
    }

    #[test]
    fn headers_record_nesting_level() {
        let output = extract_plain("# Top\n\n### Deep\n");
        let headers: Vec<(&str, u8)> = output
            .bundle
            .entities
            .iter()
            .filter_map(|e| match e {
                StructuralEntity::Header { title, level } => Some((title.as_str(), *level)),
                _ => None,
            })
            .collect();
        assert_eq!(headers, vec![("Top", 1), ("Deep", 3)]);
    }

    #[test]
    fn fenced_code_blocks_are_ignored() {
        let output = extract_plain("```\n[[not-a-link]] #not-a-tag\n```\nAfter [[real]]\n");
        assert!(matches!(
            output.bundle.entities.as_slice(),
            [StructuralEntity::InternalLink { target, .. }] if target == "real"
        ));
    }

    #[test]
    fn url_fragments_are_not_tags() {
        let output = extract_plain("Visit https://example.com/page#section for more\n");
        assert!(tags(&output).is_empty());
    }

    #[test]
    fn code_span_hashes_are_not_tags() {
        let output = extract_plain("Run `git log #HEAD` but tag #real\n");
        assert_eq!(tags(&output), vec!["real"]);
    }

    #[test]
    fn note_with_inline_tag_and_dangling_link() {
        let output = extract_plain("---\ntitle: Note\n---\nBody #inline links to [[Nowhere]]\n");
        assert_eq!(tags(&output), vec!["inline"]);

        let dangling = output.bundle.entities.iter().any(|e| {
            matches!(e, StructuralEntity::InternalLink { target, resolved: false } if target == "Nowhere")
        });
        assert!(dangling);
        assert_eq!(output.bundle.entities.len(), 2);
        assert_eq!(output.bundle.edges.len(), 2);
    }
}
