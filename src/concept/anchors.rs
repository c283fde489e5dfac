//! Anchor vocabulary extraction.
//!
//! Bold spans, headings, acronyms and entity file names go straight into the
//! vocabulary. Plain words only get in when enough chunks use them.

use regex::Regex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;

use super::chunker::Chunk;
use crate::config::AnchorConfig;

static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("valid bold regex"));
static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{1,3}\s+(.+)$").expect("valid heading regex"));
static MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[*_`#]").expect("valid markup regex"));
static ACRONYM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z]{3,})\b").expect("valid acronym regex"));
static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[a-z]{4,}\b").expect("valid word regex"));

pub const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "do",
    "does", "did", "will", "would", "could", "should", "may", "might", "can", "this", "that",
    "these", "those", "it", "its", "not", "no", "if", "then", "than", "when", "while", "as",
    "so", "very", "just", "also", "about", "into", "over", "after", "before", "between",
    "through", "during", "each", "all", "both", "few", "more", "most", "other", "some", "such",
    "only", "same", "too", "any", "up", "out", "new", "now", "way", "we", "our", "you", "your",
    "they", "them", "he", "she", "his", "her", "my", "me", "us", "i", "what", "which", "who",
    "how", "where", "there", "here", "one", "two", "many", "much", "well",
];

static STOPWORD_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOPWORDS.iter().copied().collect());

pub fn is_stopword(term: &str) -> bool {
    STOPWORD_SET.contains(term)
}

/// Length bound shared by bold spans and headings, in characters.
fn phrase_fits(term: &str) -> bool {
    let len = term.chars().count();
    len > 2 && len <= 60
}

/// Bold spans, headings and ALLCAPS acronyms in one text, lowercased.
pub fn extract_from_text(text: &str) -> BTreeSet<String> {
    let mut anchors = BTreeSet::new();

    for cap in BOLD.captures_iter(text) {
        let term = cap[1].trim().to_lowercase();
        if phrase_fits(&term) && !is_stopword(&term) {
            anchors.insert(term);
        }
    }

    for cap in HEADING.captures_iter(text) {
        let heading = MARKUP.replace_all(cap[1].trim(), "");
        let heading = heading.trim().to_lowercase();
        if phrase_fits(&heading) && !is_stopword(&heading) {
            anchors.insert(heading);
        }
    }

    for cap in ACRONYM.captures_iter(text) {
        let term = cap[1].to_lowercase();
        if !is_stopword(&term) {
            anchors.insert(term);
        }
    }

    anchors
}

/// Entity names from `*.md` file stems in `dir`, with `_` and `-` read as spaces.
pub fn entity_names(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("md"))
        .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .map(|stem| stem.replace(['_', '-'], " ").to_lowercase())
        .filter(|name| name.chars().count() > 2)
        .collect();
    names.sort();
    names
}

/// Build the anchor vocabulary for a chunk corpus.
///
/// `entities_dir` is optional; pass `None` to skip entity names. The result is
/// capped at `max_anchors`, keeping multi-word anchors first, then longer ones,
/// then alphabetical order.
pub fn extract_anchors(chunks: &[Chunk], entities_dir: Option<&Path>, config: &AnchorConfig) -> Vec<String> {
    let mut anchors: BTreeSet<String> = BTreeSet::new();
    for chunk in chunks {
        anchors.extend(extract_from_text(&chunk.text));
    }

    let mut doc_freq: HashMap<String, usize> = HashMap::new();
    for chunk in chunks {
        let lower = chunk.text.to_lowercase();
        let words: HashSet<&str> = WORD
            .find_iter(&lower)
            .map(|m| m.as_str())
            .filter(|w| !is_stopword(w))
            .collect();
        for word in words {
            *doc_freq.entry(word.to_string()).or_default() += 1;
        }
    }
    anchors.extend(
        doc_freq
            .into_iter()
            .filter(|(_, df)| *df >= config.min_anchor_df)
            .map(|(word, _)| word),
    );

    if let Some(dir) = entities_dir {
        anchors.extend(entity_names(dir));
    }

    for denied in &config.denylist {
        anchors.remove(&denied.to_lowercase());
    }

    let mut ordered: Vec<String> = anchors.into_iter().collect();
    // BTreeSet order is alphabetical; the stable sort keeps it as the final tie-break
    ordered.sort_by_key(|a| (!a.contains(' '), std::cmp::Reverse(a.chars().count())));
    ordered.truncate(config.max_anchors);
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            path: "memory/x.md".into(),
            start_line: 1,
            source: "memory".into(),
            heading: String::new(),
        }
    }

    #[test]
    fn per_text_sources() {
        let found = extract_from_text("## The **Garden Plan**\nWe use **it** with NASA and **ok**.");
        assert!(found.contains("garden plan"));
        assert!(found.contains("the garden plan"));
        assert!(found.contains("nasa"));
        assert!(!found.contains("it"));
        assert!(!found.contains("ok"));
    }

    #[test]
    fn long_bold_spans_are_ignored() {
        let long = format!("**{}**", "a".repeat(61));
        assert!(extract_from_text(&long).is_empty());
    }

    #[test]
    fn words_need_document_frequency() {
        let chunks = vec![
            chunk("compost bins and tomatoes"),
            chunk("more compost for the beds"),
        ];
        let anchors = extract_anchors(&chunks, None, &AnchorConfig::default());
        assert!(anchors.contains(&"compost".to_string()));
        assert!(!anchors.contains(&"tomatoes".to_string()));
        assert!(!anchors.contains(&"more".to_string()));
    }

    #[test]
    fn denylist_and_cap_prefer_multi_word() {
        let chunks = vec![chunk("**solar panel** **battery** **roof tiles** **inverter**")];
        let config = AnchorConfig {
            min_anchor_df: 2,
            max_anchors: 3,
            denylist: vec!["Battery".into()],
        };
        let anchors = extract_anchors(&chunks, None, &config);
        assert_eq!(anchors, vec!["solar panel", "roof tiles", "inverter"]);
    }

    #[test]
    fn entity_files_become_anchors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ana_maria.md"), "").unwrap();
        std::fs::write(dir.path().join("acme-corp.md"), "").unwrap();
        std::fs::write(dir.path().join("ab.md"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        assert_eq!(entity_names(dir.path()), vec!["acme corp", "ana maria"]);
        let anchors = extract_anchors(&[], Some(dir.path()), &AnchorConfig::default());
        assert_eq!(anchors, vec!["acme corp", "ana maria"]);
    }
}
