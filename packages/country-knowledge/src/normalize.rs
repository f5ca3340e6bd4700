//! Key canonicalization and text cleanup.
//!
//! Pure string transforms. Every key that enters or queries the store goes
//! through [`normalize_key`].

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\[\]]*\]").expect("bracket pattern is valid"));

static TRAILING_MARKERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s*†‡⁰¹²³⁴⁵⁶⁷⁸⁹]+$").expect("marker pattern is valid"));

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Upper-case the first character, leave the rest alone.
pub fn capitalize_first(raw: &str) -> String {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Canonical store key: trimmed, lower-cased, internal whitespace collapsed.
///
/// Idempotent: `normalize_key(&normalize_key(s)) == normalize_key(s)`.
pub fn normalize_key(raw: &str) -> String {
    collapse_whitespace(&raw.to_lowercase())
}

/// Remove bracketed annotations (`[1]`, `[прим. 2]`, `[en]`) anywhere in
/// the text and collapse whitespace.
///
/// Safe for values such as areas, where a trailing `²` is data.
pub fn strip_annotations(raw: &str) -> String {
    let mut text = raw.to_string();
    while BRACKETED.is_match(&text) {
        text = BRACKETED.replace_all(&text, " ").into_owned();
    }
    collapse_whitespace(&text)
}

/// Remove footnote references from a name.
///
/// Everything [`strip_annotations`] removes, plus trailing superscript
/// digits and `*`/`†`/`‡` markers.
pub fn strip_noise(raw: &str) -> String {
    let text = strip_annotations(raw);
    collapse_whitespace(&TRAILING_MARKERS.replace(&text, ""))
}

/// Query-side canonicalizer with an optional synonym table.
///
/// Synonyms map user spellings (e.g. "сша") onto canonical keys that the
/// store actually holds. Only one hop is followed.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    synonyms: HashMap<String, String>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a synonym. Both sides are normalized on insert.
    pub fn with_synonym(mut self, from: &str, to: &str) -> Self {
        self.add_synonym(from, to);
        self
    }

    pub fn add_synonym(&mut self, from: &str, to: &str) {
        let from = normalize_key(from);
        let to = normalize_key(to);
        if !from.is_empty() && !to.is_empty() && from != to {
            self.synonyms.insert(from, to);
        }
    }

    /// Normalize a raw query and apply the synonym table.
    pub fn canonicalize(&self, raw: &str) -> String {
        let key = normalize_key(raw);
        match self.synonyms.get(&key) {
            Some(target) => target.clone(),
            None => key,
        }
    }

    pub fn synonym_count(&self) -> usize {
        self.synonyms.len()
    }
}
