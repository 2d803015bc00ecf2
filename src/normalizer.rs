use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::warn;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Accent-free, lowercase, punctuation-free form of `text`.
///
/// Only `[a-z0-9% ]` survives, with single spaces between words. Total and
/// idempotent; empty input yields an empty string.
pub fn normalize_text(text: &str) -> String {
    let folded: String = text
        .trim()
        .to_lowercase()
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '%' => c,
            _ => ' ',
        })
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text normalization plus a whole-string synonym table.
#[derive(Debug, Clone, Default)]
pub struct TextNormalizer {
    synonyms: HashMap<String, String>,
}

impl TextNormalizer {
    /// Builds a normalizer from a raw synonym table.
    ///
    /// Keys and values are normalized, and chains (`a -> b`, `b -> c`) are
    /// collapsed so every value is a fixed point of the table.
    pub fn new(synonyms: &BTreeMap<String, String>) -> Self {
        let mut table: HashMap<String, String> = HashMap::new();
        for (alias, canonical) in synonyms {
            let alias = normalize_text(alias);
            let canonical = normalize_text(canonical);
            if alias.is_empty() || canonical.is_empty() {
                continue;
            }
            table.insert(alias, canonical);
        }

        let resolved = table
            .keys()
            .map(|alias| (alias.clone(), Self::resolve_chain(&table, alias)))
            .collect();

        Self { synonyms: resolved }
    }

    fn resolve_chain(table: &HashMap<String, String>, start: &str) -> String {
        let mut seen: Vec<&str> = vec![start];
        let mut current = start;
        while let Some(next) = table.get(current) {
            if next == current {
                break;
            }
            if seen.contains(&next.as_str()) {
                // Cycle: settle on the smallest member so every member agrees.
                let pick = seen.iter().copied().min().unwrap_or(start);
                warn!("Synonym cycle through '{}', using '{}'", start, pick);
                return pick.to_string();
            }
            seen.push(next);
            current = next;
        }
        current.to_string()
    }

    /// Normalizes `text` and maps it to its canonical synonym, if any.
    pub fn normalize(&self, text: &str) -> String {
        let base = normalize_text(text);
        match self.synonyms.get(&base) {
            Some(canonical) => canonical.clone(),
            None => base,
        }
    }

    /// Normalizes without synonym substitution.
    pub fn normalize_plain(&self, text: &str) -> String {
        normalize_text(text)
    }

    /// Whitespace tokens of the synonym-resolved form.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        self.normalize(text)
            .split(' ')
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Removes duplicates, keeping the first occurrence of each token.
pub fn dedup_ordered<I>(tokens: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    tokens
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect()
}
