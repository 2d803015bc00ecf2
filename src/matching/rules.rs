use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

use crate::config::CategoryRule;
use crate::normalizer::{dedup_ordered, normalize_text};

/// Category terms after normalization. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryTerms {
    pub base: Vec<String>,
    pub optional: Vec<String>,
    pub forbidden: Vec<String>,
}

/// Which terms of one category a token set hit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleMatch {
    pub matched_base: Vec<String>,
    pub matched_optional: Vec<String>,
    pub matched_forbidden: Vec<String>,
}

pub type MatchedRules = BTreeMap<String, RuleMatch>;

#[derive(Debug, Clone, Default)]
pub struct CategoryRuleEngine {
    categories: BTreeMap<String, CategoryTerms>,
}

impl CategoryRuleEngine {
    pub fn new(rules: &BTreeMap<String, CategoryRule>) -> Self {
        let mut categories = BTreeMap::new();
        for (code, rule) in rules {
            let terms = CategoryTerms {
                base: normalize_terms(&rule.base_terms),
                optional: normalize_terms(&rule.optional_terms),
                forbidden: normalize_terms(&rule.forbidden_terms),
            };

            let overlap: Vec<&String> = terms
                .base
                .iter()
                .filter(|t| terms.forbidden.contains(t))
                .collect();
            if !overlap.is_empty() {
                warn!("Category '{}' lists {:?} as both base and forbidden", code, overlap);
            }

            categories.insert(code.clone(), terms);
        }
        Self { categories }
    }

    pub fn get(&self, code: &str) -> Option<&CategoryTerms> {
        self.categories.get(code)
    }

    /// Every category whose base terms intersect `tokens`, with the hits
    /// of each term list in configured order.
    pub fn match_categories<'a, I>(&self, tokens: I) -> MatchedRules
    where
        I: IntoIterator<Item = &'a str>,
    {
        let token_set: HashSet<&str> = tokens.into_iter().collect();
        let hits = |terms: &[String]| -> Vec<String> {
            terms
                .iter()
                .filter(|t| token_set.contains(t.as_str()))
                .cloned()
                .collect()
        };

        self.categories
            .iter()
            .filter_map(|(code, terms)| {
                let matched_base = hits(&terms.base);
                if matched_base.is_empty() {
                    return None;
                }
                Some((
                    code.clone(),
                    RuleMatch {
                        matched_base,
                        matched_optional: hits(&terms.optional),
                        matched_forbidden: hits(&terms.forbidden),
                    },
                ))
            })
            .collect()
    }
}

fn normalize_terms(terms: &[String]) -> Vec<String> {
    dedup_ordered(
        terms
            .iter()
            .map(|t| normalize_text(t))
            .filter(|t| !t.is_empty()),
    )
}
