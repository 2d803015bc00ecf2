use serde::Serialize;
use std::sync::Arc;

use crate::matching::rules::{CategoryRuleEngine, MatchedRules};
use crate::normalizer::{TextNormalizer, dedup_ordered};

/// Canonical description of what the user is shopping for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductSpec {
    pub raw_name: String,
    /// Deduplicated, in first-seen order.
    pub tokens: Vec<String>,
    pub brand: Option<String>,
    /// Opaque hint from the caller, not checked against the rule table.
    pub category: Option<String>,
    pub variants: Vec<String>,
    pub matched_rules: MatchedRules,
}

impl ProductSpec {
    /// Query sent to offer sources: brand first, then name, then variants.
    pub fn search_query(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(brand) = &self.brand {
            parts.push(brand);
        }
        parts.push(self.raw_name.trim());
        parts.extend(self.variants.iter().map(String::as_str));
        parts
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct ProductSpecBuilder {
    normalizer: Arc<TextNormalizer>,
    rules: Arc<CategoryRuleEngine>,
}

impl ProductSpecBuilder {
    pub fn new(normalizer: Arc<TextNormalizer>, rules: Arc<CategoryRuleEngine>) -> Self {
        Self { normalizer, rules }
    }

    pub fn build(
        &self,
        name: &str,
        brand: Option<&str>,
        category: Option<&str>,
        variants: &[String],
    ) -> ProductSpec {
        let variants: Vec<String> = variants
            .iter()
            .map(|v| self.normalizer.normalize_plain(v))
            .filter(|v| !v.is_empty())
            .collect();

        let name_tokens = self.normalizer.tokenize(name);
        let variant_tokens = variants
            .iter()
            .flat_map(|v| v.split(' ').map(str::to_string));
        let tokens = dedup_ordered(name_tokens.into_iter().chain(variant_tokens));

        let matched_rules = self.rules.match_categories(tokens.iter().map(String::as_str));

        let brand = brand
            .map(|b| self.normalizer.normalize_plain(b))
            .filter(|b| !b.is_empty());

        ProductSpec {
            raw_name: name.to_string(),
            tokens,
            brand,
            category: category.map(str::to_string),
            variants,
            matched_rules,
        }
    }
}
