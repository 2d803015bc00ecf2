use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::model::ConfigError;

/// Term lists for one category code. Terms are normalized when the rule
/// engine is built.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryRule {
    #[serde(default)]
    pub base_terms: Vec<String>,
    #[serde(default)]
    pub optional_terms: Vec<String>,
    #[serde(default)]
    pub forbidden_terms: Vec<String>,
}

impl CategoryRule {
    fn new(base: &[&str], forbidden: &[&str]) -> Self {
        Self {
            base_terms: base.iter().map(|s| s.to_string()).collect(),
            optional_terms: Vec::new(),
            forbidden_terms: forbidden.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub category: f64,
    pub brand: f64,
    pub variant: f64,
    pub token_overlap: f64,
    pub price_bonus: f64,
    pub irrelevant_penalty: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            category: 40.0,
            brand: 25.0,
            variant: 10.0,
            token_overlap: 1.0,
            price_bonus: 3.0,
            irrelevant_penalty: -20.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub synonyms: BTreeMap<String, String>,
    pub categories: BTreeMap<String, CategoryRule>,
    pub weights: ScoringWeights,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            synonyms: default_synonyms(),
            categories: default_categories(),
            weights: ScoringWeights::default(),
        }
    }
}

fn default_synonyms() -> BTreeMap<String, String> {
    [
        ("capsicum", "bell pepper"),
        ("sweet pepper", "bell pepper"),
        ("aubergine", "eggplant"),
        ("courgette", "zucchini"),
        ("coriander", "cilantro"),
        ("fresh coriander", "cilantro"),
        ("rocket", "arugula"),
        ("rocket lettuce", "arugula"),
        ("scallion", "green onion"),
        ("spring onion", "green onion"),
        ("minced beef", "ground beef"),
        ("minced turkey", "ground turkey"),
        ("icecream", "ice cream"),
        ("hotdog", "hot dog"),
        ("frankfurter", "hot dog"),
        ("tomato sauce", "ketchup"),
        ("catsup", "ketchup"),
    ]
    .into_iter()
    .map(|(a, b)| (a.to_string(), b.to_string()))
    .collect()
}

fn default_categories() -> BTreeMap<String, CategoryRule> {
    let mut categories = BTreeMap::new();
    categories.insert(
        "milk".to_string(),
        CategoryRule::new(
            &["leche", "milk"],
            &[
                "chocolate", "cacao", "batido", "cappuccino", "espresso", "fruta", "tropical",
                "mediterraneo", "caribe", "cereales", "galletas", "rellenos", "facial",
                "corporal", "limpiadora", "polvo", "powder", "lactantes", "continuacion",
                "infantil",
            ],
        ),
    );
    categories.insert(
        "eggs".to_string(),
        CategoryRule::new(
            &["huevo", "huevos", "egg", "eggs"],
            &["chocolate", "pascua", "mona", "caramelo", "bombon"],
        ),
    );
    categories.insert(
        "bread".to_string(),
        CategoryRule::new(
            &["pan", "bread"],
            &["galletas", "bolleria", "bizcocho", "magdalenas"],
        ),
    );
    categories
}

#[derive(Debug, Clone, Deserialize)]
pub struct HtmlSelectors {
    pub item: String,
    pub name: String,
    pub price: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceKind {
    /// Search endpoint answering with a JSON array of listings.
    Json {
        url: String,
        #[serde(default = "default_query_param")]
        query_param: String,
        /// JSON pointer to the listing array, e.g. `/hits`.
        #[serde(default)]
        items_pointer: Option<String>,
    },
    /// Search page scraped with CSS selectors.
    Html {
        url: String,
        #[serde(default = "default_query_param")]
        query_param: String,
        #[serde(default)]
        base_url: Option<String>,
        selectors: HtmlSelectors,
    },
    /// Local JSON file of listings, filtered by query tokens.
    File { path: String },
}

fn default_query_param() -> String {
    "q".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    #[serde(flatten)]
    pub kind: SourceKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShoppingItemConfig {
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub variants: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShoppingListConfig {
    pub name: String,
    #[serde(default)]
    pub stores: Vec<String>,
    pub items: Vec<ShoppingItemConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,
    #[serde(default = "default_source_timeout")]
    pub source_timeout_ms: u64,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub shopping_lists: Vec<ShoppingListConfig>,
}

fn default_database_path() -> String {
    "data.db".to_string()
}

fn default_check_interval() -> u64 {
    3600
}

fn default_source_timeout() -> u64 {
    10_000
}

fn default_top_k() -> usize {
    5
}

pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = serde_json::from_str(content)?;
    Ok(config)
}

pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = parse_config("{}").unwrap();
        assert_eq!(config.database_path, "data.db");
        assert_eq!(config.top_k, 5);
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.matching.categories.contains_key("milk"));
        assert_eq!(config.matching.weights.category, 40.0);
        assert!(config.sources.is_empty());
    }

    #[test]
    fn parses_sources_and_lists() {
        let config = parse_config(
            r#"{
                "source_timeout_ms": 2500,
                "matching": { "weights": { "brand": 30 } },
                "sources": [
                    { "name": "mercadona", "kind": "json", "url": "https://example.test/search", "items_pointer": "/hits" },
                    { "name": "dia", "kind": "html", "url": "https://example.test/buscar",
                      "selectors": { "item": "div.product", "name": "h2", "price": ".price" } },
                    { "name": "local", "kind": "file", "path": "offers.json" }
                ],
                "shopping_lists": [
                    { "name": "weekly", "stores": ["Mercadona"], "items": [{ "name": "Leche", "variants": ["entera"] }] }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.source_timeout_ms, 2500);
        assert_eq!(config.matching.weights.brand, 30.0);
        assert_eq!(config.matching.weights.variant, 10.0);
        assert_eq!(config.sources.len(), 3);
        match &config.sources[0].kind {
            SourceKind::Json { query_param, items_pointer, .. } => {
                assert_eq!(query_param, "q");
                assert_eq!(items_pointer.as_deref(), Some("/hits"));
            }
            other => panic!("unexpected kind {other:?}"),
        }
        assert!(matches!(config.sources[1].kind, SourceKind::Html { .. }));
        assert!(matches!(config.sources[2].kind, SourceKind::File { .. }));
        assert_eq!(config.shopping_lists[0].items[0].variants, vec!["entera"]);
    }

    #[test]
    fn rejects_unknown_source_kind() {
        let err = parse_config(r#"{ "sources": [{ "name": "x", "kind": "ftp" }] }"#);
        assert!(matches!(err, Err(ConfigError::Json(_))));
    }
}
