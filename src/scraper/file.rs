use std::collections::HashSet;
use std::path::PathBuf;
use tracing::debug;

use crate::model::{Offer, SourceError};
use crate::normalizer::normalize_text;
use crate::scraper::fetcher::listings_from_json;
use crate::scraper::traits::OfferSource;

/// Serves listings from a local JSON file, keeping those that share at
/// least one word with the query. Useful offline and for demos.
pub struct JsonFileSource {
    name: String,
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(name: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_lowercase(),
            path: path.into(),
        }
    }
}

#[async_trait::async_trait]
impl OfferSource for JsonFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, query: &str) -> Result<Vec<Offer>, SourceError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let body: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| SourceError::Parse(e.to_string()))?;

        let wanted: HashSet<String> = normalize_text(query)
            .split(' ')
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();

        let offers: Vec<Offer> = listings_from_json(&body, None)?
            .into_iter()
            .map(|l| l.into_offer(&self.name))
            .filter(|o| {
                wanted.is_empty() || o.normalized_name().split(' ').any(|w| wanted.contains(w))
            })
            .collect();

        debug!("{}: {} listings match '{}'", self.name, offers.len(), query);
        Ok(offers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn filters_by_query_words() {
        let path = std::env::temp_dir().join(format!("grocery-sniper-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"[
                { "name": "Leche Entera", "price": 0.89, "store": "Mercadona" },
                { "name": "Pan de molde", "price": "1,20" },
                { "name": "Leche de avena", "price": 1.49 }
            ]"#,
        )
        .unwrap();

        let source = JsonFileSource::new("Local", &path);
        let offers = source.search("LECHE").await.unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(offers.len(), 2);
        assert_eq!(offers[0].store, "Mercadona");
        assert_eq!(offers[1].store, "local");
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let source = JsonFileSource::new("gone", "/definitely/not/here.json");
        assert!(matches!(source.search("x").await, Err(SourceError::Io(_))));
    }
}
