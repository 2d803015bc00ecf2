use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::model::{Offer, SourceError};
use crate::scraper::traits::OfferSource;
use crate::utils::price_from_json;

pub(crate) const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) GrocerySniperBot/0.1";

/// Listing shape accepted from JSON endpoints and fixture files.
#[derive(Debug, Clone, Deserialize)]
pub struct RawListing {
    #[serde(alias = "title", alias = "display_name")]
    pub name: String,
    #[serde(default)]
    pub price: serde_json::Value,
    #[serde(default)]
    pub store: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default, alias = "link", alias = "share_url")]
    pub url: Option<String>,
    #[serde(default, alias = "thumbnail")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, alias = "subcategory")]
    pub description: Option<String>,
}

impl RawListing {
    pub fn into_offer(self, source: &str) -> Offer {
        let price = price_from_json(&self.price);
        Offer {
            store: self.store.unwrap_or_else(|| source.to_string()),
            name: self.name.trim().to_string(),
            brand: self.brand,
            price,
            url: self.url,
            image_url: self.image_url,
            category: self.category,
            description: self.description,
            normalized_name: None,
        }
    }
}

/// Extracts listings from a JSON body, optionally below `items_pointer`.
pub fn listings_from_json(
    body: &serde_json::Value,
    items_pointer: Option<&str>,
) -> Result<Vec<RawListing>, SourceError> {
    let items = match items_pointer {
        Some(pointer) => body.pointer(pointer).ok_or_else(|| {
            SourceError::InvalidResponse(format!("no value at pointer '{}'", pointer))
        })?,
        None => body,
    };
    let array = items
        .as_array()
        .ok_or_else(|| SourceError::InvalidResponse("expected a JSON array".to_string()))?;

    // Entries that don't look like listings are skipped, not fatal.
    Ok(array
        .iter()
        .filter_map(|item| serde_json::from_value::<RawListing>(item.clone()).ok())
        .collect())
}

pub(crate) fn build_client(timeout: Duration) -> Result<Client, SourceError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(SourceError::from)
}

/// Source backed by a JSON search endpoint: `GET url?{query_param}={query}`.
pub struct HttpJsonSource {
    name: String,
    client: Client,
    url: String,
    query_param: String,
    items_pointer: Option<String>,
}

impl HttpJsonSource {
    pub fn new(
        name: &str,
        url: &str,
        query_param: &str,
        items_pointer: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            name: name.to_lowercase(),
            client: build_client(timeout)?,
            url: url.to_string(),
            query_param: query_param.to_string(),
            items_pointer,
        })
    }
}

#[async_trait::async_trait]
impl OfferSource for HttpJsonSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, query: &str) -> Result<Vec<Offer>, SourceError> {
        debug!("{}: GET {} ({}={})", self.name, self.url, self.query_param, query);
        let response = self
            .client
            .get(&self.url)
            .query(&[(self.query_param.as_str(), query)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SourceError::InvalidResponse(format!(
                "status {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response.json().await?;
        let listings = listings_from_json(&body, self.items_pointer.as_deref())?;
        Ok(listings
            .into_iter()
            .map(|l| l.into_offer(&self.name))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn reads_listings_below_pointer() {
        let body = json!({
            "hits": [
                { "display_name": "Leche Entera Hacendado", "price": "0,89 €", "share_url": "https://shop.test/1" },
                { "name": "Leche Semi", "price": 0.95, "subcategory": "Leche y bebidas" },
                { "price": 1.0 },
                { "title": "Leche sin precio" }
            ]
        });
        let listings = listings_from_json(&body, Some("/hits")).unwrap();
        assert_eq!(listings.len(), 3);

        let offers: Vec<Offer> = listings.into_iter().map(|l| l.into_offer("mercadona")).collect();
        assert_eq!(offers[0].price, Some(dec!(0.89)));
        assert_eq!(offers[0].url.as_deref(), Some("https://shop.test/1"));
        assert_eq!(offers[1].description.as_deref(), Some("Leche y bebidas"));
        assert_eq!(offers[2].price, None);
        assert!(offers.iter().all(|o| o.store == "mercadona"));
    }

    #[test]
    fn missing_pointer_is_an_invalid_response() {
        let err = listings_from_json(&json!({ "data": [] }), Some("/hits"));
        assert!(matches!(err, Err(SourceError::InvalidResponse(_))));
        let err = listings_from_json(&json!({ "hits": 3 }), Some("/hits"));
        assert!(matches!(err, Err(SourceError::InvalidResponse(_))));
    }
}
