// Core structs: Offer, ScoredOffer, error types
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::normalizer::normalize_text;

/// One candidate listing returned by one source for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub store: String,
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    /// `None` when the source could not produce a usable price.
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Category label as declared by the source, not our category code.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub normalized_name: Option<String>,
}

impl Offer {
    pub fn new(store: impl Into<String>, name: impl Into<String>, price: Option<Decimal>) -> Self {
        Self {
            store: store.into(),
            name: name.into(),
            brand: None,
            price,
            url: None,
            image_url: None,
            category: None,
            description: None,
            normalized_name: None,
        }
    }

    /// Normalized title, computed on demand when the source did not set one.
    pub fn normalized_name(&self) -> String {
        match &self.normalized_name {
            Some(n) => n.clone(),
            None => normalize_text(&self.name),
        }
    }

    /// Name, declared category and description folded into one normalized blob.
    pub fn search_blob(&self) -> String {
        let parts = [
            self.name.as_str(),
            self.category.as_deref().unwrap_or(""),
            self.description.as_deref().unwrap_or(""),
        ];
        normalize_text(&parts.join(" "))
    }
}

/// An offer that survived the hard filters, with its soft score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredOffer {
    pub offer: Offer,
    pub score: f64,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("http error: {0}")]
    HttpError(String),
    #[error("source timed out")]
    Timeout,
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SourceError::Timeout
        } else {
            SourceError::HttpError(e.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("corrupt price '{value}' for product {product_id} at store {store_id}")]
    CorruptPrice {
        product_id: i64,
        store_id: i64,
        value: String,
    },
    #[error("negative price {0}")]
    NegativePrice(Decimal),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}
