// Generic HTML listing parsing, driven by configured CSS selectors
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::debug;

use crate::config::HtmlSelectors;
use crate::model::{Offer, SourceError};
use crate::scraper::fetcher::build_client;
use crate::scraper::traits::OfferSource;
use crate::utils::parse_price;

pub trait Parser {
    fn parse(&self, html: &str) -> Result<Vec<Offer>, SourceError>;
}

/// Compiled selectors for one shop's result page.
pub struct ListingParser {
    store: String,
    base_url: Option<String>,
    item: Selector,
    name: Selector,
    price: Selector,
    link: Option<Selector>,
    brand: Option<Selector>,
}

fn compile(css: &str) -> Result<Selector, SourceError> {
    Selector::parse(css).map_err(|e| SourceError::Parse(format!("selector '{}': {}", css, e)))
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

impl ListingParser {
    pub fn new(
        store: &str,
        selectors: &HtmlSelectors,
        base_url: Option<String>,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            store: store.to_lowercase(),
            base_url,
            item: compile(&selectors.item)?,
            name: compile(&selectors.name)?,
            price: compile(&selectors.price)?,
            link: selectors.link.as_deref().map(compile).transpose()?,
            brand: selectors.brand.as_deref().map(compile).transpose()?,
        })
    }

    fn absolute(&self, href: &str) -> String {
        match &self.base_url {
            Some(base) if href.starts_with('/') => {
                format!("{}{}", base.trim_end_matches('/'), href)
            }
            _ => href.to_string(),
        }
    }
}

impl Parser for ListingParser {
    fn parse(&self, html: &str) -> Result<Vec<Offer>, SourceError> {
        let document = Html::parse_document(html);
        let mut offers = Vec::new();

        for element in document.select(&self.item) {
            let Some(name) = element.select(&self.name).next().map(text_of) else {
                continue;
            };
            if name.is_empty() {
                continue;
            }

            let price = element
                .select(&self.price)
                .next()
                .map(text_of)
                .and_then(|t| parse_price(&t));

            let url = self.link.as_ref().and_then(|sel| {
                let node = element.select(sel).next()?;
                node.value().attr("href").map(|href| self.absolute(href))
            });

            let brand = self
                .brand
                .as_ref()
                .and_then(|sel| element.select(sel).next())
                .map(text_of)
                .filter(|b| !b.is_empty());

            let mut offer = Offer::new(&self.store, name, price);
            offer.url = url;
            offer.brand = brand;
            offers.push(offer);
        }

        Ok(offers)
    }
}

/// Source that fetches a search page and parses it with a [`ListingParser`].
pub struct HtmlListingSource {
    client: Client,
    url: String,
    query_param: String,
    parser: ListingParser,
}

impl HtmlListingSource {
    pub fn new(
        name: &str,
        url: &str,
        query_param: &str,
        parser: ListingParser,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        debug!("Building HTML source '{}' for {}", name, url);
        Ok(Self {
            client: build_client(timeout)?,
            url: url.to_string(),
            query_param: query_param.to_string(),
            parser,
        })
    }
}

#[async_trait::async_trait]
impl OfferSource for HtmlListingSource {
    fn name(&self) -> &str {
        &self.parser.store
    }

    async fn search(&self, query: &str) -> Result<Vec<Offer>, SourceError> {
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

        let html = response.text().await?;
        self.parser.parse(&html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn selectors() -> HtmlSelectors {
        HtmlSelectors {
            item: "article.product".into(),
            name: "h3.title".into(),
            price: "span.price".into(),
            link: Some("a.details".into()),
            brand: Some(".brand".into()),
        }
    }

    const PAGE: &str = r#"
        <html><body>
          <article class="product">
            <h3 class="title">Leche   Entera <b>1L</b></h3>
            <span class="brand">Pascual</span>
            <span class="price">1,15 €</span>
            <a class="details" href="/p/123">ver</a>
          </article>
          <article class="product">
            <h3 class="title">Leche Desnatada</h3>
            <span class="price">consultar</span>
          </article>
          <article class="product">
            <span class="price">2,00 €</span>
          </article>
        </body></html>
    "#;

    #[test]
    fn parses_items_with_optional_fields() {
        let parser =
            ListingParser::new("Dia", &selectors(), Some("https://www.dia.test/".into())).unwrap();
        let offers = parser.parse(PAGE).unwrap();
        assert_eq!(offers.len(), 2);

        assert_eq!(offers[0].store, "dia");
        assert_eq!(offers[0].name, "Leche Entera 1L");
        assert_eq!(offers[0].price, Some(dec!(1.15)));
        assert_eq!(offers[0].brand.as_deref(), Some("Pascual"));
        assert_eq!(offers[0].url.as_deref(), Some("https://www.dia.test/p/123"));

        assert_eq!(offers[1].price, None);
        assert_eq!(offers[1].url, None);
    }

    #[test]
    fn invalid_selector_is_rejected() {
        let mut bad = selectors();
        bad.item = "article[".into();
        assert!(matches!(
            ListingParser::new("x", &bad, None),
            Err(SourceError::Parse(_))
        ));
    }
}
