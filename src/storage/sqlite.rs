use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;

use crate::basket::catalog::{Catalog, PriceRow, ProductId, StoreId};
use crate::model::{CatalogError, Offer};
use crate::normalizer::normalize_text;

/// A stored price with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRecord {
    pub product: String,
    pub store: String,
    pub price: Decimal,
    pub url: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

/// SQLite-backed catalog of products, stores and prices.
///
/// Names are looked up by their normalized form, computed by the caller so
/// the same synonym table applies on both sides.
pub struct SqliteCatalog {
    conn: Connection,
}

impl SqliteCatalog {
    /// Opens the database file, creating the schema if needed.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        Self::with_connection(Connection::open(db_path)?)
    }

    pub fn open_in_memory() -> Result<Self, CatalogError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, CatalogError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                normalized_name TEXT NOT NULL,
                category TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_products_normalized ON products(normalized_name);

            CREATE TABLE IF NOT EXISTS stores (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                normalized_name TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_stores_normalized ON stores(normalized_name);

            CREATE TABLE IF NOT EXISTS prices (
                product_id INTEGER NOT NULL REFERENCES products(id),
                store_id INTEGER NOT NULL REFERENCES stores(id),
                price TEXT NOT NULL,
                url TEXT,
                fetched_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_prices_pair ON prices(product_id, store_id);
            ",
        )?;

        Ok(Self { conn })
    }

    /// Inserts a product unless one with the same normalized name exists.
    pub fn add_product(
        &self,
        name: &str,
        normalized_name: &str,
        category: Option<&str>,
    ) -> Result<ProductId, CatalogError> {
        if let Some(id) = self.resolve_item(normalized_name)? {
            return Ok(id);
        }
        self.conn.execute(
            "INSERT INTO products (name, normalized_name, category) VALUES (?1, ?2, ?3)",
            params![name, normalized_name, category],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Inserts a store unless one with the same normalized name exists.
    pub fn add_store(&self, name: &str) -> Result<StoreId, CatalogError> {
        let normalized = normalize_text(name);
        if let Some(id) = self.resolve_store(&normalized)? {
            return Ok(id);
        }
        self.conn.execute(
            "INSERT INTO stores (name, normalized_name) VALUES (?1, ?2)",
            params![name, normalized],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Appends a price row. Existing rows for the pair are kept.
    pub fn add_price(
        &self,
        product_id: ProductId,
        store_id: StoreId,
        price: Decimal,
        url: Option<&str>,
    ) -> Result<(), CatalogError> {
        if price < Decimal::ZERO {
            return Err(CatalogError::NegativePrice(price));
        }
        self.conn.execute(
            "INSERT INTO prices (product_id, store_id, price, url, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![product_id, store_id, price.to_string(), url, Utc::now()],
        )?;
        Ok(())
    }

    /// Replaces the stored price of (product, store) with a fresh one.
    pub fn record_price(
        &mut self,
        product_id: ProductId,
        store_id: StoreId,
        price: Decimal,
        url: Option<&str>,
    ) -> Result<(), CatalogError> {
        if price < Decimal::ZERO {
            return Err(CatalogError::NegativePrice(price));
        }
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM prices WHERE product_id = ?1 AND store_id = ?2",
            params![product_id, store_id],
        )?;
        tx.execute(
            "INSERT INTO prices (product_id, store_id, price, url, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![product_id, store_id, price.to_string(), url, Utc::now()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Stores `offer` as the current price of the shopping item.
    ///
    /// Returns `false` when the offer has no price and nothing was written.
    pub fn record_offer(
        &mut self,
        item_name: &str,
        normalized_item: &str,
        category: Option<&str>,
        offer: &Offer,
    ) -> Result<bool, CatalogError> {
        let Some(price) = offer.price else {
            return Ok(false);
        };
        let product_id = self.add_product(item_name, normalized_item, category)?;
        let store_id = self.add_store(&offer.store)?;
        self.record_price(product_id, store_id, price, offer.url.as_deref())?;
        Ok(true)
    }

    /// Latest price rows, newest first.
    pub fn latest_prices(&self, limit: usize) -> Result<Vec<PriceRecord>, CatalogError> {
        let mut stmt = self.conn.prepare(
            "SELECT p.name, s.name, pr.price, pr.url, pr.fetched_at, pr.product_id, pr.store_id
             FROM prices pr
             JOIN products p ON p.id = pr.product_id
             JOIN stores s ON s.id = pr.store_id
             ORDER BY pr.fetched_at DESC, pr.rowid DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, DateTime<Utc>>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, i64>(6)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (product, store, price_text, url, fetched_at, product_id, store_id) = row?;
            records.push(PriceRecord {
                product,
                store,
                price: parse_stored_price(&price_text, product_id, store_id)?,
                url,
                fetched_at,
            });
        }
        Ok(records)
    }
}

fn parse_stored_price(
    text: &str,
    product_id: ProductId,
    store_id: StoreId,
) -> Result<Decimal, CatalogError> {
    Decimal::from_str(text).map_err(|_| CatalogError::CorruptPrice {
        product_id,
        store_id,
        value: text.to_string(),
    })
}

impl Catalog for SqliteCatalog {
    fn resolve_item(&self, normalized_name: &str) -> Result<Option<ProductId>, CatalogError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id FROM products WHERE normalized_name = ?1 ORDER BY id LIMIT 1",
                params![normalized_name],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn resolve_store(&self, normalized_name: &str) -> Result<Option<StoreId>, CatalogError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id FROM stores WHERE normalized_name = ?1 ORDER BY id LIMIT 1",
                params![normalized_name],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn prices_for(
        &self,
        products: &[ProductId],
        stores: &[StoreId],
    ) -> Result<Vec<PriceRow>, CatalogError> {
        if products.is_empty() || stores.is_empty() {
            return Ok(Vec::new());
        }

        let product_marks = vec!["?"; products.len()].join(",");
        let store_marks = vec!["?"; stores.len()].join(",");
        let sql = format!(
            "SELECT product_id, store_id, price FROM prices
             WHERE product_id IN ({}) AND store_id IN ({})",
            product_marks, store_marks
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let ids = products.iter().chain(stores.iter());
        let rows = stmt.query_map(params_from_iter(ids), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut result = Vec::new();
        for row in rows {
            let (product_id, store_id, price_text) = row?;
            result.push(PriceRow {
                product_id,
                store_id,
                price: parse_stored_price(&price_text, product_id, store_id)?,
            });
        }
        Ok(result)
    }
}
