pub mod sqlite;

pub use sqlite::{PriceRecord, SqliteCatalog};
