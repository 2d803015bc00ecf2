pub mod listing_parser;

pub use listing_parser::{HtmlListingSource, ListingParser, Parser};
