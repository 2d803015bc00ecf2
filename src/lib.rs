pub mod basket;
pub mod config;
pub mod matching;
pub mod model;
pub mod normalizer;
pub mod parser;
pub mod refresh;
pub mod scraper;
pub mod storage;
pub mod utils;
