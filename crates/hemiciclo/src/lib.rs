pub mod browser;
pub mod config;
pub mod enrich;
pub mod graph;
pub mod pagination;
pub mod parser;
pub mod plenary;
pub mod scraper;
pub mod store;
pub mod types;
pub mod utils;

pub use browser::{BrowserSession, ChromeSession};
pub use scraper::{CongresoScraper, ScraperError};

pub const BASE_URL: &str = "https://www.congreso.es";
