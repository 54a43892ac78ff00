pub mod html;
pub mod scraper;
pub mod search;

pub use scraper::HttpScraper;
pub use search::{create_search_provider, DuckDuckGoSearch, TavilySearch};
