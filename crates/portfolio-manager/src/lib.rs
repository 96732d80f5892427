pub mod aggregator;
pub mod db;
pub mod import;
pub mod models;
pub mod portfolio;

pub use aggregator::PortfolioAggregator;
pub use db::SentimentStore;
pub use import::parse_portfolio_csv;
pub use models::*;
pub use portfolio::{validate_holdings, weight_sum, Portfolio, WEIGHT_TOLERANCE};
