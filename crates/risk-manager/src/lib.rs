pub mod classifier;
pub mod models;

pub use classifier::{risk_score, RiskClassifier};
pub use models::*;
