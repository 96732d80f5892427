pub mod aggregator;
pub mod ingest;
pub mod scoring;
pub mod weights;

pub use aggregator::{
    AggregationMethod, CountThreshold, TickerAggregator, WeightedMean, WeightedMedian,
    DEFAULT_MIN_ARTICLES,
};
pub use ingest::{
    validate_article, ArticleIngestor, IngestRejection, IngestReport, RawArticleSentiment,
    RejectedArticle,
};
pub use scoring::{ConfidenceScaledMapping, DiscreteMapping, ScoreMappingKind};
pub use weights::{normalize_source, RecencyBucket, WeightTable};
