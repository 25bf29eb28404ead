pub mod alerts;
pub mod config;
pub mod cycle;
pub mod element_finder;
pub mod extractor;
pub mod fetch;
pub mod ingest;
pub mod models;
pub mod plugins;
pub mod price;
pub mod refresh;
pub mod scheduler;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use alerts::AlertComposer;
pub use config::AppConfig;
pub use cycle::{CycleOrchestrator, CycleReport};
pub use extractor::PriceExtractor;
pub use ingest::CommandIngestor;
pub use refresh::PriceRefresher;
pub use store::ProductStore;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
