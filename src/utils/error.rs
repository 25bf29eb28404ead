use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Per-product failure while turning a page into `{name, price}`.
///
/// Never fatal to a cycle: the record keeps its stale price and is retried
/// on the next scheduled run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("unsupported retailer: {host}")]
    UnsupportedRetailer { host: String },

    #[error("network failure: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),

    #[error("element not found: {field}")]
    ElementNotFound { field: String },

    #[error("malformed price text: {text:?}")]
    MalformedPrice { text: String },
}

impl ExtractionError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExtractionError::Timeout
        } else if let Some(status) = err.status() {
            ExtractionError::HttpStatus(status.as_u16())
        } else {
            ExtractionError::Network(err.to_string())
        }
    }
}

/// A malformed inbound chat command. Skipped, never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("target price must be a positive number, got {0:?}")]
    InvalidTargetPrice(String),

    #[error("unsupported retailer: {0}")]
    UnsupportedRetailer(String),

    #[error("no product #{index} (watchlist has {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

impl From<validator::ValidationErrors> for ValidationError {
    fn from(err: validator::ValidationErrors) -> Self {
        ValidationError::InvalidUrl(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.into())
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("no tracked product with url {url}")]
    NotFound { url: String },

    #[error("product already tracked: {url}")]
    Duplicate { url: String },

    #[error("corrupt value in column {column}: {value:?}")]
    Corrupt { column: &'static str, value: String },
}

/// Chat transport failure. The payload of the failed send is lost for the
/// cycle.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat API rejected request: {description}")]
    Api { description: String },
}

pub type Result<T> = std::result::Result<T, AppError>;
