// Retailer plugin implementations
pub mod amazon;
pub mod flipkart;

pub use amazon::AmazonRetailer;
pub use flipkart::FlipkartRetailer;
