pub mod retailer;
pub mod transport;

pub use retailer::{ProductInfo, RetailerPlugin};
pub use transport::ChatTransport;
