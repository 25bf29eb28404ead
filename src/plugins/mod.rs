pub mod traits;
pub mod manager;
pub mod retailers;
pub mod transports;

pub use manager::RetailerRegistry;
pub use traits::{ChatTransport, ProductInfo, RetailerPlugin};
