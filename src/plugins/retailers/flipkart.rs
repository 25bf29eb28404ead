use crate::plugins::traits::retailer::host_has_brand;
use crate::plugins::traits::RetailerPlugin;

// Flipkart ships obfuscated class names; current layout first, older ones after.
const TITLE_SELECTORS: &[&str] = &["span.VU-ZEz", "h1.yhB1nd", "span.B_NuCI", "h1._9E25nV"];

const PRICE_SELECTORS: &[&str] = &[
    "div.Nx9bqj.CxhGGd",
    "div._30jeq3._16Jk6d",
    "div._30jeq3",
    "div.Nx9bqj",
];

#[derive(Default)]
pub struct FlipkartRetailer;

impl FlipkartRetailer {
    pub fn new() -> Self {
        FlipkartRetailer
    }
}

impl RetailerPlugin for FlipkartRetailer {
    fn name(&self) -> &str {
        "Flipkart"
    }

    fn plugin_type(&self) -> &str {
        "flipkart"
    }

    fn matches_host(&self, host: &str) -> bool {
        host_has_brand(host, "flipkart")
    }

    fn title_selectors(&self) -> &[&'static str] {
        TITLE_SELECTORS
    }

    fn price_selectors(&self) -> &[&'static str] {
        PRICE_SELECTORS
    }
}
