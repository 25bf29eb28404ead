use crate::plugins::traits::retailer::host_has_brand;
use crate::plugins::traits::RetailerPlugin;

const TITLE_SELECTORS: &[&str] = &["span#productTitle"];

// Deal and "price to pay" blocks render before the struck-through list price.
const PRICE_SELECTORS: &[&str] = &[
    "span.a-price-whole",
    "span#priceblock_dealprice",
    "span#priceblock_ourprice",
    "span.a-offscreen",
    "div#corePrice_feature_div span.a-price-whole",
    "span.priceToPay span.a-price-whole",
];

pub struct AmazonRetailer;

impl Default for AmazonRetailer {
    fn default() -> Self {
        Self::new()
    }
}

impl AmazonRetailer {
    pub fn new() -> Self {
        AmazonRetailer
    }
}

impl RetailerPlugin for AmazonRetailer {
    fn name(&self) -> &str {
        "Amazon"
    }

    fn plugin_type(&self) -> &str {
        "amazon"
    }

    fn matches_host(&self, host: &str) -> bool {
        host_has_brand(host, "amazon") || host_has_brand(host, "amzn")
    }

    fn title_selectors(&self) -> &[&'static str] {
        TITLE_SELECTORS
    }

    fn price_selectors(&self) -> &[&'static str] {
        PRICE_SELECTORS
    }
}
