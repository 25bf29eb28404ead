use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::price::PriceParser;
use crate::utils::error::ExtractionError;

const TITLE_SUFFIXES: [&str; 7] = [
    " - Buy ",
    " : Amazon",
    " | Amazon",
    " - Amazon",
    " Price in India",
    " at Best Price",
    " Online at",
];

const PRICE_META_PROPERTIES: [&str; 2] = ["product:price:amount", "og:price:amount"];

/// Where on the page a value was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    JsonLd,
    Css,
    Meta,
    TitleTag,
    RawScan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementMatch<T> {
    pub value: T,
    pub strategy: Strategy,
    /// The CSS selector or meta property that produced the value, if any.
    pub source: Option<String>,
}

impl<T> ElementMatch<T> {
    fn new(value: T, strategy: Strategy, source: Option<&str>) -> Self {
        Self {
            value,
            strategy,
            source: source.map(str::to_string),
        }
    }
}

/// Locates a product's name and price in a parsed page, trying structured
/// data first and falling back to progressively looser heuristics.
pub struct ElementFinder {
    parser: PriceParser,
}

impl Default for ElementFinder {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementFinder {
    pub fn new() -> Self {
        Self {
            parser: PriceParser::new(),
        }
    }

    pub fn parser(&self) -> &PriceParser {
        &self.parser
    }

    /// JSON-LD, then retailer selectors, then price meta tags, then the
    /// lowest plausible `₹` amount anywhere in the raw HTML.
    pub fn find_price(
        &self,
        document: &Html,
        raw_html: &str,
        selectors: &[&str],
    ) -> Result<ElementMatch<Decimal>, ExtractionError> {
        if let Some(price) = self.price_from_json_ld(document) {
            return Ok(ElementMatch::new(price, Strategy::JsonLd, None));
        }

        let mut malformed = None;
        for css in selectors {
            let Some(text) = select_text(document, css) else {
                continue;
            };
            match self.parser.parse(&text) {
                Ok(price) => return Ok(ElementMatch::new(price, Strategy::Css, Some(*css))),
                Err(err) => {
                    tracing::debug!("Selector {} matched unparsable text {:?}", css, text);
                    malformed.get_or_insert(err);
                }
            }
        }

        for property in PRICE_META_PROPERTIES {
            if let Some(price) = meta_content(document, property).and_then(|c| self.parser.parse(&c).ok()) {
                return Ok(ElementMatch::new(price, Strategy::Meta, Some(property)));
            }
        }

        if let Some(price) = self.parser.lowest_plausible(raw_html) {
            return Ok(ElementMatch::new(price, Strategy::RawScan, None));
        }

        Err(malformed.unwrap_or(ExtractionError::ElementNotFound {
            field: "price".to_string(),
        }))
    }

    /// JSON-LD name, then retailer selectors, then `og:title`, then a cleaned
    /// `<title>`.
    pub fn find_title(&self, document: &Html, selectors: &[&str]) -> Option<ElementMatch<String>> {
        if let Some(name) = self.title_from_json_ld(document) {
            return Some(ElementMatch::new(name, Strategy::JsonLd, None));
        }

        for css in selectors {
            if let Some(text) = select_text(document, css) {
                return Some(ElementMatch::new(text, Strategy::Css, Some(*css)));
            }
        }

        if let Some(title) = meta_content(document, "og:title") {
            return Some(ElementMatch::new(title, Strategy::Meta, Some("og:title")));
        }

        select_text(document, "title")
            .map(|raw| clean_title(&raw))
            .filter(|t| !t.is_empty())
            .map(|t| ElementMatch::new(t, Strategy::TitleTag, None))
    }

    fn json_ld_products(&self, document: &Html) -> Vec<Value> {
        let mut products = Vec::new();
        let Ok(ld_json) = Selector::parse(r#"script[type="application/ld+json"]"#) else {
            return products;
        };
        for script in document.select(&ld_json) {
            let text: String = script.text().collect();
            let Ok(data) = serde_json::from_str::<Value>(&text) else {
                continue;
            };
            collect_products(data, &mut products);
        }
        products
    }

    fn price_from_json_ld(&self, document: &Html) -> Option<Decimal> {
        self.json_ld_products(document).iter().find_map(|item| {
            let offers = match item.get("offers")? {
                Value::Array(list) => list.first()?,
                other => other,
            };
            ["price", "lowPrice"]
                .iter()
                .filter_map(|key| offers.get(*key))
                .find_map(json_amount)
        })
    }

    fn title_from_json_ld(&self, document: &Html) -> Option<String> {
        self.json_ld_products(document).iter().find_map(|item| {
            item.get("name")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
        })
    }
}

/// Product-like JSON-LD nodes: `@type` of `Product` or anything carrying
/// `offers`. Arrays and `@graph` containers are flattened.
fn collect_products(data: Value, out: &mut Vec<Value>) {
    match data {
        Value::Array(items) => items.into_iter().for_each(|item| collect_products(item, out)),
        Value::Object(mut map) => {
            if let Some(graph) = map.remove("@graph") {
                collect_products(graph, out);
            }
            let typed_product = match map.get("@type") {
                Some(Value::String(t)) => t == "Product",
                Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some("Product")),
                _ => false,
            };
            if typed_product || map.contains_key("offers") {
                out.push(Value::Object(map));
            }
        }
        _ => {}
    }
}

fn json_amount(value: &Value) -> Option<Decimal> {
    let amount = match value {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok()?,
        Value::String(s) => Decimal::from_str(&s.replace(',', "")).ok()?,
        _ => return None,
    };
    (amount > Decimal::ZERO).then(|| amount.normalize())
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn select_text(document: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    document
        .select(&selector)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
}

fn meta_content(document: &Html, property: &str) -> Option<String> {
    let selector = Selector::parse(&format!(r#"meta[property="{}"]"#, property)).ok()?;
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("content"))
        .map(str::trim)
        .find(|c| !c.is_empty())
        .map(str::to_string)
}

/// Drops storefront boilerplate ("... : Amazon.in: Electronics").
pub fn clean_title(raw: &str) -> String {
    let mut title = raw.trim();
    for suffix in TITLE_SUFFIXES {
        if let Some(idx) = title.find(suffix) {
            title = &title[..idx];
        }
    }
    title.trim().to_string()
}
