use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

use crate::utils::error::ExtractionError;

/// Amounts below this in a raw-HTML currency scan are fees and add-ons, not
/// product prices.
const MIN_PLAUSIBLE_AMOUNT: u32 = 50;

/// Turns retailer price text ("₹1,19,999.00", "Rs. 899", "$19.99") into a
/// `Decimal`.
pub struct PriceParser {
    number_regex: Regex,
    currency_regex: Regex,
}

impl Default for PriceParser {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceParser {
    pub fn new() -> Self {
        PriceParser {
            number_regex: Regex::new(r"\d+(?:\.\d+)?").expect("static regex"),
            currency_regex: Regex::new(r"₹\s*([\d,]+(?:\.\d{1,2})?)").expect("static regex"),
        }
    }

    /// First numeric amount in `text`, thousands separators ignored.
    pub fn parse(&self, text: &str) -> Result<Decimal, ExtractionError> {
        let cleaned = text.replace(',', "");
        let malformed = || ExtractionError::MalformedPrice {
            text: text.trim().to_string(),
        };

        let found = self.number_regex.find(&cleaned).ok_or_else(malformed)?;
        let price = Decimal::from_str(found.as_str()).map_err(|_| malformed())?;
        if price <= Decimal::ZERO {
            return Err(malformed());
        }
        Ok(price.normalize())
    }

    /// Every `₹ amount` occurrence in a raw page, in document order.
    pub fn currency_amounts(&self, html: &str) -> Vec<Decimal> {
        self.currency_regex
            .captures_iter(html)
            .filter_map(|caps| caps.get(1))
            .filter_map(|m| Decimal::from_str(&m.as_str().replace(',', "")).ok())
            .collect()
    }

    /// Lowest plausible amount from a raw-HTML scan; deal prices sit below
    /// list prices on the same page.
    pub fn lowest_plausible(&self, html: &str) -> Option<Decimal> {
        self.currency_amounts(html)
            .into_iter()
            .filter(|amount| *amount >= Decimal::from(MIN_PLAUSIBLE_AMOUNT))
            .min()
            .map(|amount| amount.normalize())
    }
}

/// Strict parse for a user-supplied target: the whole token must be a
/// positive number, optionally with a leading ₹ and thousands separators.
pub fn parse_target(text: &str) -> Option<Decimal> {
    let cleaned = text
        .trim()
        .trim_start_matches('₹')
        .trim_start_matches("Rs.")
        .trim()
        .replace(',', "");
    let value = Decimal::from_str(&cleaned).ok()?;
    (value > Decimal::ZERO).then(|| value.normalize())
}

/// `1234567.5` → `1,234,567.50` with `decimals = 2`.
pub fn format_amount(amount: Decimal, decimals: u32) -> String {
    let rounded = amount.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.*}", decimals as usize, rounded);
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.as_str()),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(frac) => format!("{sign}{grouped}.{frac}"),
        None => format!("{sign}{grouped}"),
    }
}
