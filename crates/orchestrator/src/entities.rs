//! Entity recognizers run over every message.
//!
//! Recognizers are independent regex passes over the raw text. Each one
//! contributes zero or more string entities to a sorted map, so the same
//! text always yields the same entities.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

/// Tickers the assistant knows how to price.
const KNOWN_SYMBOLS: &[&str] = &[
    "BTC", "ETH", "SOL", "ADA", "DOGE", "DOT", "XRP", "LTC", "LINK", "UNI", "AVAX", "MATIC",
    "USDC", "USDT",
];

/// Common names mapped to their ticker.
const SYMBOL_NAMES: &[(&str, &str)] = &[
    ("bitcoin", "BTC"),
    ("bitcoins", "BTC"),
    ("ethereum", "ETH"),
    ("ether", "ETH"),
    ("solana", "SOL"),
    ("cardano", "ADA"),
    ("dogecoin", "DOGE"),
    ("polkadot", "DOT"),
    ("ripple", "XRP"),
    ("litecoin", "LTC"),
    ("chainlink", "LINK"),
    ("uniswap", "UNI"),
    ("avalanche", "AVAX"),
    ("polygon", "MATIC"),
    ("tether", "USDT"),
];

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$?[A-Za-z]{2,10}").unwrap());

static HOLDING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+(?:\.\d+)?)\s*([a-z]{2,10})\b").unwrap()
});

static AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:(\$|€|£)\s?(\d[\d,]*(?:\.\d+)?)\s*(k|m)?\b)|(?:\b(\d[\d,]*(?:\.\d+)?)\s*(k|m)?\s*(usd|dollars?|eur|euros?|gbp|pounds?)\b)",
    )
    .unwrap()
});

static QUOTE_CURRENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:in|to)\s+(usd|dollars|eur|euros|gbp|pounds)\b").unwrap()
});

static ETH_ADDRESS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b0x[a-fA-F0-9]{40}\b").unwrap());

static BTC_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:bc1[a-z0-9]{25,59}|[13][a-km-zA-HJ-NP-Z1-9]{25,34})\b").unwrap()
});

static DIRECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(above|over|exceeds?|higher than|rises|climbs|below|under|drops|dips|falls|lower than)\b",
    )
    .unwrap()
});

/// Resolve a word or cashtag to a known ticker.
pub fn resolve_symbol(word: &str) -> Option<&'static str> {
    let word = word.trim_start_matches('$');
    let upper = word.to_uppercase();
    if let Some(symbol) = KNOWN_SYMBOLS.iter().find(|s| **s == upper) {
        return Some(symbol);
    }
    let lower = word.to_lowercase();
    SYMBOL_NAMES
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, symbol)| *symbol)
}

fn currency_code(raw: &str) -> &'static str {
    match raw.to_lowercase().as_str() {
        "€" | "eur" | "euro" | "euros" => "EUR",
        "£" | "gbp" | "pound" | "pounds" => "GBP",
        _ => "USD",
    }
}

fn scaled_amount(number: &str, suffix: Option<&str>) -> Option<f64> {
    let value: f64 = number.replace(',', "").parse().ok()?;
    let factor = match suffix.map(|s| s.to_lowercase()) {
        Some(s) if s == "k" => 1_000.0,
        Some(s) if s == "m" => 1_000_000.0,
        _ => 1.0,
    };
    Some(value * factor)
}

fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Run every recognizer over `text`.
///
/// Produced keys:
/// - `symbol`, `symbols`: first ticker, all tickers in order of appearance
/// - `holdings`: `BTC:0.5,ETH:2` for quantity-ticker pairs
/// - `amount`, `amount_currency`: first monetary amount
/// - `currency`: quote currency requested with "in EUR"
/// - `address`, `address_chain`: first wallet address
/// - `direction`: `above` or `below`
pub fn extract(text: &str) -> BTreeMap<String, String> {
    let mut entities = BTreeMap::new();

    extract_symbols(text, &mut entities);
    extract_holdings(text, &mut entities);
    extract_amount(text, &mut entities);
    extract_addresses(text, &mut entities);

    if let Some(caps) = QUOTE_CURRENCY.captures(text) {
        entities.insert("currency".to_string(), currency_code(&caps[1]).to_string());
    }

    if let Some(caps) = DIRECTION.captures(text) {
        let direction = match caps[1].to_lowercase().as_str() {
            "below" | "under" | "drops" | "dips" | "falls" | "lower than" => "below",
            _ => "above",
        };
        entities.insert("direction".to_string(), direction.to_string());
    }

    entities
}

fn extract_symbols(text: &str, entities: &mut BTreeMap<String, String>) {
    let mut symbols: Vec<&'static str> = Vec::new();
    for word in WORD.find_iter(text) {
        let raw = word.as_str();
        // Bare lowercase tickers ("eth") are too ambiguous; names and cashtags are not.
        let is_ticker_form = raw.starts_with('$') || raw.chars().all(|c| c.is_ascii_uppercase());
        let is_name = SYMBOL_NAMES
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case(raw));
        let symbol = match resolve_symbol(raw) {
            Some(symbol) if is_ticker_form || is_name => symbol,
            _ => continue,
        };
        if !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }

    if let Some(first) = symbols.first() {
        entities.insert("symbol".to_string(), first.to_string());
        entities.insert("symbols".to_string(), symbols.join(","));
    }
}

fn extract_holdings(text: &str, entities: &mut BTreeMap<String, String>) {
    let mut holdings: Vec<(&'static str, String)> = Vec::new();
    for caps in HOLDING.captures_iter(text) {
        let Some(symbol) = resolve_symbol(&caps[2]) else {
            continue;
        };
        if holdings.iter().any(|(s, _)| *s == symbol) {
            continue;
        }
        holdings.push((symbol, caps[1].to_string()));
    }

    if !holdings.is_empty() {
        let joined = holdings
            .iter()
            .map(|(symbol, qty)| format!("{}:{}", symbol, qty))
            .collect::<Vec<_>>()
            .join(",");
        entities.insert("holdings".to_string(), joined);
    }
}

fn extract_amount(text: &str, entities: &mut BTreeMap<String, String>) {
    let Some(caps) = AMOUNT.captures(text) else {
        return;
    };

    let (value, currency) = if let Some(number) = caps.get(2) {
        (
            scaled_amount(number.as_str(), caps.get(3).map(|m| m.as_str())),
            caps.get(1).map_or("USD", |m| currency_code(m.as_str())),
        )
    } else if let Some(number) = caps.get(4) {
        (
            scaled_amount(number.as_str(), caps.get(5).map(|m| m.as_str())),
            caps.get(6).map_or("USD", |m| currency_code(m.as_str())),
        )
    } else {
        (None, "USD")
    };

    if let Some(value) = value {
        entities.insert("amount".to_string(), format_amount(value));
        entities.insert("amount_currency".to_string(), currency.to_string());
    }
}

fn extract_addresses(text: &str, entities: &mut BTreeMap<String, String>) {
    if let Some(m) = ETH_ADDRESS.find(text) {
        entities.insert("address".to_string(), m.as_str().to_string());
        entities.insert("address_chain".to_string(), "ethereum".to_string());
    } else if let Some(m) = BTC_ADDRESS.find(text) {
        entities.insert("address".to_string(), m.as_str().to_string());
        entities.insert("address_chain".to_string(), "bitcoin".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbols_in_order() {
        let entities = extract("Compare ETH with bitcoin and $SOL");
        assert_eq!(entities.get("symbol").map(String::as_str), Some("ETH"));
        assert_eq!(entities.get("symbols").map(String::as_str), Some("ETH,BTC,SOL"));
    }

    #[test]
    fn test_lowercase_ticker_ignored() {
        // "dot" and "uni" are ordinary words in lowercase.
        let entities = extract("connect the dot to uni");
        assert!(!entities.contains_key("symbol"));
    }

    #[test]
    fn test_holdings() {
        let entities = extract("I hold 0.5 BTC and 2 eth, plus 0.1 btc more");
        assert_eq!(entities.get("holdings").map(String::as_str), Some("BTC:0.5,ETH:2"));
    }

    #[test]
    fn test_amount_forms() {
        let entities = extract("alert me when BTC goes above $70,000");
        assert_eq!(entities.get("amount").map(String::as_str), Some("70000"));
        assert_eq!(entities.get("amount_currency").map(String::as_str), Some("USD"));
        assert_eq!(entities.get("direction").map(String::as_str), Some("above"));

        let entities = extract("tell me if ETH drops under 2.5k euros");
        assert_eq!(entities.get("amount").map(String::as_str), Some("2500"));
        assert_eq!(entities.get("amount_currency").map(String::as_str), Some("EUR"));
        assert_eq!(entities.get("direction").map(String::as_str), Some("below"));
    }

    #[test]
    fn test_quote_currency() {
        let entities = extract("price of BTC in EUR");
        assert_eq!(entities.get("currency").map(String::as_str), Some("EUR"));
    }

    #[test]
    fn test_addresses() {
        let entities = extract("check 0x52908400098527886E0F7030069857D2E4169EE7 please");
        assert_eq!(entities.get("address_chain").map(String::as_str), Some("ethereum"));

        let entities = extract("balance of bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq");
        assert_eq!(entities.get("address_chain").map(String::as_str), Some("bitcoin"));
    }

    #[test]
    fn test_no_entities() {
        assert!(extract("hello there").is_empty());
    }
}
