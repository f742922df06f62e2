use std::collections::HashMap;

use chrono::Utc;
use chrono_tz::Europe::Istanbul;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{fetch_json, require_key};
use crate::error::{Result, ZetaError};

const COINGECKO_URL: &str = "https://api.coingecko.com/api/v3/simple/price";

/// (code, display name, symbol, units quoted)
const CURRENCIES: [(&str, &str, &str, u32); 6] = [
    ("USD", "Amerikan Doları", "$", 1),
    ("EUR", "Euro", "€", 1),
    ("GBP", "İngiliz Sterlini", "£", 1),
    ("JPY", "Japon Yeni", "¥", 100),
    ("CHF", "İsviçre Frangı", "₣", 1),
    ("SAR", "Suudi Riyali", "﷼", 1),
];

/// (coingecko id, display name, symbol, brand colour)
const COINS: [(&str, &str, &str, &str); 5] = [
    ("bitcoin", "Bitcoin", "BTC", "#F7931A"),
    ("ethereum", "Ethereum", "ETH", "#627EEA"),
    ("solana", "Solana", "SOL", "#9945FF"),
    ("binancecoin", "BNB", "BNB", "#F3BA2F"),
    ("ripple", "XRP", "XRP", "#346AA9"),
];

#[derive(Debug, Deserialize)]
struct RatesResponse {
    conversion_rates: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct CoinPrice {
    usd: f64,
    #[serde(rename = "try")]
    try_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExchangeSnapshot {
    /// Istanbul wall-clock time of the fetch, "HH:MM".
    pub updated_at: String,
    pub currencies: Vec<CurrencyRate>,
    pub crypto: Vec<CoinQuote>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrencyRate {
    pub code: String,
    pub name: String,
    pub symbol: String,
    /// Price of `units` of this currency in Turkish lira, two decimals.
    #[serde(rename = "try")]
    pub try_price: String,
    pub units: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoinQuote {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub color: String,
    pub usd: f64,
    #[serde(rename = "try")]
    pub try_price: f64,
}

/// Fetch fiat rates and crypto prices concurrently.
pub async fn fetch(client: &Client) -> Result<ExchangeSnapshot> {
    let key = require_key("EXCHANGE_RATE_KEY")?;
    let ids = COINS.map(|(id, ..)| id).join(",");

    let rates_req = client.get(format!("https://v6.exchangerate-api.com/v6/{key}/latest/USD"));
    let coins_req = client
        .get(COINGECKO_URL)
        .query(&[("ids", ids.as_str()), ("vs_currencies", "usd,try")]);

    let (rates, coins): (RatesResponse, HashMap<String, CoinPrice>) = futures::try_join!(
        fetch_json(rates_req, "exchangerate-api"),
        fetch_json(coins_req, "coingecko"),
    )?;

    Ok(ExchangeSnapshot {
        updated_at: Utc::now().with_timezone(&Istanbul).format("%H:%M").to_string(),
        currencies: lira_rates(&rates.conversion_rates)?,
        crypto: coin_quotes(&coins),
    })
}

/// Convert USD-based rates into lira prices for the tracked currencies.
fn lira_rates(usd_rates: &HashMap<String, f64>) -> Result<Vec<CurrencyRate>> {
    let rate = |code: &str| {
        usd_rates
            .get(code)
            .copied()
            .filter(|r| *r > 0.0)
            .ok_or_else(|| ZetaError::ToolExecution(format!("missing {code} rate")))
    };
    let usd_to_try = rate("TRY")?;

    CURRENCIES
        .iter()
        .map(|&(code, name, symbol, units)| {
            let per_unit = usd_to_try / rate(code)?;
            Ok(CurrencyRate {
                code: code.to_string(),
                name: name.to_string(),
                symbol: symbol.to_string(),
                try_price: format!("{:.2}", per_unit * f64::from(units)),
                units,
            })
        })
        .collect()
}

fn coin_quotes(prices: &HashMap<String, CoinPrice>) -> Vec<CoinQuote> {
    COINS
        .iter()
        .filter_map(|&(id, name, symbol, color)| {
            prices.get(id).map(|p| CoinQuote {
                id: id.to_string(),
                name: name.to_string(),
                symbol: symbol.to_string(),
                color: color.to_string(),
                usd: p.usd,
                try_price: p.try_price,
            })
        })
        .collect()
}
