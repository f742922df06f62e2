use chrono::Utc;
use chrono_tz::Europe::Istanbul;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{fetch_json, require_key, slugify};
use crate::error::{Result, ZetaError};

const NOSYAPI_URL: &str = "https://www.nosyapi.com/apiv2/service/pharmacies-on-duty";
const MAX_PHARMACIES: usize = 30;

#[derive(Debug, Deserialize)]
struct NosyResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Vec<serde_json::Map<String, Value>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DutyPharmacies {
    pub city: String,
    pub date: String,
    pub pharmacies: Vec<Pharmacy>,
    /// Count before truncation to the first 30.
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pharmacy {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub district: String,
}

/// "istanbul" → "Istanbul"
fn display_name(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Fetch pharmacies on duty today in `city` (optionally one district).
pub async fn fetch(client: &Client, city: &str, district: Option<&str>) -> Result<DutyPharmacies> {
    let key = require_key("NOSYAPI_KEY")?;

    let mut query = vec![("city", slugify(city))];
    if let Some(d) = district.filter(|d| !d.trim().is_empty()) {
        query.push(("district", slugify(d)));
    }

    let request = client.get(NOSYAPI_URL).query(&query).bearer_auth(key);
    let resp: NosyResponse = fetch_json(request, "nosyapi").await?;
    let result = parse(resp, city)?;
    info!(city = %result.city, total = result.total, "duty pharmacies fetched");
    Ok(result)
}

fn parse(resp: NosyResponse, city: &str) -> Result<DutyPharmacies> {
    let entries = match resp.data {
        Some(data) if resp.status == "success" => data,
        _ => {
            return Err(ZetaError::ToolExecution(
                resp.message.unwrap_or_else(|| "no data returned".to_string()),
            ));
        }
    };

    let pharmacies: Vec<Pharmacy> = entries.iter().map(pharmacy).collect();
    let total = pharmacies.len();

    Ok(DutyPharmacies {
        city: display_name(city),
        date: Utc::now().with_timezone(&Istanbul).format("%Y-%m-%d").to_string(),
        pharmacies: pharmacies.into_iter().take(MAX_PHARMACIES).collect(),
        total,
    })
}

fn pharmacy(entry: &serde_json::Map<String, Value>) -> Pharmacy {
    let field = |key: &str| {
        entry
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    // The upstream has renamed this field several times.
    let name = ["name", "eczaneAdi", "title", "pharmacyName"]
        .into_iter()
        .map(field)
        .find(|v| !v.is_empty())
        .or_else(|| {
            entry
                .values()
                .filter_map(Value::as_str)
                .find(|v| v.chars().count() > 3 && !v.contains('/') && !v.contains('+'))
                .map(str::to_string)
        })
        .unwrap_or_default();

    Pharmacy {
        name,
        address: field("address"),
        phone: field("phone"),
        district: field("district"),
    }
}
