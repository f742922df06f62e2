//! Raw adapters for the external data APIs.
//!
//! The odds feed backs the `sports_odds` tool; exchange and pharmacy data
//! are only served over HTTP.  Every adapter returns a typed result and
//! leaves failure shaping to its caller.

pub mod exchange;
pub mod odds;
pub mod pharmacy;

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::Config;
use crate::error::{Result, ZetaError};
use crate::tools::cache::TtlCache;

/// GET `url` and decode a JSON body, mapping non-2xx to [`ZetaError::Upstream`].
///
/// URLs are stripped from transport errors because several upstreams take
/// their API key as a query parameter.
pub async fn fetch_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    service: &str,
) -> Result<T> {
    let resp = request.send().await.map_err(|e| e.without_url())?;
    let status = resp.status();
    debug!(service, status = status.as_u16(), "upstream responded");
    if !status.is_success() {
        return Err(ZetaError::Upstream {
            service: service.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(resp.json::<T>().await.map_err(|e| e.without_url())?)
}

/// ASCII slug of a Turkish place name: "Şanlıurfa" → "sanliurfa".
pub fn slugify(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'ı' | 'i' | 'î' => 'i',
            'ğ' => 'g',
            'ü' | 'û' => 'u',
            'ş' => 's',
            'ö' => 'o',
            'ç' => 'c',
            'â' => 'a',
            other => other,
        })
        // lowercase of 'İ' is "i\u{307}"
        .filter(|c| *c != '\u{307}')
        .collect()
}

pub(crate) fn require_key(var: &str) -> Result<String> {
    Config::api_key(var).ok_or_else(|| ZetaError::Config(format!("{var} is not set")))
}

/// Cached access to the HTTP-only feeds.
pub struct Feeds {
    client: Client,
    cache: TtlCache<serde_json::Value>,
}

impl Feeds {
    pub fn new(client: Client, cache_ttl: Duration) -> Self {
        Self {
            client,
            cache: TtlCache::new(cache_ttl),
        }
    }

    pub async fn exchange(&self) -> Result<serde_json::Value> {
        self.cached("exchange", exchange::fetch(&self.client)).await
    }

    pub async fn odds(&self) -> Result<serde_json::Value> {
        self.cached("odds", odds::fetch(&self.client)).await
    }

    pub async fn pharmacies(&self, city: &str, district: Option<&str>) -> Result<serde_json::Value> {
        let key = format!(
            "pharmacy:{}:{}",
            slugify(city),
            district.map(slugify).unwrap_or_default()
        );
        self.cached(&key, pharmacy::fetch(&self.client, city, district))
            .await
    }

    async fn cached<T: Serialize>(
        &self,
        key: &str,
        fetch: impl Future<Output = Result<T>>,
    ) -> Result<serde_json::Value> {
        if let Some(hit) = self.cache.get(key, Instant::now()) {
            return Ok(hit);
        }
        let value = serde_json::to_value(fetch.await?)?;
        let now = Instant::now();
        self.cache.put(key, value.clone(), now);
        let purged = self.cache.purge_expired(now);
        if purged > 0 {
            debug!(purged, cached = self.cache.len(), "expired feed entries dropped");
        }
        Ok(value)
    }
}
