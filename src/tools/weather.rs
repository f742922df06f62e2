use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use super::{Tool, ToolContext, ToolName, ToolParams, required_str};
use crate::error::{Result, ZetaError};
use crate::feeds::fetch_json;

/// Current conditions and a short forecast from wttr.in (no API key).
pub struct WeatherTool;

#[derive(Deserialize)]
struct WttrResponse {
    current_condition: Vec<CurrentCondition>,
    #[serde(default)]
    weather: Vec<DailyForecast>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrentCondition {
    #[serde(rename = "temp_C")]
    temp_c: String,
    #[serde(rename = "FeelsLikeC")]
    feels_like_c: String,
    humidity: String,
    windspeed_kmph: String,
    #[serde(default)]
    weather_desc: Vec<TextValue>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DailyForecast {
    date: String,
    #[serde(rename = "mintempC")]
    min_temp_c: String,
    #[serde(rename = "maxtempC")]
    max_temp_c: String,
}

#[derive(Deserialize)]
struct TextValue {
    value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherReport {
    pub city: String,
    pub temp: i32,
    pub feels_like: i32,
    pub humidity: i32,
    pub wind_kmph: i32,
    pub description: String,
    pub forecast: Vec<DayRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayRange {
    pub date: String,
    pub min: i32,
    pub max: i32,
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> ToolName {
        ToolName::Weather
    }

    fn description(&self) -> &str {
        "Weather, temperature and forecast for a city"
    }

    async fn run(&self, params: &ToolParams, ctx: &ToolContext) -> Result<serde_json::Value> {
        let city = required_str(params, "city")?;

        let mut url = Url::parse("https://wttr.in/")
            .map_err(|e| ZetaError::ToolExecution(format!("bad weather url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ZetaError::ToolExecution("bad weather url".into()))?
            .pop_if_empty()
            .push(city);
        url.query_pairs_mut().append_pair("format", "j1");

        let raw: WttrResponse = fetch_json(ctx.http_client.get(url), "wttr.in").await?;
        Ok(serde_json::to_value(report(city, raw)?)?)
    }
}

fn report(city: &str, raw: WttrResponse) -> Result<WeatherReport> {
    let now = raw
        .current_condition
        .into_iter()
        .next()
        .ok_or_else(|| ZetaError::ToolExecution(format!("no weather data for {city}")))?;

    Ok(WeatherReport {
        city: city.to_string(),
        temp: number(&now.temp_c)?,
        feels_like: number(&now.feels_like_c)?,
        humidity: number(&now.humidity)?,
        wind_kmph: number(&now.windspeed_kmph)?,
        description: now
            .weather_desc
            .into_iter()
            .map(|d| d.value.trim().to_string())
            .next()
            .unwrap_or_default(),
        forecast: raw
            .weather
            .into_iter()
            .map(|d| {
                Ok(DayRange {
                    date: d.date,
                    min: number(&d.min_temp_c)?,
                    max: number(&d.max_temp_c)?,
                })
            })
            .collect::<Result<_>>()?,
    })
}

/// wttr.in encodes every number as a string.
fn number(s: &str) -> Result<i32> {
    s.trim()
        .parse()
        .map_err(|_| ZetaError::ToolExecution(format!("unexpected weather value \"{s}\"")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> WttrResponse {
        serde_json::from_value(serde_json::json!({
            "current_condition": [{
                "temp_C": "21",
                "FeelsLikeC": "20",
                "humidity": "64",
                "windspeedKmph": "13",
                "weatherDesc": [{"value": "Partly cloudy "}]
            }],
            "weather": [
                {"date": "2026-10-19", "mintempC": "15", "maxtempC": "23"},
                {"date": "2026-10-20", "mintempC": "14", "maxtempC": "-2"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn builds_report_from_wttr_json() {
        let r = report("Istanbul", sample()).unwrap();
        assert_eq!(r.city, "Istanbul");
        assert_eq!(r.temp, 21);
        assert_eq!(r.feels_like, 20);
        assert_eq!(r.wind_kmph, 13);
        assert_eq!(r.description, "Partly cloudy");
        assert_eq!(r.forecast.len(), 2);
        assert_eq!(r.forecast[1].max, -2);
    }

    #[test]
    fn missing_current_condition_is_an_error() {
        let raw: WttrResponse =
            serde_json::from_value(serde_json::json!({"current_condition": []})).unwrap();
        assert!(report("Nowhere", raw).is_err());
    }

    #[test]
    fn non_numeric_value_is_an_error() {
        assert!(number("n/a").is_err());
        assert_eq!(number(" 7 ").unwrap(), 7);
    }
}
