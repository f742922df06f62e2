use chrono::{DateTime, Utc};
use chrono_tz::Europe::Istanbul;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{fetch_json, require_key};
use crate::error::{Result, ZetaError};

const BASE_URL: &str = "https://api.the-odds-api.com/v4";
const SPORT_KEY: &str = "soccer_turkey_super_league";
const PREFERRED_BOOKMAKER: &str = "pinnacle";

// -- Upstream shapes ---

#[derive(Debug, Deserialize)]
struct Event {
    id: String,
    commence_time: DateTime<Utc>,
    home_team: String,
    away_team: String,
    #[serde(default)]
    bookmakers: Vec<Bookmaker>,
}

#[derive(Debug, Deserialize)]
struct Bookmaker {
    key: String,
    #[serde(default)]
    markets: Vec<Market>,
}

#[derive(Debug, Deserialize)]
struct Market {
    key: String,
    #[serde(default)]
    outcomes: Vec<Outcome>,
}

#[derive(Debug, Deserialize)]
struct Outcome {
    name: String,
    price: f64,
}

// -- Output ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeagueOdds {
    pub league: String,
    pub total: usize,
    pub matches: Vec<MatchOdds>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOdds {
    pub id: String,
    pub home_team: String,
    pub away_team: String,
    /// Local (Europe/Istanbul) kickoff date, e.g. "2026-10-24".
    pub date: String,
    /// Local kickoff time, "HH:MM".
    pub time: String,
    pub commence_time: DateTime<Utc>,
    pub bookmaker_count: usize,
    pub odds: Prices,
    pub avg_odds: AveragePrices,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Prices {
    pub home: Option<f64>,
    pub draw: Option<f64>,
    pub away: Option<f64>,
}

/// Averages are two-decimal strings, `None` when no bookmaker priced the outcome.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AveragePrices {
    pub home: Option<String>,
    pub draw: Option<String>,
    pub away: Option<String>,
}

/// Fetch head-to-head odds for the Turkish Süper Lig.
pub async fn fetch(client: &Client) -> Result<LeagueOdds> {
    let api_key = require_key("ODDS_API_KEY")?;
    let request = client
        .get(format!("{BASE_URL}/sports/{SPORT_KEY}/odds/"))
        .query(&[
            ("apiKey", api_key.as_str()),
            ("regions", "eu"),
            ("markets", "h2h"),
            ("oddsFormat", "decimal"),
        ]);

    let events: Vec<Event> = fetch_json(request, "the-odds-api").await?;
    let odds = summarize(events)?;
    info!(matches = odds.total, "league odds fetched");
    Ok(odds)
}

fn summarize(events: Vec<Event>) -> Result<LeagueOdds> {
    if events.is_empty() {
        return Err(ZetaError::ToolExecution("no matches found".into()));
    }

    let mut matches: Vec<MatchOdds> = events.into_iter().map(summarize_event).collect();
    matches.sort_by_key(|m| m.commence_time);

    Ok(LeagueOdds {
        league: "Türkiye Süper Lig".to_string(),
        total: matches.len(),
        matches,
    })
}

fn summarize_event(event: Event) -> MatchOdds {
    let local = event.commence_time.with_timezone(&Istanbul);

    let primary = event
        .bookmakers
        .iter()
        .find(|b| b.key == PREFERRED_BOOKMAKER)
        .or_else(|| event.bookmakers.first())
        .and_then(head_to_head)
        .map(|m| prices(m, &event.home_team, &event.away_team))
        .unwrap_or_default();

    let all: Vec<Prices> = event
        .bookmakers
        .iter()
        .filter_map(head_to_head)
        .map(|m| prices(m, &event.home_team, &event.away_team))
        .collect();

    let avg_odds = AveragePrices {
        home: average(all.iter().filter_map(|p| p.home)),
        draw: average(all.iter().filter_map(|p| p.draw)),
        away: average(all.iter().filter_map(|p| p.away)),
    };

    MatchOdds {
        id: event.id,
        date: local.format("%Y-%m-%d").to_string(),
        time: local.format("%H:%M").to_string(),
        commence_time: event.commence_time,
        bookmaker_count: event.bookmakers.len(),
        odds: primary,
        avg_odds,
        home_team: event.home_team,
        away_team: event.away_team,
    }
}

fn head_to_head(bookmaker: &Bookmaker) -> Option<&Market> {
    bookmaker.markets.iter().find(|m| m.key == "h2h")
}

fn prices(market: &Market, home: &str, away: &str) -> Prices {
    let price_of = |name: &str| {
        market
            .outcomes
            .iter()
            .find(|o| o.name == name)
            .map(|o| o.price)
    };
    Prices {
        home: price_of(home),
        draw: price_of("Draw"),
        away: price_of(away),
    }
}

fn average(values: impl Iterator<Item = f64>) -> Option<String> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| format!("{:.2}", sum / count as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events() -> Vec<Event> {
        serde_json::from_value(serde_json::json!([
            {
                "id": "late",
                "commence_time": "2026-10-25T17:00:00Z",
                "home_team": "Fenerbahce",
                "away_team": "Besiktas",
                "bookmakers": []
            },
            {
                "id": "early",
                "commence_time": "2026-10-24T16:00:00Z",
                "home_team": "Galatasaray",
                "away_team": "Trabzonspor",
                "bookmakers": [
                    {"key": "unibet", "markets": [{"key": "h2h", "outcomes": [
                        {"name": "Galatasaray", "price": 1.5},
                        {"name": "Draw", "price": 4.0},
                        {"name": "Trabzonspor", "price": 6.0}
                    ]}]},
                    {"key": "pinnacle", "markets": [{"key": "h2h", "outcomes": [
                        {"name": "Galatasaray", "price": 1.6},
                        {"name": "Draw", "price": 4.2},
                        {"name": "Trabzonspor", "price": 5.5}
                    ]}]}
                ]
            }
        ]))
        .unwrap()
    }

    #[test]
    fn matches_are_sorted_by_kickoff() {
        let odds = summarize(events()).unwrap();
        assert_eq!(odds.total, 2);
        assert_eq!(odds.matches[0].id, "early");
        assert_eq!(odds.matches[1].id, "late");
    }

    #[test]
    fn prefers_pinnacle_and_averages_all_bookmakers() {
        let odds = summarize(events()).unwrap();
        let m = &odds.matches[0];
        assert_eq!(m.odds.home, Some(1.6));
        assert_eq!(m.odds.draw, Some(4.2));
        assert_eq!(m.bookmaker_count, 2);
        assert_eq!(m.avg_odds.home.as_deref(), Some("1.55"));
        assert_eq!(m.avg_odds.away.as_deref(), Some("5.75"));
    }

    #[test]
    fn kickoff_is_shown_in_istanbul_time() {
        let odds = summarize(events()).unwrap();
        assert_eq!(odds.matches[0].date, "2026-10-24");
        assert_eq!(odds.matches[0].time, "19:00");
    }

    #[test]
    fn match_without_bookmakers_has_no_prices() {
        let odds = summarize(events()).unwrap();
        let m = &odds.matches[1];
        assert_eq!(m.odds, Prices::default());
        assert_eq!(m.avg_odds, AveragePrices::default());
    }

    #[test]
    fn empty_schedule_is_an_error() {
        assert!(summarize(Vec::new()).is_err());
    }
}
