use async_trait::async_trait;

use super::{Tool, ToolContext, ToolName, ToolParams};
use crate::error::Result;
use crate::feeds::odds::{self, LeagueOdds};
use crate::feeds::slugify;

/// Süper Lig fixtures with bookmaker odds.
///
/// When the query names a team that appears in the fixture list only that
/// team's matches are returned; otherwise the whole list is.
pub struct SportsOddsTool;

#[async_trait]
impl Tool for SportsOddsTool {
    fn name(&self) -> ToolName {
        ToolName::SportsOdds
    }

    fn description(&self) -> &str {
        "Football: Süper Lig fixtures, teams and match odds"
    }

    async fn run(&self, params: &ToolParams, ctx: &ToolContext) -> Result<serde_json::Value> {
        let league = odds::fetch(&ctx.http_client).await?;
        let query = params.get("query").and_then(|v| v.as_str()).unwrap_or_default();
        Ok(serde_json::to_value(narrow_to_team(league, query))?)
    }
}

fn narrow_to_team(mut league: LeagueOdds, query: &str) -> LeagueOdds {
    let query = slugify(query);
    let mentions = |team: &str| {
        let team = slugify(team);
        !team.is_empty() && query.contains(&team)
    };

    let picked: Vec<_> = league
        .matches
        .iter()
        .filter(|m| mentions(&m.home_team) || mentions(&m.away_team))
        .cloned()
        .collect();

    if !picked.is_empty() {
        league.total = picked.len();
        league.matches = picked;
    }
    league
}
