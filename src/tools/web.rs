use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::{Tool, ToolContext, ToolName, ToolParams, required_str};
use crate::error::{Result, ZetaError};
use crate::feeds::fetch_json;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; ZetaAgent/0.1)";

// -- WebSearch (DuckDuckGo) ----------------------------------------------

pub struct WebSearchTool {
    max_results: usize,
}

impl WebSearchTool {
    pub fn new(max_results: usize) -> Self {
        Self { max_results }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> ToolName {
        ToolName::WebSearch
    }

    fn description(&self) -> &str {
        "General web search for current information, news and prices"
    }

    async fn run(&self, params: &ToolParams, ctx: &ToolContext) -> Result<serde_json::Value> {
        let query = required_str(params, "query")?;
        debug!(query, limit = self.max_results, "searching DuckDuckGo");

        let resp = ctx
            .http_client
            .get("https://html.duckduckgo.com/html/")
            .query(&[("q", query)])
            .header("User-Agent", USER_AGENT)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ZetaError::Upstream {
                service: "duckduckgo".into(),
                status: resp.status().as_u16(),
            });
        }

        let body = resp.text().await?;
        let results = parse_ddg_html(&body, self.max_results);
        Ok(json!({ "query": query, "results": results }))
    }
}

/// Parse DuckDuckGo HTML search results page.
fn parse_ddg_html(html: &str, limit: usize) -> Vec<SearchHit> {
    html.split("class=\"result__a\"")
        .skip(1)
        .filter_map(|chunk| {
            let title = extract_between(chunk, ">", "</a>").map(|s| strip_tags(&s))?;
            if title.is_empty() {
                return None;
            }
            let href = extract_between(chunk, "href=\"", "\"").unwrap_or_default();
            let snippet = chunk
                .find("class=\"result__snippet\"")
                .and_then(|start| extract_between(&chunk[start..], ">", "</a>"))
                .map(|s| strip_tags(&s))
                .unwrap_or_default();
            Some(SearchHit {
                title,
                url: resolve_redirect(&href),
                snippet,
            })
        })
        .take(limit)
        .collect()
}

/// DDG wraps result links as `//duckduckgo.com/l/?uddg=<encoded target>`.
fn resolve_redirect(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    Url::parse(&absolute)
        .ok()
        .and_then(|u| {
            u.query_pairs()
                .find(|(k, _)| k == "uddg")
                .map(|(_, v)| v.into_owned())
        })
        .unwrap_or(absolute)
}

fn extract_between(text: &str, start: &str, end: &str) -> Option<String> {
    let s = text.find(start)?;
    let after = &text[s + start.len()..];
    let e = after.find(end)?;
    Some(after[..e].to_string())
}

fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&amp;", "&")
        .replace("&#x27;", "'")
        .replace("&quot;", "\"")
        .trim()
        .to_string()
}

// -- Wikipedia -----------------------------------------------------------

pub struct WikipediaTool {
    language: String,
}

impl WikipediaTool {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }

    fn base(&self) -> String {
        format!("https://{}.wikipedia.org", self.language)
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    query: SearchQuery,
}

#[derive(Deserialize)]
struct SearchQuery {
    search: Vec<SearchEntry>,
}

#[derive(Deserialize)]
struct SearchEntry {
    title: String,
}

#[derive(Deserialize)]
struct Summary {
    title: String,
    #[serde(default)]
    extract: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    content_urls: Option<ContentUrls>,
}

#[derive(Deserialize)]
struct ContentUrls {
    desktop: PageUrl,
}

#[derive(Deserialize)]
struct PageUrl {
    page: String,
}

#[async_trait]
impl Tool for WikipediaTool {
    fn name(&self) -> ToolName {
        ToolName::Wikipedia
    }

    fn description(&self) -> &str {
        "Encyclopedic knowledge: people, concepts, definitions"
    }

    async fn run(&self, params: &ToolParams, ctx: &ToolContext) -> Result<serde_json::Value> {
        let query = required_str(params, "query")?;

        // Resolve free text to an article title first; the summary endpoint
        // only accepts exact titles.
        let search = ctx
            .http_client
            .get(format!("{}/w/api.php", self.base()))
            .query(&[
                ("action", "query"),
                ("list", "search"),
                ("format", "json"),
                ("srlimit", "1"),
                ("srsearch", query),
            ])
            .header("User-Agent", USER_AGENT);
        let found: SearchResponse = fetch_json(search, "wikipedia").await?;
        let title = found
            .query
            .search
            .into_iter()
            .next()
            .map(|e| e.title)
            .ok_or_else(|| ZetaError::ToolExecution(format!("no article found for \"{query}\"")))?;

        let mut url = Url::parse(&format!("{}/api/rest_v1/page/summary/", self.base()))
            .map_err(|e| ZetaError::ToolExecution(format!("bad wikipedia url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ZetaError::ToolExecution("bad wikipedia url".into()))?
            .pop_if_empty()
            .push(&title.replace(' ', "_"));

        debug!(query, title = %title, "fetching wikipedia summary");
        let summary: Summary = fetch_json(
            ctx.http_client.get(url).header("User-Agent", USER_AGENT),
            "wikipedia",
        )
        .await?;

        Ok(json!({
            "title": summary.title,
            "description": summary.description,
            "extract": summary.extract,
            "url": summary.content_urls.map(|u| u.desktop.page),
        }))
    }
}
