//! Web search through the Tavily API.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::truncate_utf8;
use crate::error::ToolError;
use crate::tool::{ParamKind, ParamSpec, Tool, ToolArgs, ToolOutput};

const DEFAULT_RESULTS: usize = 5;
const MAX_RESULTS: usize = 10;
const MAX_SNIPPET_BYTES: usize = 600;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

/// Searches the web and returns a short digest of the top hits.
///
/// # Parameters
///
/// - `query` (required)
/// - `maxResults` (optional, default 5, at most 10)
pub struct WebSearch;

#[async_trait]
impl Tool for WebSearch {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for current information."
    }

    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[
            ParamSpec::required("query", ParamKind::String, "What to search for"),
            ParamSpec::optional("maxResults", ParamKind::Number, "Number of results (1-10)"),
        ];
        PARAMS
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let services = &args.ctx.services;
        let api_key = services
            .config
            .tavily_api_key()
            .ok_or(ToolError::NotConfigured("Web search"))?;

        let query = args.get_string("query")?;
        let max_results = args
            .get_number_opt("maxResults")
            .map(|n| (n.max(1.0) as usize).min(MAX_RESULTS))
            .unwrap_or(DEFAULT_RESULTS);

        debug!(%query, max_results, "Searching web");

        let response = services
            .http
            .post(format!("{}/search", services.config.tavily_base_url))
            .bearer_auth(api_key)
            .json(&json!({
                "query": query,
                "max_results": max_results,
                "search_depth": "basic",
                "include_answer": true,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ToolError::ExecutionFailed(format!(
                "Search failed with HTTP {}",
                response.status()
            )));
        }

        let body: SearchResponse = response.json().await?;
        Ok(ToolOutput::success(format_results(&body)))
    }
}

fn format_results(body: &SearchResponse) -> String {
    if body.results.is_empty() && body.answer.is_none() {
        return "No results found.".to_string();
    }

    let mut out = String::new();
    if let Some(answer) = &body.answer {
        out.push_str(answer.trim());
        out.push_str("\n\n");
    }
    for (i, hit) in body.results.iter().enumerate() {
        out.push_str(&format!(
            "{}. {} ({})\n{}\n",
            i + 1,
            hit.title,
            hit.url,
            truncate_utf8(hit.content.trim(), MAX_SNIPPET_BYTES)
        ));
    }
    out.trim_end().to_string()
}
