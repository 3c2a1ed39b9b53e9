//! Web search through the GLM native `web_search` tool
//!
//! Under GLM credentials a search invocation is not declared as a function
//! tool. It becomes one standalone request carrying only the query and the
//! vendor's search tool, and the reply is reformatted into tool-result text
//! plus citations.

use serde::Serialize;

use super::config::GlmConfig;
use super::wire::{
    ChatCompletion, ChatCompletionRequest, ChatMessage, ChatTool, ThinkingDirective,
    WebSearchHit, WebSearchOptions,
};
use crate::llm::auth::AuthType;

const UNTITLED: &str = "Untitled";

/// Whether a search invocation under `auth_type` goes to the GLM search tool
pub fn routes_to_glm(auth_type: AuthType) -> bool {
    auth_type.is_glm()
}

/// A cited source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchSource {
    pub title: String,
    pub uri: String,
}

/// Search result in tool-result form
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebSearchOutcome {
    /// Text handed back to the model as the tool result
    pub llm_content: String,
    /// Short summary for display
    pub return_display: String,
    pub sources: Vec<SearchSource>,
}

/// Build the standalone search request: one user message and the native tool
pub fn build_search_request(query: &str, config: &GlmConfig) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: config.default_model.clone(),
        messages: vec![ChatMessage::user(query)],
        stream: None,
        stream_options: None,
        temperature: None,
        top_p: None,
        max_tokens: None,
        tools: Some(vec![ChatTool::WebSearch {
            web_search: WebSearchOptions {
                enable: true,
                search_result: true,
                search_query: Some(query.to_string()),
            },
        }]),
        tool_choice: None,
        thinking: ThinkingDirective::always_enabled(config.clear_thinking),
    }
}

fn hit_title(hit: &WebSearchHit) -> &str {
    hit.title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(UNTITLED)
}

fn collect_sources(hits: &[WebSearchHit]) -> Vec<SearchSource> {
    hits.iter()
        .filter_map(|hit| {
            let uri = hit.link.as_deref().map(str::trim).filter(|l| !l.is_empty())?;
            Some(SearchSource {
                title: hit_title(hit).to_string(),
                uri: uri.to_string(),
            })
        })
        .collect()
}

/// Deterministic rendering used when the vendor returns hits but no answer
pub fn render_hits(hits: &[WebSearchHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            let mut entry = format!("{}. {}", i + 1, hit_title(hit));
            if let Some(link) = hit.link.as_deref().filter(|l| !l.trim().is_empty()) {
                entry.push_str(&format!("\n   {}", link.trim()));
            }
            if let Some(snippet) = hit.content.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
                entry.push_str(&format!("\n   {}", snippet));
            }
            entry
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Reformat the vendor's reply into a tool result
pub fn format_search_response(query: &str, completion: &ChatCompletion) -> WebSearchOutcome {
    let hits = completion.web_search.as_deref().unwrap_or_default();
    let answer = completion
        .choices
        .first()
        .and_then(|c| c.message.as_ref())
        .and_then(|m| m.content.as_ref())
        .map(|c| c.to_text())
        .filter(|t| !t.trim().is_empty());
    let sources = collect_sources(hits);

    tracing::debug!(
        "[GLM] Web search '{}': {} hit(s), answer: {}",
        query,
        hits.len(),
        answer.is_some()
    );

    let body = match answer {
        Some(text) if sources.is_empty() => text,
        Some(text) => {
            let citations = sources
                .iter()
                .enumerate()
                .map(|(i, s)| format!("[{}] {} ({})", i + 1, s.title, s.uri))
                .collect::<Vec<_>>()
                .join("\n");
            format!("{}\n\nSources:\n{}", text, citations)
        }
        None if !hits.is_empty() => render_hits(hits),
        None => {
            return WebSearchOutcome {
                llm_content: format!("No search results found for query: \"{}\"", query),
                return_display: "No search results".to_string(),
                sources,
            };
        }
    };

    WebSearchOutcome {
        llm_content: format!("Web search results for \"{}\":\n\n{}", query, body),
        return_display: format!("Search results for \"{}\" returned.", query),
        sources,
    }
}
