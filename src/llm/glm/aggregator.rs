//! Stream aggregator: GLM chunks -> canonical response fragments
//!
//! Text and reasoning deltas are forwarded as they arrive. Tool-call deltas are
//! buffered per call until a terminal finish reason, then emitted together as
//! one fragment of parsed function calls.

use futures::stream::Stream;
use futures::StreamExt;
use std::collections::HashMap;

use super::convert::{ParsedArgs, FALLBACK_TOOL_ID};
use super::response::{map_finish_reason, map_usage};
use super::wire::{ChatCompletionChunk, ChunkChoice, ToolCallDelta};
use crate::core::AdapterResult;
use crate::llm::types::{FinishReason, GenerateContentResponse, Part, UsageMetadata};

/// A tool call whose arguments are still arriving
#[derive(Debug, Clone, PartialEq)]
pub struct PendingToolCall {
    pub id: String,
    pub name: String,
    /// Concatenated argument fragments; not valid JSON until complete
    pub args: String,
}

impl PendingToolCall {
    fn into_part(self) -> Part {
        let args = ParsedArgs::parse(&self.args).into_value();
        Part::function_call(Some(self.id), self.name, args)
    }
}

/// Per-stream aggregation state. Never shared between calls.
#[derive(Debug)]
pub struct StreamAggregator {
    /// Pending calls in first-seen order, keyed by tracking key
    pending: Vec<(String, PendingToolCall)>,
    /// Stream `index` of a call -> its tracking key
    index_keys: HashMap<u32, String>,
    response_id: String,
    model: String,
    /// Last mapped finish reason seen on any choice
    last_finish: Option<FinishReason>,
    /// Usage from a chunk that produced no fragment, held for the next one
    carried_usage: Option<UsageMetadata>,
}

impl StreamAggregator {
    /// `model` is reported on fragments whose chunk does not name one
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            pending: Vec::new(),
            index_keys: HashMap::new(),
            response_id: uuid::Uuid::new_v4().to_string(),
            model: model.into(),
            last_finish: None,
            carried_usage: None,
        }
    }

    /// Number of tool calls still accumulating
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Tool call state for a tracking key
    pub fn pending(&self, key: &str) -> Option<&PendingToolCall> {
        self.pending
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, call)| call)
    }

    /// Consume one chunk, returning zero or more fragments in emission order
    pub fn consume_chunk(&mut self, chunk: ChatCompletionChunk) -> Vec<GenerateContentResponse> {
        let response_id = chunk.id.unwrap_or_else(|| self.response_id.clone());
        let model = chunk.model.unwrap_or_else(|| self.model.clone());
        // A newer usage report replaces a carried one
        let usage = chunk
            .usage
            .as_ref()
            .map(map_usage)
            .or_else(|| self.carried_usage.take());

        if chunk.choices.is_empty() {
            // Usage-only trailer
            return match usage {
                Some(usage) => vec![GenerateContentResponse::single(
                    response_id,
                    model,
                    Vec::new(),
                    None,
                    Some(usage),
                )],
                None => Vec::new(),
            };
        }

        let mut fragments = Vec::new();
        for choice in chunk.choices {
            self.consume_choice(choice, &response_id, &model, usage.as_ref(), &mut fragments);
        }

        if fragments.iter().all(|f| f.usage_metadata.is_none()) {
            self.carried_usage = usage;
        }
        fragments
    }

    fn consume_choice(
        &mut self,
        choice: ChunkChoice,
        response_id: &str,
        model: &str,
        usage: Option<&UsageMetadata>,
        fragments: &mut Vec<GenerateContentResponse>,
    ) {
        let finish_reason = map_finish_reason(choice.finish_reason.as_deref());
        if finish_reason.is_some() {
            self.last_finish = finish_reason;
        }
        let delta = choice.delta;

        // 1. Reasoning and text
        let mut parts = Vec::new();
        if let Some(reasoning) = delta.reasoning_content.filter(|r| !r.is_empty()) {
            parts.push(Part::thought(reasoning));
        }
        if let Some(text) = delta.content.filter(|t| !t.is_empty()) {
            parts.push(Part::text(text));
        }
        let emitted_content = !parts.is_empty();
        if emitted_content {
            fragments.push(GenerateContentResponse::single(
                response_id,
                model,
                parts,
                finish_reason,
                usage.cloned(),
            ));
        }

        // 2. Tool-call deltas
        for tool_delta in delta.tool_calls.unwrap_or_default() {
            self.apply_tool_delta(tool_delta);
        }

        // 3. Terminal chunk completes pending calls
        let terminal = matches!(
            finish_reason,
            Some(FinishReason::Stop) | Some(FinishReason::MaxTokens)
        );
        if terminal && !self.pending.is_empty() {
            let calls = self.take_pending();
            tracing::debug!("[GLM] Stream: completing {} tool call(s)", calls.len());
            fragments.push(GenerateContentResponse::single(
                response_id,
                model,
                calls,
                finish_reason,
                if emitted_content { None } else { usage.cloned() },
            ));
        } else if !emitted_content && finish_reason.is_some() {
            // 4. Finish signal with no content
            fragments.push(GenerateContentResponse::single(
                response_id,
                model,
                Vec::new(),
                finish_reason,
                usage.cloned(),
            ));
        }
    }

    fn resolve_key(&self, delta: &ToolCallDelta) -> String {
        if let Some(id) = delta.id.as_deref().filter(|s| !s.is_empty()) {
            return id.to_string();
        }
        let name = delta
            .function
            .as_ref()
            .and_then(|f| f.name.as_deref())
            .filter(|s| !s.is_empty());
        if let Some(name) = name {
            return name.to_string();
        }
        // Continuation delta: same stream index as an earlier call
        if let Some(key) = delta.index.and_then(|i| self.index_keys.get(&i)) {
            return key.clone();
        }
        FALLBACK_TOOL_ID.to_string()
    }

    fn apply_tool_delta(&mut self, delta: ToolCallDelta) {
        let key = self.resolve_key(&delta);
        if let Some(index) = delta.index {
            self.index_keys.insert(index, key.clone());
        }

        let (name, arguments) = match delta.function {
            Some(f) => (f.name.filter(|n| !n.is_empty()), f.arguments.unwrap_or_default()),
            None => (None, String::new()),
        };

        match self.pending.iter_mut().find(|(k, _)| *k == key) {
            Some((_, call)) => {
                call.args.push_str(&arguments);
                if let Some(name) = name {
                    call.name = name;
                }
            }
            None => {
                let call = PendingToolCall {
                    id: delta.id.filter(|s| !s.is_empty()).unwrap_or_else(|| key.clone()),
                    name: name.unwrap_or_else(|| key.clone()),
                    args: arguments,
                };
                self.pending.push((key, call));
            }
        }
    }

    fn take_pending(&mut self) -> Vec<Part> {
        self.index_keys.clear();
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|(_, call)| call.into_part())
            .collect()
    }

    /// Close the stream: flush calls that never saw a finish reason, and
    /// deliver any usage still held back
    ///
    /// Calls still pending after a `SAFETY` finish were blocked by the vendor
    /// and are dropped.
    pub fn finish(&mut self) -> Option<GenerateContentResponse> {
        let usage = self.carried_usage.take();
        let mut calls = Vec::new();

        if !self.pending.is_empty() {
            match self.last_finish {
                Some(reason @ FinishReason::Safety) => {
                    tracing::warn!(
                        "[GLM] Dropping {} tool call(s) stopped by {:?}",
                        self.pending.len(),
                        reason
                    );
                    self.pending.clear();
                    self.index_keys.clear();
                }
                _ => {
                    tracing::warn!(
                        "[GLM] Stream ended with {} unfinished tool call(s); flushing",
                        self.pending.len()
                    );
                    calls = self.take_pending();
                }
            }
        }

        if calls.is_empty() && usage.is_none() {
            return None;
        }
        Some(GenerateContentResponse::single(
            self.response_id.clone(),
            self.model.clone(),
            calls,
            None,
            usage,
        ))
    }
}

/// Aggregate a chunk stream into a fragment stream
pub fn aggregate<S>(
    chunks: S,
    model: String,
) -> impl Stream<Item = AdapterResult<GenerateContentResponse>> + Send
where
    S: Stream<Item = AdapterResult<ChatCompletionChunk>> + Send + 'static,
{
    async_stream::try_stream! {
        let mut chunks = Box::pin(chunks);
        let mut aggregator = StreamAggregator::new(model);

        while let Some(chunk) = chunks.next().await {
            for fragment in aggregator.consume_chunk(chunk?) {
                yield fragment;
            }
        }

        if let Some(fragment) = aggregator.finish() {
            yield fragment;
        }
    }
}
