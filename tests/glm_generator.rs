use futures::StreamExt;
use glm_content_adapter::llm::{
    AuthConfig, AuthType, Content, ContentGenerator, FinishReason, FunctionCallingMode,
    FunctionDeclaration, GenerateContentParameters, GenerateContentResponse, GlmConfig,
    GlmContentGenerator, Part, Tool, ToolConfig,
};
use glm_content_adapter::AdapterError;
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CHAT_PATH: &str = "/api/paas/v4/chat/completions";

fn generator_for(server: &MockServer) -> GlmContentGenerator {
    let config = GlmConfig::new("test-key")
        .with_base_url(format!("{}/api/paas/v4", server.uri()))
        .with_user_agent("glm-test/1.0")
        .with_header("X-Trace", "abc");
    GlmContentGenerator::new(config)
}

fn hello_params() -> GenerateContentParameters {
    GenerateContentParameters::new("gemini-2.5-pro", vec![Content::user_text("hello")])
}

async fn collect(
    generator: &GlmContentGenerator,
    params: GenerateContentParameters,
) -> Vec<Result<GenerateContentResponse, AdapterError>> {
    generator
        .generate_content_stream(params)
        .await
        .unwrap()
        .collect()
        .await
}

#[tokio::test]
async fn generate_content_round_trip() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(header("authorization", "Bearer test-key"))
        .and(header("user-agent", "glm-test/1.0"))
        .and(header("x-trace", "abc"))
        .and(body_partial_json(json!({
            "model": "glm-4.7",
            "messages": [{"role": "user", "content": "hello"}],
            "thinking": {"type": "enabled", "clear_thinking": false}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "resp-1",
            "model": "glm-4.7",
            "choices": [{
                "index": 0,
                "finish_reason": "stop",
                "message": {
                    "role": "assistant",
                    "content": "Hello world",
                    "reasoning_content": "thinking",
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "do_work", "arguments": "{\"path\":\"foo\"}"}
                    }]
                }
            }],
            "usage": {
                "prompt_tokens": 10,
                "completion_tokens": 5,
                "total_tokens": 15,
                "completion_tokens_details": {"reasoning_tokens": 2}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resp = generator_for(&server)
        .generate_content(hello_params())
        .await
        .unwrap();

    assert_eq!(resp.response_id, "resp-1");
    assert_eq!(
        resp.parts(),
        &[
            Part::thought("thinking"),
            Part::text("Hello world"),
            Part::function_call(Some("call_1".into()), "do_work", json!({"path": "foo"})),
        ]
    );
    assert_eq!(resp.function_calls.len(), 1);
    assert_eq!(resp.finish_reason(), Some(FinishReason::Stop));

    let usage = resp.usage_metadata.unwrap();
    assert_eq!(usage.prompt_token_count, 10);
    assert_eq!(usage.candidates_token_count, 5);
    assert_eq!(usage.total_token_count, 15);
    assert_eq!(usage.thoughts_token_count, Some(2));
}

#[tokio::test]
async fn request_carries_history_and_tools() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(body_partial_json(json!({
            "model": "glm-4.6",
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "read foo"},
                {
                    "role": "assistant",
                    "content": null,
                    "reasoning_content": "need file",
                    "tool_calls": [{
                        "id": "c1",
                        "type": "function",
                        "function": {"name": "read", "arguments": "{\"p\":\"foo\"}"}
                    }]
                },
                {"role": "tool", "name": "read", "tool_call_id": "c1", "content": "{\"ok\":true}"}
            ],
            "tools": [{"type": "function", "function": {"name": "read"}}],
            "tool_choice": {"type": "function", "function": {"name": "read"}},
            "temperature": 0.5
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "done"}, "finish_reason": "stop"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut params = GenerateContentParameters::new(
        "glm-4.6",
        vec![
            Content::user_text("read foo"),
            Content::model(vec![
                Part::thought("need file"),
                Part::function_call(Some("c1".into()), "read", json!({"p": "foo"})),
            ]),
            Content::user(vec![Part::function_response(
                Some("c1".into()),
                "read",
                json!({"ok": true}),
            )]),
        ],
    )
    .with_system_instruction("be brief")
    .with_tools(vec![Tool {
        function_declarations: vec![
            FunctionDeclaration::new("read", "Read a file", json!({"type": "object"})),
            FunctionDeclaration::new("write", "Write a file", json!({"type": "object"})),
        ],
    }])
    .with_tool_config(ToolConfig::with_mode(
        FunctionCallingMode::Any,
        Some(vec!["read".into()]),
    ));
    params.config.temperature = Some(0.5);

    let resp = generator_for(&server).generate_content(params).await.unwrap();
    assert_eq!(resp.text(), "done");
    // model id without the glm- prefix falls back, otherwise passes through
    assert_eq!(resp.model_version, "glm-4.6");
}

#[tokio::test]
async fn streaming_text_then_tool_call() {
    let server = MockServer::start().await;

    let sse = concat!(
        "data: {\"id\":\"s1\",\"choices\":[{\"index\":0,\"delta\":{\"reasoning_content\":\"hmm\"}}]}\n\n",
        "data: {\"id\":\"s1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hi\"}}]}\n\n",
        "data: {\"id\":\"s1\",\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[{\"function\":{\"name\":\"plan\",\"arguments\":\"{\\\"x\\\":1}\"}}]},\"finish_reason\":\"stop\"}]}\n\n",
        "data: {\"id\":\"s1\",\"choices\":[],\"usage\":{\"prompt_tokens\":3,\"completion_tokens\":4,\"total_tokens\":7}}\n\n",
        "data: [DONE]\n\n",
    );

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(body_partial_json(json!({
            "stream": true,
            "stream_options": {"include_usage": true}
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_raw(sse, "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let fragments: Vec<_> = collect(&generator_for(&server), hello_params())
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    assert_eq!(fragments.len(), 4);
    assert_eq!(fragments[0].parts(), &[Part::thought("hmm")]);
    assert_eq!(fragments[1].parts(), &[Part::text("Hi")]);
    assert_eq!(fragments[1].finish_reason(), None);

    let calls = &fragments[2].function_calls;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].name, "plan");
    assert_eq!(calls[0].args, json!({"x": 1}));
    assert_eq!(fragments[2].finish_reason(), Some(FinishReason::Stop));

    assert!(fragments[3].parts().is_empty());
    assert_eq!(fragments[3].usage_metadata.as_ref().unwrap().total_token_count, 7);
    assert!(fragments.iter().all(|f| f.response_id == "s1"));
}

#[tokio::test]
async fn streaming_skips_malformed_records() {
    let server = MockServer::start().await;

    let sse = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n",
        "data: {this is not json}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"b\"},\"finish_reason\":\"length\"}]}\n\n",
    );

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
        .mount(&server)
        .await;

    let fragments: Vec<_> = collect(&generator_for(&server), hello_params())
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    let text: String = fragments.iter().map(|f| f.text()).collect();
    assert_eq!(text, "ab");
    assert_eq!(
        fragments.last().unwrap().finish_reason(),
        Some(FinishReason::MaxTokens)
    );
}

#[tokio::test]
async fn http_error_carries_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_string("{\"error\":{\"message\":\"rate limited\"}}"),
        )
        .mount(&server)
        .await;

    let generator = generator_for(&server);

    let err = generator.generate_content(hello_params()).await.unwrap_err();
    match &err {
        AdapterError::Http { status, body } => {
            assert_eq!(*status, 429);
            assert!(body.contains("rate limited"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("429"));

    let err = match generator.generate_content_stream(hello_params()).await {
        Err(e) => e,
        Ok(_) => panic!("stream should fail before yielding"),
    };
    assert_eq!(err.status(), Some(429));
}

#[tokio::test]
async fn streaming_without_body_is_missing_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let result = generator_for(&server)
        .generate_content_stream(hello_params())
        .await;
    assert!(matches!(result, Err(AdapterError::MissingBody)));
}

#[tokio::test]
async fn zero_choices_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "x", "choices": []})))
        .mount(&server)
        .await;

    let err = generator_for(&server)
        .generate_content(hello_params())
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::NoChoices));
    assert!(err.to_string().contains("no choices"));
}

#[tokio::test]
async fn undecodable_body_is_invalid_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let err = generator_for(&server)
        .generate_content(hello_params())
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::InvalidResponse(_)));
}

#[tokio::test]
async fn cancellation_aborts_in_flight_call() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(10))
                .set_body_json(json!({"choices": [{"message": {"content": "late"}}]})),
        )
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let params = hello_params().with_abort_signal(cancel);
    let err = generator_for(&server)
        .generate_content(params)
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::Cancelled));
}

#[tokio::test]
async fn dynamic_auth_overrides_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/proxy/chat/completions"))
        .and(header("authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "via proxy"}, "finish_reason": "stop"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let base = format!("{}/proxy", server.uri());
    let generator = GlmContentGenerator::with_auth_provider(GlmConfig::default(), move || {
        let base = base.clone();
        async move { Ok::<_, anyhow::Error>(AuthConfig::with_base_url("fresh-token", base)) }
    });

    let resp = generator.generate_content(hello_params()).await.unwrap();
    assert_eq!(resp.text(), "via proxy");
}

#[tokio::test]
async fn web_search_uses_native_tool() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(body_partial_json(json!({
            "messages": [{"role": "user", "content": "rust 2024 edition"}],
            "tools": [{
                "type": "web_search",
                "web_search": {
                    "enable": true,
                    "search_result": true,
                    "search_query": "rust 2024 edition"
                }
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": ""}, "finish_reason": "stop"}],
            "web_search": [{
                "title": "Rust 2024",
                "link": "https://blog.rust-lang.org/2025/02/20/Rust-1.85.0.html",
                "content": "The 2024 edition is stable."
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let generator = generator_for(&server).with_auth_type(AuthType::Glm);
    let outcome = generator.web_search("rust 2024 edition", None).await.unwrap();

    assert_eq!(outcome.sources.len(), 1);
    assert_eq!(outcome.sources[0].title, "Rust 2024");
    assert!(outcome.llm_content.contains("1. Rust 2024"));
    assert!(outcome.llm_content.contains("The 2024 edition is stable."));
}
