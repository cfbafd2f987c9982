//! Mock tests for the streaming chat transport
//!
//! These tests use WireMock to simulate an OpenAI-compatible provider and
//! verify that `ChatClient` speaks the streaming protocol correctly.

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use futures::TryStreamExt;
    use serde_json::{json, Value};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::agents::{invoke, AgentRole};
    use crate::config::{
        AnalysisSettings, EndpointConfig, OpenRouterConfig, ProviderKind, ProviderProfile,
    };
    use crate::core::{CallOptions, ChatTransport};
    use crate::error::PipelineError;
    use crate::pipeline::{analyze_note, NoopSink};
    use crate::tests::support::sample_note;
    use crate::transport::models::ChatCompletionRequest;
    use crate::transport::ChatClient;

    /// Sets up a mock provider server
    async fn setup_mock_server() -> MockServer {
        MockServer::start().await
    }

    fn deepseek_profile(server: &MockServer, api_key: &str) -> ProviderProfile {
        ProviderProfile::DeepSeek(EndpointConfig {
            base_url: server.uri(),
            api_key: api_key.to_string(),
            model: "deepseek-chat".to_string(),
        })
    }

    /// Encode deltas as an SSE body terminated by `[DONE]`
    fn sse_body(deltas: &[&str]) -> String {
        let mut body = String::new();
        for delta in deltas {
            let chunk = json!({
                "id": "chatcmpl-mock",
                "choices": [{"index": 0, "delta": {"content": delta}, "finish_reason": null}]
            });
            body.push_str(&format!("data: {}\n\n", chunk));
        }
        body.push_str("data: [DONE]\n\n");
        body
    }

    fn sse_response(deltas: &[&str]) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(sse_body(deltas), "text/event-stream")
    }

    fn simple_request() -> ChatCompletionRequest {
        crate::agents::build_request("deepseek-chat", AgentRole::Intent, "sys", "笔记内容")
    }

    #[tokio::test]
    async fn test_streaming_snapshots_over_sse() {
        // Setup mock server
        let mock_server = setup_mock_server().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(sse_response(&["第2题", "", "：导数", "符号错误"]))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = ChatClient::new(deepseek_profile(&mock_server, "test-key")).unwrap();
        let snapshots = Mutex::new(Vec::new());
        let on_token = |text: &str| snapshots.lock().unwrap().push(text.to_string());

        let result = invoke(
            &client,
            "deepseek-chat",
            AgentRole::Original,
            "sys",
            "user",
            Some(&on_token),
            &CallOptions::new(),
        )
        .await
        .unwrap();

        // Verify the accumulated text and the snapshot sequence
        assert_eq!(result.text, "第2题：导数符号错误");
        let snapshots = snapshots.into_inner().unwrap();
        assert_eq!(
            snapshots,
            vec!["第2题", "第2题：导数", "第2题：导数符号错误"]
        );
    }

    #[tokio::test]
    async fn test_request_body_is_streaming_chat_completion() {
        let mock_server = setup_mock_server().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(sse_response(&["ok"]))
            .mount(&mock_server)
            .await;

        let client = ChatClient::new(deepseek_profile(&mock_server, "test-key")).unwrap();
        let mut request = simple_request();
        request.stream = false;

        let deltas: Vec<String> = client
            .stream_chat(request)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(deltas, vec!["ok"]);

        let requests = mock_server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["stream"], json!(true));
        assert_eq!(body["model"], json!("deepseek-chat"));
        assert_eq!(body["max_tokens"], json!(1024));
        assert_eq!(body["messages"][0]["role"], json!("system"));
        assert_eq!(body["messages"][1]["role"], json!("user"));
        assert_eq!(body["messages"][1]["content"], json!("笔记内容"));
    }

    #[tokio::test]
    async fn test_openrouter_attribution_headers() {
        let mock_server = setup_mock_server().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("HTTP-Referer", "https://notes.example.com"))
            .and(header("X-Title", "Review Notes"))
            .respond_with(sse_response(&["ok"]))
            .expect(1)
            .mount(&mock_server)
            .await;

        let profile = ProviderProfile::OpenRouter(OpenRouterConfig {
            endpoint: EndpointConfig {
                base_url: format!("{}/", mock_server.uri()),
                api_key: "or-key".to_string(),
                model: "qwen/qwen3-vl-235b-a22b-instruct".to_string(),
            },
            site_url: Some("https://notes.example.com".to_string()),
            site_name: Some("Review Notes".to_string()),
        });
        let client = ChatClient::new(profile).unwrap();

        let deltas: Vec<String> = client
            .stream_chat(simple_request())
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(deltas, vec!["ok"]);
    }

    #[tokio::test]
    async fn test_empty_api_key_fails_before_any_request() {
        let mock_server = setup_mock_server().await;

        Mock::given(method("POST"))
            .respond_with(sse_response(&["unreachable"]))
            .expect(0)
            .mount(&mock_server)
            .await;

        // Building the client succeeds; the first request fails
        let client = ChatClient::new(deepseek_profile(&mock_server, "  ")).unwrap();
        let err = client.stream_chat(simple_request()).await.err().unwrap();

        assert!(matches!(err.root(), PipelineError::Configuration(_)));
        assert_eq!(err.category(), "configuration");
        assert!(mock_server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_authentication() {
        let mock_server = setup_mock_server().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {
                    "message": "Incorrect API key provided",
                    "type": "invalid_request_error",
                    "code": "invalid_api_key"
                }
            })))
            .mount(&mock_server)
            .await;

        let client = ChatClient::new(deepseek_profile(&mock_server, "bad-key")).unwrap();
        let err = client.stream_chat(simple_request()).await.err().unwrap();

        assert!(matches!(err.root(), PipelineError::Authentication(_)));
        assert_eq!(err.status_code(), Some(401));
        assert!(err.is_permanent());
        assert!(err.user_message().contains("API 密钥"));
    }

    #[tokio::test]
    async fn test_rate_limit_carries_retry_after() {
        let mock_server = setup_mock_server().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("Retry-After", "20")
                    .set_body_json(json!({"error": {"message": "Rate limit reached"}})),
            )
            .mount(&mock_server)
            .await;

        let client = ChatClient::new(deepseek_profile(&mock_server, "test-key")).unwrap();
        let err = client.stream_chat(simple_request()).await.err().unwrap();

        assert!(matches!(err.root(), PipelineError::RateLimit(_)));
        assert_eq!(err.status_code(), Some(429));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_server_error_with_plain_text_body() {
        let mock_server = setup_mock_server().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
            .mount(&mock_server)
            .await;

        let client = ChatClient::new(deepseek_profile(&mock_server, "test-key")).unwrap();
        let err = client.stream_chat(simple_request()).await.err().unwrap();

        assert!(matches!(err.root(), PipelineError::Service(_)));
        assert!(err.to_string().contains("upstream unavailable"));
    }

    #[tokio::test]
    async fn test_inline_stream_error_fails_the_call() {
        let mock_server = setup_mock_server().await;

        let mut body = sse_body(&["部分"]);
        body = body.replace(
            "data: [DONE]\n\n",
            "data: {\"error\": {\"message\": \"Provider overloaded\", \"code\": 503}}\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&mock_server)
            .await;

        let client = ChatClient::new(deepseek_profile(&mock_server, "test-key")).unwrap();
        let err = invoke(
            &client,
            "deepseek-chat",
            AgentRole::Summary,
            "sys",
            "user",
            None,
            &CallOptions::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err.root(), PipelineError::Service(_)));
    }

    #[tokio::test]
    async fn test_analyze_note_end_to_end() {
        let mock_server = setup_mock_server().await;

        // One reply serves every agent, and its first line passes review
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(sse_response(&["PASS", "\n第2题 单选题"]))
            .expect(5)
            .mount(&mock_server)
            .await;

        let settings = AnalysisSettings::default();
        let result = analyze_note(
            &settings,
            deepseek_profile(&mock_server, "test-key"),
            &sample_note(),
            &NoopSink,
        )
        .await
        .unwrap();

        assert!(result.review_passed);
        assert_eq!(result.intent, "PASS\n第2题 单选题");
        assert!(!result.original.is_empty());
        assert!(!result.correction.is_empty());
        assert!(!result.summary.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_analysis_is_a_configuration_error() {
        let mock_server = setup_mock_server().await;

        Mock::given(method("POST"))
            .respond_with(sse_response(&["unreachable"]))
            .expect(0)
            .mount(&mock_server)
            .await;

        let settings = AnalysisSettings {
            enabled: false,
            ..AnalysisSettings::default()
        };
        let err = analyze_note(
            &settings,
            deepseek_profile(&mock_server, "test-key"),
            &sample_note(),
            &NoopSink,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_profile_must_match_selected_provider() {
        let mock_server = setup_mock_server().await;

        Mock::given(method("POST"))
            .respond_with(sse_response(&["unreachable"]))
            .expect(0)
            .mount(&mock_server)
            .await;

        let settings = AnalysisSettings {
            provider: ProviderKind::OpenRouter,
            ..AnalysisSettings::default()
        };
        let err = analyze_note(
            &settings,
            deepseek_profile(&mock_server, "test-key"),
            &sample_note(),
            &NoopSink,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PipelineError::Configuration(_)));
        assert!(err.to_string().contains("openrouter"));
    }

    #[tokio::test]
    async fn test_client_is_shareable_across_tasks() {
        let mock_server = setup_mock_server().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(sse_response(&["a", "b"]))
            .expect(2)
            .mount(&mock_server)
            .await;

        let client: Arc<dyn ChatTransport> =
            Arc::new(ChatClient::new(deepseek_profile(&mock_server, "test-key")).unwrap());

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let client = client.clone();
                tokio::spawn(async move {
                    invoke(
                        client.as_ref(),
                        "deepseek-chat",
                        AgentRole::Correction,
                        "sys",
                        "user",
                        None,
                        &CallOptions::new(),
                    )
                    .await
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().text, "ab");
        }
    }
}
