use std::time::Duration;

use futures::StreamExt;
use gemini_wrapper::{
    BackoffConfig, ClientError, GeminiClient, RequestOptions, Settings, StreamToken,
};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_settings(server: &MockServer) -> Settings {
    Settings::builder()
        .api_key("test-key")
        .endpoint(server.uri())
        .max_retries(2)
        .timeout(Duration::from_secs(5))
        .backoff(BackoffConfig {
            base: Duration::from_millis(10),
            max: Duration::from_millis(50),
        })
        .build()
        .expect("settings")
}

async fn collect_tokens(client: &GeminiClient, prompt: &str) -> Vec<StreamToken> {
    let mut stream = client
        .stream_complete(prompt, &RequestOptions::default())
        .await
        .expect("stream");
    let mut tokens = Vec::new();
    while let Some(item) = stream.next().await {
        tokens.push(item.expect("token"));
    }
    tokens
}

#[tokio::test]
async fn streamed_fragments_concatenate_to_the_non_streaming_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/complete"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "one two three" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "data: {\"text\":\"one \"}\n\ndata: {\"text\":\"two \"}\n\ndata: {\"text\":\"three\"}\n\ndata: [DONE]\n\n",
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    let client = GeminiClient::new(test_settings(&server)).unwrap();
    let full = client
        .complete("list 3 numbers", &RequestOptions::default())
        .await
        .unwrap();
    let tokens = collect_tokens(&client, "list 3 numbers").await;

    let concatenated: String = tokens
        .iter()
        .filter(|t| !t.done)
        .map(|t| t.text.as_str())
        .collect();
    assert_eq!(concatenated, full.text);

    // Exactly one terminal event, and it is the last delivery.
    let terminals: Vec<_> = tokens.iter().filter(|t| t.done).collect();
    assert_eq!(terminals.len(), 1);
    assert!(tokens.last().unwrap().done);
}

#[tokio::test]
async fn stream_requests_ask_for_event_streams() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/stream"))
        .and(header("accept", "text/event-stream"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("data: [DONE]\n\n", "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = GeminiClient::new(test_settings(&server)).unwrap();
    let tokens = collect_tokens(&client, "hi").await;
    assert_eq!(tokens.len(), 1);
    assert!(tokens[0].done);
}

#[tokio::test]
async fn ndjson_bodies_with_a_done_flag_terminate_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "{\"text\":\"alpha \"}\n{\"text\":\"beta\"}\n{\"done\": true}\n",
            "application/x-ndjson",
        ))
        .mount(&server)
        .await;

    let client = GeminiClient::new(test_settings(&server)).unwrap();
    let tokens = collect_tokens(&client, "hi").await;
    let texts: Vec<_> = tokens
        .iter()
        .filter(|t| !t.done)
        .map(|t| t.text.clone())
        .collect();
    assert_eq!(texts, vec!["alpha ".to_string(), "beta".to_string()]);
    assert!(tokens.last().unwrap().done);
}

#[tokio::test]
async fn stream_setup_retries_transient_provider_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/stream"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "data: {\"text\":\"after retry\"}\n\ndata: [DONE]\n\n",
            "text/event-stream",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = GeminiClient::new(test_settings(&server)).unwrap();
    let tokens = collect_tokens(&client, "hi").await;
    assert_eq!(tokens[0].text, "after retry");
}

#[tokio::test]
async fn cancelling_a_stream_surfaces_cancelled_and_stops_delivery() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "data: {\"text\":\"never seen\"}\n\ndata: [DONE]\n\n",
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    let client = GeminiClient::new(test_settings(&server)).unwrap();
    let mut stream = client
        .stream_complete("hi", &RequestOptions::default())
        .await
        .unwrap();
    stream.cancel();
    match stream.next().await {
        Some(Err(ClientError::Cancelled)) => {}
        other => panic!("expected Cancelled, got {other:?}"),
    }
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn gemini_candidate_chunks_stream_their_text_parts() {
    let server = MockServer::start().await;
    let body = format!(
        "data: {}\n\ndata: {}\n\ndata: [DONE]\n\n",
        json!({ "candidates": [{ "content": { "parts": [{ "text": "hel" }] } }] }),
        json!({ "candidates": [{ "content": { "parts": [{ "text": "lo" }] } }] }),
    );
    Mock::given(method("POST"))
        .and(path("/v1/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let client = GeminiClient::new(test_settings(&server)).unwrap();
    let tokens = collect_tokens(&client, "hi").await;
    let concatenated: String = tokens
        .iter()
        .filter(|t| !t.done)
        .map(|t| t.text.as_str())
        .collect();
    assert_eq!(concatenated, "hello");
}
