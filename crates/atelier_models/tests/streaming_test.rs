//! End-to-end streaming through each adapter against a loopback server.

mod test_utils;

use atelier_core::{GenerateRequest, Input, Message, ProviderSettings, Usage};
use atelier_error::{AtelierErrorKind, ProviderErrorKind};
use atelier_interface::{FinishReason, StreamEvent};
use atelier_models::ProviderRegistry;
use test_utils::{collect, serve_once, sse_body};

fn request() -> GenerateRequest {
    GenerateRequest {
        messages: vec![Message::user(vec![Input::Text("Draw a sun".to_string())])],
        max_tokens: Some(256),
        ..GenerateRequest::default()
    }
}

#[tokio::test]
async fn test_openai_compatible_stream() -> anyhow::Result<()> {
    let body = sse_body(&[
        r#"{"choices":[{"index":0,"delta":{"role":"assistant","content":"```svg\n<svg"}}]}"#,
        r#"{"choices":[{"index":0,"delta":{"content":"></svg>\n```"},"finish_reason":"stop"}]}"#,
        r#"{"choices":[],"usage":{"prompt_tokens":9,"completion_tokens":4}}"#,
        "[DONE]",
    ]);
    let (base_url, server) = serve_once("200 OK", "text/event-stream", body).await?;

    let settings = ProviderSettings::new("custom", "local-model")
        .with_credential("test-key")
        .with_endpoint(base_url);
    let driver = ProviderRegistry::with_defaults().build(&settings)?;
    assert_eq!(driver.provider_name(), "custom");

    let (text, rest) = collect(driver.generate_stream(&request()).await?).await;
    assert_eq!(text, "```svg\n<svg></svg>\n```");
    assert_eq!(rest.len(), 1);
    assert_eq!(
        rest[0].as_ref().ok(),
        Some(&StreamEvent::Finished {
            usage: Usage {
                input_tokens: 9,
                output_tokens: 4
            },
            finish_reason: FinishReason::Stop,
        })
    );

    let captured = server.await??;
    assert!(captured.head.starts_with("post /chat/completions"));
    assert!(captured.head.contains("authorization: bearer test-key"));
    let json = captured.json()?;
    assert_eq!(json["stream"], true);
    assert_eq!(json["stream_options"]["include_usage"], true);
    assert_eq!(json["model"], "local-model");
    assert_eq!(json["max_tokens"], 256);
    Ok(())
}

#[tokio::test]
async fn test_vendor_rejection_carries_status_and_detail() -> anyhow::Result<()> {
    let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error","code":"invalid_api_key"}}"#;
    let (base_url, server) = serve_once("401 Unauthorized", "application/json", body).await?;

    let settings = ProviderSettings::new("openai", "gpt-4o")
        .with_credential("bad")
        .with_endpoint(base_url);
    let driver = ProviderRegistry::with_defaults().build(&settings)?;
    let Err(err) = driver.generate_stream(&request()).await else {
        panic!("rejected request must fail before streaming");
    };
    server.await??;

    let AtelierErrorKind::Provider(provider) = err.kind() else {
        panic!("expected provider error, got {err}");
    };
    assert_eq!(provider.kind.status(), Some(401));
    assert_eq!(
        err.summary(),
        "Incorrect API key provided | type: invalid_request_error | code: invalid_api_key (HTTP 401)"
    );
    Ok(())
}

#[tokio::test]
async fn test_truncated_stream_ends_with_error() -> anyhow::Result<()> {
    let body = sse_body(&[r#"{"choices":[{"delta":{"content":"<svg"}}]}"#]);
    let (base_url, server) = serve_once("200 OK", "text/event-stream", body).await?;

    let settings = ProviderSettings::new("custom", "m").with_endpoint(base_url);
    let driver = ProviderRegistry::with_defaults().build(&settings)?;
    let (text, rest) = collect(driver.generate_stream(&request()).await?).await;
    let captured = server.await??;

    assert_eq!(text, "<svg");
    assert!(!captured.head.contains("authorization"));
    let [Err(err)] = rest.as_slice() else {
        panic!("expected a single trailing error");
    };
    assert!(matches!(
        err.kind(),
        AtelierErrorKind::Provider(p) if matches!(p.kind, ProviderErrorKind::Stream(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_anthropic_stream() -> anyhow::Result<()> {
    let body = [
        "event: message_start\ndata: {\"type\":\"message_start\",\"message\":{\"usage\":{\"input_tokens\":11,\"output_tokens\":1}}}\n\n",
        "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"+--+\"}}\n\n",
        "event: message_delta\ndata: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"max_tokens\"},\"usage\":{\"output_tokens\":6}}\n\n",
        "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n",
    ]
    .concat();
    let (base_url, server) = serve_once("200 OK", "text/event-stream", body).await?;

    let settings = ProviderSettings::new("anthropic", "claude-test")
        .with_credential("ant-key")
        .with_endpoint(base_url);
    let driver = ProviderRegistry::with_defaults().build(&settings)?;
    let (text, rest) = collect(driver.generate_stream(&request()).await?).await;
    assert_eq!(text, "+--+");
    assert!(matches!(
        rest.as_slice(),
        [Ok(StreamEvent::Finished {
            usage: Usage {
                input_tokens: 11,
                output_tokens: 6
            },
            finish_reason: FinishReason::Length,
        })]
    ));

    let captured = server.await??;
    assert!(captured.head.starts_with("post /messages"));
    assert!(captured.head.contains("x-api-key: ant-key"));
    assert!(captured.head.contains("anthropic-version: 2023-06-01"));
    Ok(())
}

#[tokio::test]
async fn test_gemini_stream() -> anyhow::Result<()> {
    let body = sse_body(&[
        r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"<svg>"}]}}]}"#,
        r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"</svg>"}]},"finishReason":"STOP"}],"usageMetadata":{"promptTokenCount":5,"candidatesTokenCount":2}}"#,
    ]);
    let (base_url, server) = serve_once("200 OK", "text/event-stream", body).await?;

    let settings = ProviderSettings::new("google", "gemini-test")
        .with_credential("g-key")
        .with_endpoint(base_url);
    let driver = ProviderRegistry::with_defaults().build(&settings)?;
    let (text, rest) = collect(driver.generate_stream(&request()).await?).await;
    assert_eq!(text, "<svg></svg>");
    assert!(matches!(
        rest.as_slice(),
        [Ok(StreamEvent::Finished {
            finish_reason: FinishReason::Stop,
            ..
        })]
    ));

    let captured = server.await??;
    assert!(
        captured
            .head
            .starts_with("post /models/gemini-test:streamgeneratecontent?alt=sse")
    );
    assert!(captured.head.contains("x-goog-api-key: g-key"));
    Ok(())
}
