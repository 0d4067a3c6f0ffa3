//! Test utilities for provider adapter tests.
//!
//! A one-shot HTTP server on the loopback interface stands in for the
//! vendor, so no test reaches the network.

#![allow(dead_code)]

use atelier_interface::{EventStream, StreamEvent};
use futures::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// What the server received.
#[derive(Debug)]
pub struct CapturedRequest {
    /// Request line and headers, lowercased
    pub head: String,
    /// Request body
    pub body: String,
}

impl CapturedRequest {
    /// Body parsed as JSON.
    pub fn json(&self) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Serve exactly one response, returning the base URL and a handle yielding
/// the captured request.
pub async fn serve_once(
    status: &str,
    content_type: &str,
    body: impl Into<String>,
) -> anyhow::Result<(String, JoinHandle<anyhow::Result<CapturedRequest>>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let base_url = format!("http://{}", listener.local_addr()?);
    let status = status.to_string();
    let content_type = content_type.to_string();
    let body = body.into();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await?;
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let n = socket.read(&mut chunk).await?;
            anyhow::ensure!(n > 0, "client closed before sending headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let head = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
        let length = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                (name == "content-length").then(|| value.trim().parse::<usize>().ok())?
            })
            .unwrap_or(0);
        while buf.len() < header_end + length {
            let n = socket.read(&mut chunk).await?;
            anyhow::ensure!(n > 0, "client closed before sending body");
            buf.extend_from_slice(&chunk[..n]);
        }
        let request_body =
            String::from_utf8_lossy(&buf[header_end..header_end + length]).into_owned();

        let response = format!(
            "HTTP/1.1 {}\r\ncontent-type: {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status,
            content_type,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await?;
        socket.shutdown().await?;
        Ok(CapturedRequest {
            head,
            body: request_body,
        })
    });

    Ok((base_url, handle))
}

/// Server-sent events body from `data:` payloads.
pub fn sse_body(payloads: &[&str]) -> String {
    payloads
        .iter()
        .map(|payload| format!("data: {}\n\n", payload))
        .collect()
}

/// Drain a stream into its concatenated text and remaining events.
pub async fn collect(
    mut stream: EventStream,
) -> (String, Vec<atelier_error::AtelierResult<StreamEvent>>) {
    let mut text = String::new();
    let mut rest = Vec::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(StreamEvent::TextDelta(delta)) => text.push_str(&delta),
            other => rest.push(other),
        }
    }
    (text, rest)
}
