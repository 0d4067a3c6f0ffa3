//! Shared plumbing for streaming provider calls.

use crate::metrics::{LlmMetrics, classify_error};
use crate::sse::{SseDecoder, SseEvent};
use crate::vendor::parse_vendor_error;
use atelier_core::{Input, MediaSource};
use atelier_error::{AtelierError, AtelierResult, ProviderError, ProviderErrorKind};
use atelier_interface::{EventStream, StreamEvent};
use base64::Engine;
use futures::{Stream, StreamExt};
use std::time::Instant;
use tracing::{debug, error};

/// Vendor-specific interpretation of server-sent events.
pub(crate) trait ChunkDecoder: Send + 'static {
    /// Apply one event, returning any text it carried.
    fn decode(&mut self, event: &SseEvent) -> AtelierResult<Option<String>>;

    /// Whether the vendor signalled the end of the stream.
    fn is_done(&self) -> bool;

    /// Final event once no more events will arrive.
    fn finish(self) -> AtelierResult<StreamEvent>;
}

/// Send `request` and decode its event stream with `decoder`.
///
/// Transport failures and non-success statuses are returned before any
/// event is produced; everything after that is yielded by the stream.
pub(crate) async fn open_stream<D: ChunkDecoder>(
    provider: &'static str,
    model: &str,
    request: reqwest::RequestBuilder,
    decoder: D,
) -> AtelierResult<EventStream> {
    let started = Instant::now();
    let response = match send(provider, request).await {
        Ok(response) => response,
        Err(e) => {
            LlmMetrics::get().record_error(provider, model, classify_error(&e));
            return Err(e);
        }
    };
    debug!(provider, model, "Provider stream opened");
    let events = decode_events(sse_events(response), decoder);
    Ok(observe(Box::pin(events), provider, model.to_string(), started))
}

async fn send(
    provider: &'static str,
    request: reqwest::RequestBuilder,
) -> AtelierResult<reqwest::Response> {
    let response = request.send().await.map_err(|e| {
        error!(provider, error = ?e, "Failed to send provider request");
        ProviderError::new(ProviderErrorKind::Transport(e.to_string()))
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let detail = parse_vendor_error(&body);
        error!(provider, status = status.as_u16(), detail = %detail, "Provider rejected request");
        return Err(ProviderError::new(ProviderErrorKind::Api {
            status: status.as_u16(),
            detail,
        })
        .into());
    }
    Ok(response)
}

fn sse_events(response: reqwest::Response) -> impl Stream<Item = AtelierResult<SseEvent>> + Send {
    async_stream::stream! {
        let mut bytes = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut broken = false;
        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(chunk) => {
                    for event in decoder.push(&chunk) {
                        yield Ok(event);
                    }
                }
                Err(e) => {
                    broken = true;
                    yield Err(ProviderError::new(ProviderErrorKind::Stream(e.to_string())).into());
                    break;
                }
            }
        }
        if !broken && let Some(event) = decoder.finish() {
            yield Ok(event);
        }
    }
}

/// Turn raw events into provider stream events.
///
/// The stream ends after the first error or after the final
/// [`StreamEvent::Finished`].
pub(crate) fn decode_events<S, D>(
    events: S,
    mut decoder: D,
) -> impl Stream<Item = AtelierResult<StreamEvent>> + Send
where
    S: Stream<Item = AtelierResult<SseEvent>> + Send + 'static,
    D: ChunkDecoder,
{
    async_stream::stream! {
        let mut events = Box::pin(events);
        let mut failure: Option<AtelierError> = None;
        while let Some(event) = events.next().await {
            match event.and_then(|event| decoder.decode(&event)) {
                Ok(Some(text)) if !text.is_empty() => yield Ok(StreamEvent::TextDelta(text)),
                Ok(_) => {}
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
            if decoder.is_done() {
                break;
            }
        }
        match failure {
            Some(e) => yield Err(e),
            None => yield decoder.finish(),
        }
    }
}

fn observe(
    stream: EventStream,
    provider: &'static str,
    model: String,
    started: Instant,
) -> EventStream {
    Box::pin(stream.inspect(move |item| {
        let metrics = LlmMetrics::get();
        match item {
            Ok(StreamEvent::Finished { usage, .. }) => {
                metrics.record_request(provider, &model, started.elapsed().as_secs_f64());
                metrics.record_tokens(
                    provider,
                    &model,
                    usage.input_tokens,
                    usage.output_tokens,
                );
            }
            Ok(StreamEvent::TextDelta(_)) => {}
            Err(e) => metrics.record_error(provider, &model, classify_error(e)),
        }
    }))
}

/// Error for a stream that closed before the vendor's end marker.
pub(crate) fn truncated() -> AtelierError {
    ProviderError::new(ProviderErrorKind::Stream(
        "Stream ended before the provider finished".to_string(),
    ))
    .into()
}

/// Error for an event body that could not be decoded.
pub(crate) fn malformed(data: &str, e: serde_json::Error) -> AtelierError {
    let preview: String = data.chars().take(200).collect();
    ProviderError::new(ProviderErrorKind::Parse(format!("{} (data: {})", e, preview))).into()
}

/// Image part as `(mime, base64 payload)`, or `None` for remote URLs.
pub(crate) fn inline_image(input: &Input) -> Option<(String, String)> {
    let Input::Image { mime, source } = input else {
        return None;
    };
    let mime = mime.clone().unwrap_or_else(|| "image/png".to_string());
    match source {
        MediaSource::Binary(bytes) => Some((
            mime,
            base64::engine::general_purpose::STANDARD.encode(bytes),
        )),
        MediaSource::Base64(data) => Some((mime, data.clone())),
        MediaSource::Url(_) => None,
    }
}

/// Remote URL of an image part.
pub(crate) fn image_url(input: &Input) -> Option<&str> {
    match input {
        Input::Image {
            source: MediaSource::Url(url),
            ..
        } => Some(url),
        _ => None,
    }
}

/// Base URL with any trailing slash removed.
pub(crate) fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
