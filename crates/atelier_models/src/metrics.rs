//! Metrics for provider calls.
//!
//! Instruments are created on the `opentelemetry` global meter. Without an
//! installed meter provider they are no-ops.

use atelier_error::{AtelierError, AtelierErrorKind, ProviderErrorKind};
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram, Meter},
};
use std::sync::OnceLock;

static METRICS: OnceLock<LlmMetrics> = OnceLock::new();

/// Request, error, latency and token instruments, labelled by provider and
/// model.
#[derive(Clone)]
pub struct LlmMetrics {
    _meter: Meter,
    /// Completed streams
    pub requests: Counter<u64>,
    /// Failed calls
    pub errors: Counter<u64>,
    /// Seconds from request to final event
    pub duration: Histogram<f64>,
    /// Prompt tokens
    pub input_tokens: Counter<u64>,
    /// Completion tokens
    pub output_tokens: Counter<u64>,
}

impl LlmMetrics {
    fn init() -> Self {
        let meter = global::meter("atelier_llm");

        Self {
            _meter: meter.clone(),
            requests: meter
                .u64_counter("llm.requests")
                .with_description("Completed LLM streams")
                .build(),
            errors: meter
                .u64_counter("llm.errors")
                .with_description("Failed LLM calls")
                .build(),
            duration: meter
                .f64_histogram("llm.duration")
                .with_unit("seconds")
                .with_description("LLM stream duration")
                .build(),
            input_tokens: meter
                .u64_counter("llm.tokens.input")
                .with_description("Prompt tokens used")
                .build(),
            output_tokens: meter
                .u64_counter("llm.tokens.output")
                .with_description("Completion tokens used")
                .build(),
        }
    }

    /// Process-wide instance.
    pub fn get() -> &'static Self {
        METRICS.get_or_init(Self::init)
    }

    /// Record a completed stream.
    pub fn record_request(&self, provider: &str, model: &str, duration_secs: f64) {
        let labels = labels(provider, model);
        self.requests.add(1, &labels);
        self.duration.record(duration_secs, &labels);
    }

    /// Record a failed call.
    pub fn record_error(&self, provider: &str, model: &str, error_type: &str) {
        let mut labels = labels(provider, model).to_vec();
        labels.push(KeyValue::new("error_type", error_type.to_string()));
        self.errors.add(1, &labels);
    }

    /// Record final token usage.
    pub fn record_tokens(&self, provider: &str, model: &str, input: u64, output: u64) {
        let labels = labels(provider, model);
        self.input_tokens.add(input, &labels);
        self.output_tokens.add(output, &labels);
    }
}

fn labels(provider: &str, model: &str) -> [KeyValue; 2] {
    [
        KeyValue::new("provider", provider.to_string()),
        KeyValue::new("model", model.to_string()),
    ]
}

/// Label for an error in metrics.
///
/// One of `rate_limit`, `auth`, `invalid_request`, `server`, `network`,
/// `stream`, `parse`, `vendor` or `unknown`.
///
/// ```
/// use atelier_error::{AtelierError, ProviderError, ProviderErrorKind, VendorDetail};
/// use atelier_models::classify_error;
///
/// let err: AtelierError = ProviderError::new(ProviderErrorKind::Api {
///     status: 429,
///     detail: VendorDetail::message("slow down"),
/// })
/// .into();
/// assert_eq!(classify_error(&err), "rate_limit");
/// ```
pub fn classify_error(error: &AtelierError) -> &'static str {
    let AtelierErrorKind::Provider(provider) = error.kind() else {
        return "unknown";
    };
    match &provider.kind {
        ProviderErrorKind::Api { status: 429, .. } => "rate_limit",
        ProviderErrorKind::Api {
            status: 401 | 403, ..
        } => "auth",
        ProviderErrorKind::Api { status, .. } if *status >= 500 => "server",
        ProviderErrorKind::Api { .. } => "invalid_request",
        ProviderErrorKind::Vendor(detail) => {
            let kind = detail.error_type.as_deref().unwrap_or("").to_ascii_lowercase();
            if kind.contains("rate_limit") || kind.contains("resource_exhausted") {
                "rate_limit"
            } else {
                "vendor"
            }
        }
        ProviderErrorKind::Transport(_) => "network",
        ProviderErrorKind::Stream(_) => "stream",
        ProviderErrorKind::Parse(_) => "parse",
        ProviderErrorKind::UnknownProvider(_)
        | ProviderErrorKind::MissingCredential(_)
        | ProviderErrorKind::MissingEndpoint(_) => "unknown",
    }
}
