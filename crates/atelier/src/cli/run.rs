//! Generation command handler.

use super::commands::RunArgs;
use super::progress::report_progress;
use atelier::{
    AtelierConfig, ContinuationPolicy, Dimensions, FileSystemBlobStore, Format, GenerationConfig,
    LocalGateway, PromptTemplates, ProviderRegistry, ReferenceImage, RefinementOrchestrator,
    RunState,
};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Run one generation and print where its results were stored.
///
/// # Errors
///
/// Returns an error if the configuration is incomplete or the run fails.
pub async fn run_generation(
    args: RunArgs,
    config: &AtelierConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let defaults = &config.defaults;
    let format: Format = args.format.map(Into::into).unwrap_or(defaults.format);
    let fallback = defaults.dimensions(format);
    let dimensions = Dimensions::new(
        args.width.unwrap_or(*fallback.width()),
        args.height.unwrap_or(*fallback.height()),
    );
    let provider = args.provider.as_deref().unwrap_or(&defaults.provider);
    let model = args.model.as_deref().unwrap_or(&defaults.model);
    let settings = config.provider_settings(provider, model, args.endpoint.as_deref())?;

    let mut reference_images = Vec::with_capacity(args.images.len());
    for path in &args.images {
        reference_images.push(read_image(path).await?);
    }

    let (initial, refinement) =
        PromptTemplates::for_format(format).render(&args.prompt, &dimensions);
    let continuation = if args.stop_when_nothing_renders {
        ContinuationPolicy::StopWhenNothingRenders
    } else {
        ContinuationPolicy::ContinueWithFeedback
    };
    let generation = GenerationConfig::builder()
        .prompt(args.prompt.clone())
        .format(format)
        .dimensions(dimensions)
        .provider(settings)
        .max_steps(args.max_steps.unwrap_or(defaults.max_steps))
        .history(args.history.map(Into::into).unwrap_or(defaults.history))
        .continuation(continuation)
        .pricing(config.pricing(provider, model))
        .initial_prompt(initial)
        .refinement_prompt(refinement)
        .reference_images(reference_images)
        .max_output_tokens(args.max_output_tokens.or(defaults.max_output_tokens))
        .temperature(args.temperature)
        .build()?;

    let mut storage = config.storage.clone();
    if let Some(dir) = args.storage_dir {
        storage.dir = dir;
    }
    let store = FileSystemBlobStore::new(storage.blob_dir())?;
    let mut gateway = LocalGateway::new(Arc::new(store));
    if storage.snapshots {
        gateway = gateway.with_snapshots(storage.snapshot_dir());
    }

    let orchestrator = RefinementOrchestrator::new(
        Arc::new(ProviderRegistry::with_defaults()),
        Arc::new(gateway),
        Arc::new(config.renderer()),
    );

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling generation");
                cancel.cancel();
            }
        })
    };
    let (state, observer) = watch::channel(RunState::default());
    let progress = tokio::spawn(report_progress(observer));

    info!(provider, model, %format, %dimensions, "Starting generation");
    let result = orchestrator
        .run_with_progress(&generation, cancel, state)
        .await;
    interrupt.abort();
    let total_cost = progress.await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    if let Some(id) = &result.generation_id {
        eprintln!("Blobs:     {}", storage.blob_dir().join(id.as_str()).display());
        if storage.snapshots {
            eprintln!(
                "Snapshot:  {}",
                storage.snapshot_dir().join(format!("{}.json", id)).display()
            );
        }
    }
    eprintln!("Cost:      ${:.6}", total_cost);

    match result.error {
        Some(error) if !result.success => Err(error.into()),
        _ => Ok(()),
    }
}

/// Print each provider and whether its credential is set.
pub fn list_providers(config: &AtelierConfig) {
    let registry = ProviderRegistry::with_defaults();
    for provider in registry.providers() {
        let status = match config.providers.get(provider) {
            Some(settings) => match (&settings.api_key_env, config.credential(provider)) {
                (Some(_), Some(_)) => "ready".to_string(),
                (Some(var), None) => format!("missing {}", var),
                (None, _) => "no credential configured".to_string(),
            },
            None => "not configured".to_string(),
        };
        println!("{:<12} {}", provider, status);
    }
}

async fn read_image(path: &Path) -> Result<ReferenceImage, Box<dyn std::error::Error>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let mime = match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        other => {
            return Err(format!("Unsupported image type '{}': {}", other, path.display()).into());
        }
    };
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    Ok(ReferenceImage {
        mime: mime.to_string(),
        bytes,
    })
}
