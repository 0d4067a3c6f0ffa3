//! Tests for the local persistence gateway.

use atelier_core::{
    ContentError, GenerationConfig, ProviderSettings, StepStatus, StepUpdate, Usage,
};
use atelier_interface::{BlobKind, BlobOwner, PersistenceGateway};
use atelier_storage::{BlobStore, GenerationSnapshot, LocalGateway, MemoryBlobStore};
use std::sync::Arc;
use tempfile::TempDir;

fn config() -> anyhow::Result<GenerationConfig> {
    Ok(GenerationConfig::builder()
        .prompt("a cat")
        .provider(ProviderSettings::new("openai", "gpt-4o").with_credential("secret"))
        .initial_prompt("Draw a cat.")
        .refinement_prompt("Improve it.")
        .build()?)
}

#[tokio::test]
async fn step_ids_increase_across_generations() -> anyhow::Result<()> {
    let gateway = LocalGateway::new(Arc::new(MemoryBlobStore::new()));
    let first = gateway.create_generation(&config()?).await?;
    let second = gateway.create_generation(&config()?).await?;
    assert_ne!(first, second);

    let a = gateway.create_step(&first, "p1").await?;
    let b = gateway.create_step(&second, "p2").await?;
    let c = gateway.create_step(&first, "p3").await?;
    assert!(a < b && b < c);

    let snapshot = gateway.snapshot(&first).await.ok_or_else(|| anyhow::anyhow!("missing"))?;
    let ids: Vec<_> = snapshot.steps.iter().map(|s| *s.id()).collect();
    assert_eq!(ids, vec![a, c]);
    Ok(())
}

#[tokio::test]
async fn create_step_requires_generation() -> anyhow::Result<()> {
    let gateway = LocalGateway::new(Arc::new(MemoryBlobStore::new()));
    let result = gateway.create_step(&"missing".into(), "prompt").await;
    assert!(result.is_err());
    Ok(())
}

#[tokio::test]
async fn update_step_enforces_transitions() -> anyhow::Result<()> {
    let gateway = LocalGateway::new(Arc::new(MemoryBlobStore::new()));
    let generation = gateway.create_generation(&config()?).await?;
    let step = gateway.create_step(&generation, "prompt").await?;

    assert!(
        gateway
            .update_step(step, StepUpdate::status(StepStatus::Completed))
            .await
            .is_err()
    );

    gateway
        .update_step(step, StepUpdate::status(StepStatus::Generating))
        .await?;
    let usage = Usage {
        input_tokens: 10,
        output_tokens: 20,
    };
    gateway
        .update_step(step, StepUpdate::completed("raw", usage, Default::default()))
        .await?;

    let record = gateway.step(step).await.ok_or_else(|| anyhow::anyhow!("missing"))?;
    assert_eq!(*record.status(), StepStatus::Completed);
    assert_eq!(record.raw_output(), "raw");
    assert_eq!(*record.usage(), Some(usage));

    gateway
        .update_step(step, StepUpdate::failed("raw", "upload failed"))
        .await?;
    let record = gateway.step(step).await.ok_or_else(|| anyhow::anyhow!("missing"))?;
    assert_eq!(*record.status(), StepStatus::Failed);
    assert_eq!(record.error_message().as_deref(), Some("upload failed"));
    assert_eq!(*record.usage(), Some(usage));
    Ok(())
}

#[tokio::test]
async fn uploads_follow_key_layout_and_delete_cleans_up() -> anyhow::Result<()> {
    let blobs = MemoryBlobStore::new();
    let gateway = LocalGateway::new(Arc::new(blobs.clone()));
    let generation = gateway.create_generation(&config()?).await?;
    let step = gateway.create_step(&generation, "prompt").await?;
    let artifact = gateway.create_artifact(step, "#\n#", None).await?;
    let owner = BlobOwner::Artifact {
        generation_id: generation.clone(),
        step_id: step,
        artifact_id: artifact,
    };

    let grid = gateway.upload_blob(BlobKind::GridBody, &owner, b"#\n#".to_vec()).await?;
    let vector = gateway.upload_blob(BlobKind::VectorBody, &owner, b"<svg/>".to_vec()).await?;
    let preview = gateway.upload_blob(BlobKind::RasterPreview, &owner, vec![1]).await?;

    assert_eq!(grid, format!("{}/{}_{}.txt", generation, step, artifact));
    assert_eq!(vector, format!("{}/{}_{}.svg", generation, step, artifact));
    assert_eq!(preview, format!("{}/{}_{}.png", generation, step, artifact));
    assert_eq!(blobs.content_type(&vector).await.as_deref(), Some("image/svg+xml"));

    let record = gateway.artifact(artifact).await.ok_or_else(|| anyhow::anyhow!("missing"))?;
    assert_eq!(record.blobs().body.as_deref(), Some(grid.as_str()));
    assert_eq!(record.blobs().vector.as_deref(), Some(vector.as_str()));

    gateway.delete_artifact(artifact).await?;
    assert!(gateway.artifact(artifact).await.is_none());
    assert!(blobs.keys().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn input_images_use_their_mime_type() -> anyhow::Result<()> {
    let blobs = MemoryBlobStore::new();
    let gateway = LocalGateway::new(Arc::new(blobs.clone()));
    let generation = gateway.create_generation(&config()?).await?;
    let image = gateway.create_input_image(&generation, "image/jpeg").await?;
    let owner = BlobOwner::InputImage {
        image_id: image,
        extension: "jpg".to_string(),
    };

    let key = gateway.upload_blob(BlobKind::InputImage, &owner, vec![0xff, 0xd8]).await?;
    assert_eq!(key, format!("input/{}.jpg", image));
    assert_eq!(blobs.content_type(&key).await.as_deref(), Some("image/jpeg"));

    gateway.delete_input_image(image).await?;
    assert!(!blobs.exists(&key).await?);
    Ok(())
}

#[tokio::test]
async fn snapshots_mirror_records() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let gateway =
        LocalGateway::new(Arc::new(MemoryBlobStore::new())).with_snapshots(temp_dir.path());
    let generation = gateway.create_generation(&config()?).await?;
    let step = gateway.create_step(&generation, "prompt").await?;
    let error = ContentError::new("unclosed tag").at(2, 5);
    gateway.create_artifact(step, "<svg><g>", Some(&error)).await?;

    let path = temp_dir.path().join(format!("{}.json", generation));
    let snapshot: GenerationSnapshot = serde_json::from_slice(&std::fs::read(path)?)?;
    assert_eq!(snapshot.steps.len(), 1);
    assert_eq!(snapshot.artifacts.len(), 1);
    assert_eq!(snapshot.artifacts[0].render_error().as_ref(), Some(&error));

    let raw = std::fs::read_to_string(temp_dir.path().join(format!("{}.json", generation)))?;
    assert!(!raw.contains("secret"));
    Ok(())
}
