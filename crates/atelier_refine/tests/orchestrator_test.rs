//! Refinement loop tests against a scripted driver and the local gateway.

mod test_utils;

use atelier_core::{
    ArtifactRef, ContinuationPolicy, Format, HistoryPolicy, NO_ARTIFACT_MESSAGE, ProviderSettings,
    ReferenceImage, Role, StepStatus,
};
use atelier_interface::{AtelierDriver, BlobKind};
use atelier_models::ProviderRegistry;
use atelier_refine::{PREVIEW_LEAD_IN, RefinementOrchestrator, RunState};
use atelier_render::Renderer;
use std::sync::Arc;
use std::time::Duration;
use test_utils::*;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_successful_run_persists_every_step() -> anyhow::Result<()> {
    let driver = ScriptedDriver::new([Reply::chunked(&fenced("svg", GOOD_SVG))]);
    let gateway = Arc::new(FaultyGateway::new());
    let orchestrator = orchestrator(Arc::clone(&driver), Arc::clone(&gateway));

    let result = orchestrator.run(&config(Format::Svg, 3)?, CancellationToken::new()).await;

    assert!(result.success, "run failed: {:?}", result.error);
    assert_eq!(result.error, None);
    let generation_id = result.generation_id.expect("generation id");
    let snapshot = gateway.inner.snapshot(&generation_id).await.expect("snapshot");

    assert_eq!(snapshot.steps.len(), 3);
    assert!(snapshot.steps.iter().all(|s| *s.status() == StepStatus::Completed));
    let ids: Vec<_> = snapshot.steps.iter().map(|s| *s.id()).collect();
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]), "ids {:?}", ids);

    assert_eq!(snapshot.artifacts.len(), 3);
    for artifact in &snapshot.artifacts {
        assert!(artifact.render_error().is_none());
        assert!(artifact.blobs().preview.is_some());
        assert!(artifact.blobs().body.as_deref().is_some_and(|k| k.ends_with(".svg")));
    }
    assert_eq!(driver.requests().len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_preview_is_fed_into_next_request() -> anyhow::Result<()> {
    let reply = fenced("svg", GOOD_SVG);
    let driver = ScriptedDriver::new([Reply::chunked(&reply)]);
    let gateway = Arc::new(FaultyGateway::new());
    let orchestrator = orchestrator(Arc::clone(&driver), gateway);

    let result = orchestrator.run(&config(Format::Svg, 3)?, CancellationToken::new()).await;
    assert!(result.success);

    let requests = driver.requests();
    assert_eq!(requests[0].messages.len(), 1);
    assert_eq!(requests[1].messages.len(), 3);
    assert_eq!(requests[2].messages.len(), 5);

    let second = &requests[1].messages;
    assert_eq!(second[1].role, Role::Assistant);
    assert_eq!(second[1].text(), reply);
    assert_eq!(second[2].role, Role::User);
    assert_eq!(second[2].image_count(), 1);
    assert!(second[2].text().starts_with(PREVIEW_LEAD_IN));
    assert!(second[2].text().contains("SIGNIFICANT improvements"));
    Ok(())
}

#[tokio::test]
async fn test_render_failure_is_fed_back() -> anyhow::Result<()> {
    let driver = ScriptedDriver::new([
        Reply::chunked(&fenced("svg", BROKEN_SVG)),
        Reply::chunked(&fenced("svg", GOOD_SVG)),
    ]);
    let gateway = Arc::new(FaultyGateway::new());
    let orchestrator = orchestrator(Arc::clone(&driver), Arc::clone(&gateway));

    let result = orchestrator.run(&config(Format::Svg, 2)?, CancellationToken::new()).await;
    assert!(result.success, "run failed: {:?}", result.error);

    let feedback = &driver.requests()[1].messages[2];
    assert_eq!(feedback.image_count(), 0);
    let text = feedback.text();
    assert!(
        text.starts_with("⚠️ WARNING: The previous SVG failed to render to PNG with error:")
    );
    assert!(text.contains("Error location (Line 3,"), "{}", text);
    assert!(text.contains("Please review and fix the SVG code."));

    let snapshot = gateway
        .inner
        .snapshot(&result.generation_id.expect("generation id"))
        .await
        .expect("snapshot");
    let failed = &snapshot.artifacts[0];
    assert!(failed.render_error().is_some());
    assert!(failed.blobs().preview.is_none());
    assert!(failed.blobs().body.is_some());
    assert!(snapshot.artifacts[1].blobs().preview.is_some());
    Ok(())
}

#[tokio::test]
async fn test_missing_artifact_is_reported() -> anyhow::Result<()> {
    let driver = ScriptedDriver::new([
        Reply::chunked("I would rather describe the square in words."),
        Reply::chunked(&fenced("svg", GOOD_SVG)),
    ]);
    let gateway = Arc::new(FaultyGateway::new());
    let orchestrator = orchestrator(Arc::clone(&driver), Arc::clone(&gateway));

    let result = orchestrator.run(&config(Format::Svg, 2)?, CancellationToken::new()).await;
    assert!(result.success);

    let text = driver.requests()[1].messages[2].text();
    assert!(text.starts_with(NO_ARTIFACT_MESSAGE));
    assert!(!text.contains("WARNING"));

    let snapshot = gateway
        .inner
        .snapshot(&result.generation_id.expect("generation id"))
        .await
        .expect("snapshot");
    assert_eq!(snapshot.steps.len(), 2);
    assert_eq!(snapshot.artifacts.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_provider_failure_stops_run() -> anyhow::Result<()> {
    let driver = ScriptedDriver::new([
        Reply::chunked(&fenced("svg", GOOD_SVG)),
        Reply::Break(vec!["```svg\n<svg".to_string()], "connection reset".to_string()),
    ]);
    let gateway = Arc::new(FaultyGateway::new());
    let orchestrator = orchestrator(Arc::clone(&driver), Arc::clone(&gateway));

    let (progress, observer) = watch::channel(RunState::default());
    let result = orchestrator
        .run_with_progress(&config(Format::Svg, 4)?, CancellationToken::new(), progress)
        .await;

    assert!(!result.success);
    assert!(result.error.as_deref().is_some_and(|e| e.contains("connection reset")));
    assert_eq!(driver.requests().len(), 2);

    let snapshot = gateway
        .inner
        .snapshot(&result.generation_id.expect("generation id"))
        .await
        .expect("snapshot");
    assert_eq!(snapshot.steps.len(), 2);
    assert_eq!(*snapshot.steps[0].status(), StepStatus::Completed);
    let failed = &snapshot.steps[1];
    assert_eq!(*failed.status(), StepStatus::Failed);
    assert_eq!(failed.raw_output(), "```svg\n<svg");
    assert!(failed.error_message().as_deref().is_some_and(|e| e.contains("connection reset")));

    let state = observer.borrow().clone();
    assert!(state.finished);
    assert_eq!(state.steps[1].status, StepStatus::Failed);
    Ok(())
}

#[tokio::test]
async fn test_rejected_request_fails_first_step() -> anyhow::Result<()> {
    let driver = ScriptedDriver::new([Reply::Reject("no route to host".to_string())]);
    let gateway = Arc::new(FaultyGateway::new());
    let orchestrator = orchestrator(driver, Arc::clone(&gateway));

    let result = orchestrator.run(&config(Format::Svg, 2)?, CancellationToken::new()).await;

    assert!(!result.success);
    let snapshot = gateway
        .inner
        .snapshot(&result.generation_id.expect("generation id"))
        .await
        .expect("snapshot");
    assert_eq!(snapshot.steps.len(), 1);
    assert_eq!(*snapshot.steps[0].status(), StepStatus::Failed);
    Ok(())
}

#[tokio::test]
async fn test_character_grid_uploads_text_markup_and_preview() -> anyhow::Result<()> {
    let grid = "  /\\\n /  \\\n/____\\";
    let driver = ScriptedDriver::new([Reply::chunked(&fenced("", grid))]);
    let gateway = Arc::new(FaultyGateway::new());
    let orchestrator = orchestrator(driver, Arc::clone(&gateway));

    let result = orchestrator.run(&config(Format::Ascii, 1)?, CancellationToken::new()).await;
    assert!(result.success, "run failed: {:?}", result.error);

    let snapshot = gateway
        .inner
        .snapshot(&result.generation_id.expect("generation id"))
        .await
        .expect("snapshot");
    let artifact = &snapshot.artifacts[0];
    assert_eq!(artifact.body(), grid);
    let blobs = artifact.blobs();
    assert!(blobs.body.as_deref().is_some_and(|k| k.ends_with(".txt")));
    assert!(blobs.vector.as_deref().is_some_and(|k| k.ends_with(".svg")));
    assert!(blobs.preview.as_deref().is_some_and(|k| k.ends_with(".png")));
    assert_eq!(gateway.blobs.keys().await.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_failed_upload_removes_artifact_record() -> anyhow::Result<()> {
    let driver = ScriptedDriver::new([Reply::chunked(&fenced("svg", GOOD_SVG))]);
    let gateway = Arc::new(FaultyGateway::new().failing_upload(BlobKind::RasterPreview));
    let orchestrator = orchestrator(driver, Arc::clone(&gateway));

    let result = orchestrator.run(&config(Format::Svg, 2)?, CancellationToken::new()).await;

    assert!(!result.success);
    assert!(result.error.as_deref().is_some_and(|e| e.starts_with("Failed to upload blob")));
    assert_eq!(gateway.inner.artifact_count().await, 0);
    assert!(gateway.blobs.keys().await.is_empty(), "orphan blobs left behind");

    let snapshot = gateway
        .inner
        .snapshot(&result.generation_id.expect("generation id"))
        .await
        .expect("snapshot");
    assert_eq!(snapshot.steps.len(), 1);
    assert_eq!(*snapshot.steps[0].status(), StepStatus::Failed);
    Ok(())
}

#[tokio::test]
async fn test_failed_compensation_is_reported() -> anyhow::Result<()> {
    let driver = ScriptedDriver::new([Reply::chunked(&fenced("svg", GOOD_SVG))]);
    let gateway = Arc::new(
        FaultyGateway::new()
            .failing_upload(BlobKind::RasterPreview)
            .failing_delete(),
    );
    let orchestrator = orchestrator(driver, gateway);

    let result = orchestrator.run(&config(Format::Svg, 1)?, CancellationToken::new()).await;

    assert!(!result.success);
    let error = result.error.expect("error");
    assert!(error.starts_with("Compensating delete failed"), "{}", error);
    assert!(error.contains("RasterPreview") || error.contains("raster_preview"));
    Ok(())
}

#[tokio::test]
async fn test_reference_images_precede_initial_prompt() -> anyhow::Result<()> {
    let driver = ScriptedDriver::new([Reply::chunked(&fenced("svg", GOOD_SVG))]);
    let gateway = Arc::new(FaultyGateway::new());
    let orchestrator = orchestrator(Arc::clone(&driver), Arc::clone(&gateway));
    let config = config_builder(Format::Svg, 1)
        .reference_images(vec![ReferenceImage {
            mime: "image/jpeg".to_string(),
            bytes: vec![0xFF, 0xD8, 0xFF],
        }])
        .build()?;

    let result = orchestrator.run(&config, CancellationToken::new()).await;
    assert!(result.success);

    let first = &driver.requests()[0].messages[0];
    assert_eq!(first.image_count(), 1);
    assert!(matches!(first.content[0], atelier_core::Input::Image { .. }));
    assert!(gateway.blobs.keys().await.contains(&"input/1.jpg".to_string()));
    assert_eq!(
        gateway.blobs.content_type("input/1.jpg").await.as_deref(),
        Some("image/jpeg")
    );
    Ok(())
}

#[tokio::test]
async fn test_failed_reference_upload_removes_image_record() -> anyhow::Result<()> {
    let driver = ScriptedDriver::new([Reply::chunked(&fenced("svg", GOOD_SVG))]);
    let gateway = Arc::new(FaultyGateway::new().failing_upload(BlobKind::InputImage));
    let orchestrator = orchestrator(Arc::clone(&driver), Arc::clone(&gateway));
    let config = config_builder(Format::Svg, 1)
        .reference_images(vec![ReferenceImage {
            mime: "image/png".to_string(),
            bytes: vec![1, 2, 3],
        }])
        .build()?;

    let result = orchestrator.run(&config, CancellationToken::new()).await;

    assert!(!result.success);
    assert!(driver.requests().is_empty());
    let snapshot = gateway
        .inner
        .snapshot(&result.generation_id.expect("generation id"))
        .await
        .expect("snapshot");
    assert!(snapshot.input_images.is_empty());
    assert!(snapshot.steps.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_last_only_history_replays_one_exchange() -> anyhow::Result<()> {
    let driver = ScriptedDriver::new([
        Reply::chunked(&fenced("svg", GOOD_SVG)),
        Reply::chunked(&fenced("svg", BROKEN_SVG)),
        Reply::chunked(&fenced("svg", GOOD_SVG)),
    ]);
    let gateway = Arc::new(FaultyGateway::new());
    let orchestrator = orchestrator(Arc::clone(&driver), gateway);
    let config = config_builder(Format::Svg, 3)
        .history(HistoryPolicy::LastOnly)
        .build()?;

    let result = orchestrator.run(&config, CancellationToken::new()).await;
    assert!(result.success);

    let third = &driver.requests()[2].messages;
    assert_eq!(third.len(), 3);
    assert!(third[1].text().contains("<g>"));
    assert!(third[2].text().contains("WARNING"));
    Ok(())
}

#[tokio::test]
async fn test_stop_when_nothing_renders() -> anyhow::Result<()> {
    let driver = ScriptedDriver::new([Reply::chunked(&fenced("svg", BROKEN_SVG))]);
    let gateway = Arc::new(FaultyGateway::new());
    let orchestrator = orchestrator(Arc::clone(&driver), Arc::clone(&gateway));
    let config = config_builder(Format::Svg, 3)
        .continuation(ContinuationPolicy::StopWhenNothingRenders)
        .build()?;
    let (progress, observer) = watch::channel(RunState::default());

    let result = orchestrator
        .run_with_progress(&config, CancellationToken::new(), progress)
        .await;

    assert!(result.success);
    assert_eq!(driver.requests().len(), 1);
    let state = observer.borrow().clone();
    assert_eq!(state.steps.len(), 1);
    assert_eq!(state.steps[0].status, StepStatus::Completed);
    Ok(())
}

#[tokio::test]
async fn test_non_increasing_step_id_fails_run() -> anyhow::Result<()> {
    let driver = ScriptedDriver::new([Reply::chunked(&fenced("svg", GOOD_SVG))]);
    let gateway = Arc::new(FaultyGateway::new().with_step_ids([5, 5]));
    let orchestrator = orchestrator(Arc::clone(&driver), gateway);

    let result = orchestrator.run(&config(Format::Svg, 3)?, CancellationToken::new()).await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Step id 5 does not follow 5"));
    assert_eq!(driver.requests().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_cancel_while_streaming() -> anyhow::Result<()> {
    let driver = ScriptedDriver::new([Reply::Stall(vec![
        "```svg\n".to_string(),
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"8\" height=\"8\">".to_string(),
    ])]);
    let gateway = Arc::new(FaultyGateway::new());
    let orchestrator = Arc::new(orchestrator(driver, Arc::clone(&gateway)));
    let config = config(Format::Svg, 3)?;
    let cancel = CancellationToken::new();
    let (state, mut progress) = watch::channel(RunState::default());

    let handle = {
        let orchestrator = Arc::clone(&orchestrator);
        let cancel = cancel.clone();
        tokio::spawn(async move { orchestrator.run_with_progress(&config, cancel, state).await })
    };

    tokio::time::timeout(
        Duration::from_secs(5),
        progress.wait_for(|state| {
            state
                .current_step()
                .is_some_and(|step| !step.artifacts.is_empty())
        }),
    )
    .await??;
    {
        let state = progress.borrow();
        let step = state.current_step().expect("step");
        assert_eq!(step.status, StepStatus::Generating);
        assert_eq!(*step.artifacts[0].reference(), ArtifactRef::Pending(0));
        assert!(step.artifacts[0].body().ends_with("</svg>"));
        assert_eq!(state.generating(), 1);
    }

    cancel.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), handle).await??;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Generation cancelled"));
    let snapshot = gateway
        .inner
        .snapshot(&result.generation_id.expect("generation id"))
        .await
        .expect("snapshot");
    assert_eq!(snapshot.steps.len(), 1);
    assert_eq!(*snapshot.steps[0].status(), StepStatus::Failed);
    assert!(snapshot.steps[0].raw_output().starts_with("```svg\n<svg"));
    assert!(snapshot.artifacts.is_empty());

    let state = progress.borrow().clone();
    assert!(state.finished);
    assert_eq!(state.generating(), 0);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_runs_keep_separate_progress() -> anyhow::Result<()> {
    let stalling = ScriptedDriver::new([Reply::Stall(vec![
        "```svg\n".to_string(),
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"8\" height=\"8\">".to_string(),
    ])]);
    let steady = ScriptedDriver::new([Reply::chunked(&fenced("svg", GOOD_SVG))]);
    let mut registry = ProviderRegistry::new();
    for (id, driver) in [("mock", stalling), ("steady", steady)] {
        registry.register(
            id,
            Arc::new(move |_settings: &ProviderSettings| {
                Ok(Arc::clone(&driver) as Arc<dyn AtelierDriver>)
            }),
        );
    }
    let orchestrator = Arc::new(RefinementOrchestrator::new(
        Arc::new(registry),
        Arc::new(FaultyGateway::new()),
        Arc::new(Renderer::without_system_fonts()),
    ));

    let cancel = CancellationToken::new();
    let (stalled_state, mut stalled) = watch::channel(RunState::default());
    let stalled_config = config(Format::Svg, 3)?;
    let handle = {
        let orchestrator = Arc::clone(&orchestrator);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            orchestrator
                .run_with_progress(&stalled_config, cancel, stalled_state)
                .await
        })
    };
    tokio::time::timeout(
        Duration::from_secs(5),
        stalled.wait_for(|state| {
            state
                .current_step()
                .is_some_and(|step| !step.artifacts.is_empty())
        }),
    )
    .await??;

    let (steady_state, steady) = watch::channel(RunState::default());
    let steady_config = config_builder(Format::Svg, 1)
        .provider(ProviderSettings::new("steady", "scripted"))
        .build()?;
    let steady_result = orchestrator
        .run_with_progress(&steady_config, CancellationToken::new(), steady_state)
        .await;
    assert!(steady_result.success, "run failed: {:?}", steady_result.error);

    cancel.cancel();
    let stalled_result = tokio::time::timeout(Duration::from_secs(5), handle).await??;
    assert_eq!(stalled_result.error.as_deref(), Some("Generation cancelled"));
    assert_ne!(stalled_result.generation_id, steady_result.generation_id);

    let finished = steady.borrow().clone();
    assert!(finished.finished);
    assert_eq!(finished.error, None);
    assert_eq!(finished.generation_id, steady_result.generation_id);
    assert_eq!(finished.steps.len(), 1);
    assert_eq!(finished.steps[0].status, StepStatus::Completed);

    let cancelled = stalled.borrow().clone();
    assert!(cancelled.finished);
    assert_eq!(cancelled.error.as_deref(), Some("Generation cancelled"));
    assert_eq!(cancelled.generation_id, stalled_result.generation_id);
    assert_eq!(cancelled.steps.len(), 1);
    assert_eq!(cancelled.steps[0].status, StepStatus::Failed);
    Ok(())
}

#[tokio::test]
async fn test_cancel_before_start_runs_no_step() -> anyhow::Result<()> {
    let driver = ScriptedDriver::new([Reply::chunked(&fenced("svg", GOOD_SVG))]);
    let gateway = Arc::new(FaultyGateway::new());
    let orchestrator = orchestrator(Arc::clone(&driver), gateway);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = orchestrator.run(&config(Format::Svg, 3)?, cancel).await;

    assert!(!result.success);
    assert!(result.generation_id.is_some());
    assert!(driver.requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unknown_provider_fails_before_generation() -> anyhow::Result<()> {
    let gateway = Arc::new(FaultyGateway::new());
    let orchestrator = RefinementOrchestrator::new(
        Arc::new(atelier_models::ProviderRegistry::new()),
        gateway,
        Arc::new(atelier_render::Renderer::without_system_fonts()),
    );

    let result = orchestrator.run(&config(Format::Svg, 1)?, CancellationToken::new()).await;

    assert!(!result.success);
    assert_eq!(result.generation_id, None);
    assert!(result.error.as_deref().is_some_and(|e| e.contains("mock")));
    Ok(())
}

#[tokio::test]
async fn test_run_state_totals_cost() -> anyhow::Result<()> {
    let driver = ScriptedDriver::new([Reply::chunked(&fenced("svg", GOOD_SVG))]);
    let gateway = Arc::new(FaultyGateway::new());
    let orchestrator = orchestrator(driver, gateway);

    let (progress, observer) = watch::channel(RunState::default());
    let result = orchestrator
        .run_with_progress(&config(Format::Svg, 2)?, CancellationToken::new(), progress)
        .await;
    assert!(result.success);

    let state = observer.borrow().clone();
    assert!(state.finished);
    assert_eq!(state.error, None);
    assert_eq!(state.generation_id, result.generation_id);
    assert_eq!(state.steps.len(), 2);
    // 1000 input tokens at $1/M plus 500 output tokens at $2/M, twice.
    assert!((state.total_cost() - 0.004).abs() < 1e-12);
    assert!(state.steps.iter().all(|s| s.usage == Some(USAGE)));
    assert!(
        state.steps[1]
            .artifacts
            .iter()
            .all(|a| matches!(a.reference(), ArtifactRef::Persisted(_)))
    );
    Ok(())
}
