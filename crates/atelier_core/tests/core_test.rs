use atelier_core::{
    Artifact, ArtifactId, ArtifactRef, ContentError, ContinuationPolicy, Dimensions, Format,
    GenerationConfig, HistoryPolicy, Pricing, ProviderSettings, StepStatus, StepUpdate, Usage,
};
use std::str::FromStr;

fn base_builder() -> atelier_core::GenerationConfigBuilder {
    let mut builder = GenerationConfig::builder();
    builder
        .prompt("a red circle")
        .provider(ProviderSettings::new("openai", "gpt-4o"))
        .initial_prompt("Draw a red circle.")
        .refinement_prompt("Improve it.");
    builder
}

#[test]
fn builder_applies_defaults() -> anyhow::Result<()> {
    let config = base_builder().build()?;
    assert_eq!(*config.format(), Format::Svg);
    assert_eq!(*config.max_steps(), 1);
    assert_eq!(*config.history(), HistoryPolicy::Full);
    assert_eq!(*config.continuation(), ContinuationPolicy::ContinueWithFeedback);
    assert!(config.reference_images().is_empty());
    Ok(())
}

#[test]
fn builder_rejects_zero_steps_and_empty_canvas() {
    assert!(base_builder().max_steps(0u32).build().is_err());
    assert!(base_builder().dimensions(Dimensions::new(0, 10)).build().is_err());
}

#[test]
fn builder_reports_missing_prompt() {
    let result = GenerationConfig::builder()
        .provider(ProviderSettings::new("openai", "gpt-4o"))
        .initial_prompt("x")
        .refinement_prompt("y")
        .build();
    let err = result.unwrap_err();
    assert!(err.message.contains("prompt"));
}

#[test]
fn credential_is_redacted_and_not_serialized() -> anyhow::Result<()> {
    let settings = ProviderSettings::new("anthropic", "claude").with_credential("sk-secret");
    assert!(!format!("{:?}", settings).contains("sk-secret"));
    let json = serde_json::to_string(&settings)?;
    assert!(!json.contains("sk-secret"));
    Ok(())
}

#[test]
fn history_policy_parses_short_alias() {
    assert_eq!(HistoryPolicy::from_str("last").ok(), Some(HistoryPolicy::LastOnly));
    assert_eq!(HistoryPolicy::from_str("full").ok(), Some(HistoryPolicy::Full));
    assert_eq!(HistoryPolicy::LastOnly.to_string(), "last_only");
}

#[test]
fn step_status_transitions() {
    use StepStatus::*;
    assert!(Pending.can_become(Generating));
    assert!(Pending.can_become(Failed));
    assert!(Generating.can_become(Completed));
    assert!(!Pending.can_become(Completed));
    assert!(!Failed.can_become(Generating));
    assert!(Completed.is_terminal() && Failed.is_terminal());
}

#[test]
fn completed_update_carries_usage_and_cost() {
    let usage = Usage {
        input_tokens: 1_000_000,
        output_tokens: 100_000,
    };
    let cost = Pricing::new(3.0, 15.0).cost(&usage);
    let update = StepUpdate::completed("```svg\n<svg/>\n```", usage, cost);
    assert_eq!(update.status, StepStatus::Completed);
    assert_eq!(update.usage, Some(usage));
    assert!((cost.input - 3.0).abs() < 1e-9);
    assert!((cost.output - 1.5).abs() < 1e-9);
    assert!((cost.total() - 4.5).abs() < 1e-9);
    assert!(update.error_message.is_none());
}

#[test]
fn artifact_state_changes() {
    let artifact = Artifact::pending(0, "<svg/>").rendered(vec![1, 2, 3]);
    assert!(artifact.is_rendered());

    let artifact = artifact.failed(ContentError::new("bad").at(1, 2));
    assert!(!artifact.is_rendered());
    assert_eq!(artifact.render_error().as_ref().and_then(|e| e.location()), Some((1, 2)));

    let artifact = artifact.persisted(ArtifactId::new(9), Default::default());
    assert_eq!(*artifact.reference(), ArtifactRef::Persisted(ArtifactId::new(9)));
}
