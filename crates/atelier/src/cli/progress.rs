//! Live progress printed from the run state channel.

use atelier::{RunState, StepStatus};
use std::collections::HashMap;
use tokio::sync::watch;

/// Print step transitions until the run finishes. Returns the total cost.
pub async fn report_progress(mut state: watch::Receiver<RunState>) -> f64 {
    let mut seen: HashMap<usize, (StepStatus, usize)> = HashMap::new();
    loop {
        let (finished, total) = {
            let snapshot = state.borrow_and_update();
            for step in &snapshot.steps {
                let current = (step.status, step.artifacts.len());
                if seen.get(&step.index) == Some(&current) {
                    continue;
                }
                seen.insert(step.index, current);
                let label = format!("Step {}", step.index + 1);
                match step.status {
                    StepStatus::Pending => eprintln!("{}: waiting", label),
                    StepStatus::Generating => eprintln!(
                        "{}: generating ({} bytes, {} artifact(s))",
                        label,
                        step.raw_output.len(),
                        step.artifacts.len()
                    ),
                    StepStatus::Completed => eprintln!(
                        "{}: completed, {}/{} rendered, ${:.6}",
                        label,
                        step.artifacts.iter().filter(|a| a.is_rendered()).count(),
                        step.artifacts.len(),
                        step.cost.map(|c| c.total()).unwrap_or_default()
                    ),
                    StepStatus::Failed => eprintln!(
                        "{}: failed: {}",
                        label,
                        step.error.as_deref().unwrap_or("unknown error")
                    ),
                }
            }
            (snapshot.finished, snapshot.total_cost())
        };
        if finished || state.changed().await.is_err() {
            return total;
        }
    }
}
