//! Tracing subscriber setup for the binary.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `info` for Atelier's crates, or
/// `debug` with `verbose`. Output goes to stderr so stdout stays free for
/// results.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(verbose: bool, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let fallback = if verbose {
        "warn,atelier=debug,atelier_refine=debug,atelier_models=debug,atelier_render=debug,atelier_storage=debug"
    } else {
        "warn,atelier=info,atelier_refine=info,atelier_models=info,atelier_storage=info"
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    }
    Ok(())
}
