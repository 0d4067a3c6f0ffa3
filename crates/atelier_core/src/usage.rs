//! Token usage, pricing and cost.

use serde::{Deserialize, Serialize};

/// Token counts reported at the end of a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens
    pub input_tokens: u64,
    /// Completion tokens
    pub output_tokens: u64,
}

/// Price in dollars per million tokens.
///
/// # Examples
///
/// ```
/// use atelier_core::{Pricing, Usage};
///
/// let pricing = Pricing::new(2.5, 10.0);
/// let cost = pricing.cost(&Usage { input_tokens: 2_000, output_tokens: 500 });
/// assert!((cost.input - 0.005).abs() < 1e-12);
/// assert!((cost.output - 0.005).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    /// Dollars per million input tokens
    pub input_per_million: f64,
    /// Dollars per million output tokens
    pub output_per_million: f64,
}

impl Pricing {
    /// Create a price pair.
    pub fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }

    /// Cost of the given usage at these prices.
    pub fn cost(&self, usage: &Usage) -> Cost {
        Cost {
            input: usage.input_tokens as f64 / 1_000_000.0 * self.input_per_million,
            output: usage.output_tokens as f64 / 1_000_000.0 * self.output_per_million,
        }
    }
}

/// Dollar cost of one step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Cost {
    /// Cost of input tokens
    pub input: f64,
    /// Cost of output tokens
    pub output: f64,
}

impl Cost {
    /// Input plus output.
    pub fn total(&self) -> f64 {
        self.input + self.output
    }
}
