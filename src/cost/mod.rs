//! Cost accounting for review runs.
//!
//! Pricing is expressed per million tokens and comes in two shapes:
//!
//! - **Flat**: one input rate and one output rate.
//! - **Tiered**: an ordered list of thresholds. Tokens above a tier's
//!   threshold (and not already billed by a higher tier) are billed at that
//!   tier's rate; the remainder falls through to lower tiers.
//!
//! The [`CostAccountant`] records each pass as it completes and produces an
//! immutable [`ReviewCost`] snapshot for the caller.
//!
//! ## Example
//!
//! ```
//! use ai_code_review::cost::{CostAccountant, ModelPricing, format_cost};
//!
//! let pricing = ModelPricing::flat(3.0, 15.0);
//! let mut accountant = CostAccountant::new(Some(0.15));
//! accountant.record_pass(1, 100_000, 4_000, &pricing).unwrap();
//! accountant.record_pass(2, 80_000, 3_000, &pricing).unwrap();
//!
//! let cost = accountant.snapshot();
//! assert_eq!(cost.pass_count, Some(2));
//! assert_eq!(cost.total_tokens, 187_000);
//! assert_eq!(format_cost(cost.estimated_cost), "$0.6450");
//! ```

use crate::errors::CostError;
use serde::{Deserialize, Serialize};
use std::fmt;

const TOKENS_PER_MILLION: f64 = 1_000_000.0;

/// Expected output size relative to input, used for pre-run estimates only.
pub const ESTIMATED_OUTPUT_RATIO: f64 = 0.15;

/// One tier of a tiered pricing table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingTier {
    /// Tokens above this count are billed at this tier's rates.
    pub threshold: u64,
    /// USD per million input tokens.
    pub input_per_million: f64,
    /// USD per million output tokens.
    pub output_per_million: f64,
}

impl PricingTier {
    pub fn new(threshold: u64, input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            threshold,
            input_per_million,
            output_per_million,
        }
    }
}

/// Static pricing for a model, read from the model registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelPricing {
    Flat {
        input_per_million: f64,
        output_per_million: f64,
    },
    Tiered { tiers: Vec<PricingTier> },
}

impl ModelPricing {
    pub fn flat(input_per_million: f64, output_per_million: f64) -> Self {
        Self::Flat {
            input_per_million,
            output_per_million,
        }
    }

    /// Tiers may be given in any order; they are sorted when billing.
    pub fn tiered(tiers: Vec<PricingTier>) -> Self {
        Self::Tiered { tiers }
    }

    /// Pricing used for models missing from the registry.
    pub fn free() -> Self {
        Self::flat(0.0, 0.0)
    }

    /// Cost in USD of `tokens` input tokens.
    pub fn input_cost(&self, tokens: u64) -> f64 {
        match self {
            Self::Flat {
                input_per_million, ..
            } => tokens as f64 / TOKENS_PER_MILLION * input_per_million,
            Self::Tiered { tiers } => tiered_cost(tiers, tokens, |t| t.input_per_million),
        }
    }

    /// Cost in USD of `tokens` output tokens.
    pub fn output_cost(&self, tokens: u64) -> f64 {
        match self {
            Self::Flat {
                output_per_million, ..
            } => tokens as f64 / TOKENS_PER_MILLION * output_per_million,
            Self::Tiered { tiers } => tiered_cost(tiers, tokens, |t| t.output_per_million),
        }
    }

    /// Combined cost of one call.
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        self.input_cost(input_tokens) + self.output_cost(output_tokens)
    }

    /// Rate applied to the first token (lowest tier), for display.
    pub fn base_rates(&self) -> (f64, f64) {
        match self {
            Self::Flat {
                input_per_million,
                output_per_million,
            } => (*input_per_million, *output_per_million),
            Self::Tiered { tiers } => tiers
                .iter()
                .min_by_key(|t| t.threshold)
                .map(|t| (t.input_per_million, t.output_per_million))
                .unwrap_or((0.0, 0.0)),
        }
    }

    pub fn is_tiered(&self) -> bool {
        matches!(self, Self::Tiered { .. })
    }
}

fn tiered_cost(tiers: &[PricingTier], tokens: u64, rate: impl Fn(&PricingTier) -> f64) -> f64 {
    let mut sorted: Vec<&PricingTier> = tiers.iter().collect();
    sorted.sort_by(|a, b| b.threshold.cmp(&a.threshold));

    let mut remaining = tokens;
    let mut cost = 0.0;
    for tier in sorted {
        if remaining > tier.threshold {
            let portion = remaining - tier.threshold;
            cost += portion as f64 / TOKENS_PER_MILLION * rate(tier);
            remaining = tier.threshold;
        }
    }
    cost
}

/// Estimate the cost of a run before executing it.
pub fn estimate_cost(input_tokens: u64, pricing: &ModelPricing) -> f64 {
    let output_tokens = (input_tokens as f64 * ESTIMATED_OUTPUT_RATIO).ceil() as u64;
    pricing.cost(input_tokens, output_tokens)
}

/// Format a USD amount for display.
///
/// Sub-cent amounts keep 6 decimals, sub-dollar amounts 4, otherwise 2.
/// Display only: totals keep full precision internally.
pub fn format_cost(amount: f64) -> String {
    if amount < 0.01 {
        format!("${:.6}", amount)
    } else if amount < 1.0 {
        format!("${:.4}", amount)
    } else {
        format!("${:.2}", amount)
    }
}

/// Token and cost figures for a single pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassCost {
    pub pass_number: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub estimated_cost: f64,
}

/// Token and cost figures for the consolidation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageCost {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub estimated_cost: f64,
}

/// Cumulative cost of a review run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewCost {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub estimated_cost: f64,
    pub formatted_cost: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_pass_costs: Option<Vec<PassCost>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_maintenance_factor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consolidation: Option<UsageCost>,
}

impl fmt::Display for ReviewCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Input tokens:  {}", self.input_tokens)?;
        writeln!(f, "Output tokens: {}", self.output_tokens)?;
        writeln!(f, "Total tokens:  {}", self.total_tokens)?;
        write!(f, "Estimated cost: {}", self.formatted_cost)?;
        if let Some(passes) = self.pass_count {
            write!(f, " across {} pass(es)", passes)?;
        }
        Ok(())
    }
}

/// Accumulates per-pass usage into a running [`ReviewCost`].
#[derive(Debug, Clone, Default)]
pub struct CostAccountant {
    context_maintenance_factor: Option<f64>,
    passes: Vec<PassCost>,
    consolidation: Option<UsageCost>,
}

impl CostAccountant {
    pub fn new(context_maintenance_factor: Option<f64>) -> Self {
        Self {
            context_maintenance_factor,
            passes: Vec::new(),
            consolidation: None,
        }
    }

    /// Rebuild an accountant from pass costs saved in a checkpoint.
    pub fn restore(context_maintenance_factor: Option<f64>, passes: Vec<PassCost>) -> Self {
        Self {
            context_maintenance_factor,
            passes,
            consolidation: None,
        }
    }

    /// Record a completed pass. Pass numbers must strictly increase.
    pub fn record_pass(
        &mut self,
        pass_number: u32,
        input_tokens: u64,
        output_tokens: u64,
        pricing: &ModelPricing,
    ) -> Result<PassCost, CostError> {
        if let Some(last) = self.passes.last()
            && pass_number <= last.pass_number
        {
            return Err(CostError::PassOutOfOrder {
                pass: pass_number,
                last: last.pass_number,
            });
        }

        let cost = PassCost {
            pass_number,
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            estimated_cost: pricing.cost(input_tokens, output_tokens),
        };
        self.passes.push(cost.clone());
        Ok(cost)
    }

    /// Record the writer model's consolidation call.
    pub fn record_consolidation(
        &mut self,
        input_tokens: u64,
        output_tokens: u64,
        pricing: &ModelPricing,
    ) -> UsageCost {
        let usage = UsageCost {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            estimated_cost: pricing.cost(input_tokens, output_tokens),
        };
        self.consolidation = Some(usage.clone());
        usage
    }

    pub fn passes(&self) -> &[PassCost] {
        &self.passes
    }

    /// Immutable snapshot of everything recorded so far.
    pub fn snapshot(&self) -> ReviewCost {
        let mut input_tokens: u64 = self.passes.iter().map(|p| p.input_tokens).sum();
        let mut output_tokens: u64 = self.passes.iter().map(|p| p.output_tokens).sum();
        let mut estimated_cost: f64 = self.passes.iter().map(|p| p.estimated_cost).sum();

        if let Some(ref consolidation) = self.consolidation {
            input_tokens += consolidation.input_tokens;
            output_tokens += consolidation.output_tokens;
            estimated_cost += consolidation.estimated_cost;
        }

        let has_passes = !self.passes.is_empty();
        ReviewCost {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            estimated_cost,
            formatted_cost: format_cost(estimated_cost),
            pass_count: has_passes.then_some(self.passes.len() as u32),
            per_pass_costs: has_passes.then(|| self.passes.clone()),
            context_maintenance_factor: self.context_maintenance_factor,
            consolidation: self.consolidation.clone(),
        }
    }
}
