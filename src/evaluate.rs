//! The weighted evaluator.
//!
//! Scores accepted solutions by a normalised weighted sum of their energy, use
//! and CO₂ cost totals and sorts them ascending, best solution first. The
//! evaluator is total: resources missing from the cost table contribute zero
//! and a dimension whose maximum over the solution set is zero is skipped.
use crate::capability::ResourceKey;
use crate::solution::StructuredSolution;
use crate::units::{Co2Footprint, EnergyCost, Score, UseCost};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The per-use cost entries of one resource
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct ResourceCost {
    /// Energy cost of running a step on the resource
    pub energy: EnergyCost,
    /// Wear-and-tear cost of using the resource
    pub usage: UseCost,
    /// CO₂ footprint of running a step on the resource
    pub co2: Co2Footprint,
}

/// Cost entries per resource, as loaded by the collaborator
pub type CostTable = IndexMap<ResourceKey, ResourceCost>;

fn default_energy_weight() -> f64 {
    0.4
}

fn default_use_weight() -> f64 {
    0.3
}

fn default_co2_weight() -> f64 {
    0.3
}

/// Weights for the three cost dimensions.
///
/// The weights nominally sum to 1 but are not re-normalised.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    /// Weight of the energy cost term
    #[serde(default = "default_energy_weight")]
    pub energy: f64,
    /// Weight of the use cost term
    #[serde(default = "default_use_weight", rename = "use")]
    pub usage: f64,
    /// Weight of the CO₂ footprint term
    #[serde(default = "default_co2_weight")]
    pub co2: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            energy: default_energy_weight(),
            usage: default_use_weight(),
            co2: default_co2_weight(),
        }
    }
}

/// A solution together with its cost totals and composite score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluatedSolution {
    /// ID of the evaluated solution
    pub solution_id: u32,
    /// Sum of the energy costs of all assigned resources
    pub total_energy_cost: EnergyCost,
    /// Sum of the use costs of all assigned resources
    pub total_use_cost: UseCost,
    /// Sum of the CO₂ footprints of all assigned resources
    pub total_co2_footprint: Co2Footprint,
    /// Normalised weighted sum over the three dimensions; lower is better
    pub composite_score: Score,
}

/// Evaluate and sort solutions by weighted cost.
///
/// Each solution's totals are normalised against the per-dimension maxima over
/// the whole solution set and combined with the given weights. The result is a
/// permutation of the input, sorted ascending by score with ties broken by
/// solution ID.
pub fn rank(
    solutions: &[StructuredSolution],
    costs: &CostTable,
    weights: &Weights,
) -> Vec<EvaluatedSolution> {
    let totals: Vec<_> = solutions
        .iter()
        .map(|solution| {
            let mut energy = EnergyCost(0.0);
            let mut usage = UseCost(0.0);
            let mut co2 = Co2Footprint(0.0);
            for assignment in &solution.assignments {
                let cost = costs
                    .get(&assignment.resource)
                    .copied()
                    .unwrap_or_default();
                energy = energy + cost.energy;
                usage = usage + cost.usage;
                co2 = co2 + cost.co2;
            }
            (solution.solution_id, energy, usage, co2)
        })
        .collect();

    let energy_max = totals.iter().fold(0.0, |max, t| t.1.value().max(max));
    let use_max = totals.iter().fold(0.0, |max, t| t.2.value().max(max));
    let co2_max = totals.iter().fold(0.0, |max, t| t.3.value().max(max));

    // A dimension with a zero maximum carries no information and is skipped
    let term = |weight: f64, value: f64, max: f64| {
        if max > 0.0 { weight * value / max } else { 0.0 }
    };

    let mut evaluated: Vec<_> = totals
        .into_iter()
        .map(|(solution_id, energy, usage, co2)| EvaluatedSolution {
            solution_id,
            total_energy_cost: energy,
            total_use_cost: usage,
            total_co2_footprint: co2,
            composite_score: Score(
                term(weights.energy, energy.value(), energy_max)
                    + term(weights.usage, usage.value(), use_max)
                    + term(weights.co2, co2.value(), co2_max),
            ),
        })
        .collect();

    evaluated.sort_by(|a, b| {
        a.composite_score
            .value()
            .total_cmp(&b.composite_score.value())
            .then(a.solution_id.cmp(&b.solution_id))
    });
    evaluated
}
