//! Solution records and output shaping.
//!
//! Accepted assignments are emitted in two forms: a flat record stream for
//! table display (one record per (solution, step), with spacers between
//! solutions) and a structured per-solution object for export and evaluation,
//! carrying the matched capability properties and a descriptor of their value
//! semantics.
use crate::capability::{ResourceKey, ValueSpec};
use crate::evaluate::EvaluatedSolution;
use crate::matching::CandidateCell;
use crate::recipe::{Recipe, StepID};
use crate::units::{Co2Footprint, EnergyCost, Score, UseCost};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

/// One step's assignment within a model, as extracted from the solver
pub struct ChosenStep<'a> {
    /// The resource the step runs on
    pub resource: ResourceKey,
    /// The candidate cell for the (step, resource) pair
    pub cell: &'a CandidateCell<'a>,
}

/// Solution-level costs, present on flat records once a solution is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SolutionCosts {
    /// Total energy cost of the solution
    pub energy: EnergyCost,
    /// Total use cost of the solution
    pub usage: UseCost,
    /// Total CO₂ footprint of the solution
    pub co2: Co2Footprint,
    /// The composite score; lower is better
    pub score: Score,
}

impl From<&EvaluatedSolution> for SolutionCosts {
    fn from(evaluated: &EvaluatedSolution) -> Self {
        Self {
            energy: evaluated.total_energy_cost,
            usage: evaluated.total_use_cost,
            co2: evaluated.total_co2_footprint,
            score: evaluated.composite_score,
        }
    }
}

/// One entry of the flat output stream
#[derive(Debug, Clone, PartialEq)]
pub enum FlatRecord {
    /// A step assignment within a solution
    Assignment(AssignmentRecord),
    /// An empty spacer between solutions
    Spacer,
}

/// A step assignment row for table display
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentRecord {
    /// The solution this row belongs to
    pub solution_id: u32,
    /// The assigned step
    pub step_id: StepID,
    /// Human-readable step description
    pub step_description: String,
    /// The resource the step runs on
    pub resource: ResourceKey,
    /// Names of the capabilities matched for the pair
    pub capabilities: Vec<String>,
    /// Solution-level costs, once evaluated
    pub costs: Option<SolutionCosts>,
}

/// A complete solution in structured form
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredSolution {
    /// Stable 1-based ID in acceptance order
    pub solution_id: u32,
    /// One assignment per recipe step, in step order
    pub assignments: Vec<StepAssignment>,
    /// Always true; solutions failing the material-flow check are never emitted
    pub material_flow_consistent: bool,
}

/// One step's assignment in structured form
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepAssignment {
    /// The assigned step
    pub step_id: StepID,
    /// Human-readable step description
    pub step_description: String,
    /// The resource the step runs on
    pub resource: ResourceKey,
    /// Names of the capabilities matched for the pair
    pub capabilities: Vec<String>,
    /// The step's parameters, echoed for export
    pub parameter_matches: Vec<ParameterRecord>,
    /// Property-level match details per capability
    pub capability_details: Vec<CapabilityDetail>,
}

/// A step parameter echoed into the structured output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterRecord {
    /// Human-readable description
    pub description: String,
    /// The property the parameter constrains
    pub key: String,
    /// Unit of measure, if any
    pub unit: Option<String>,
    /// The textual value expression
    pub value: String,
}

/// The matched properties of one capability
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapabilityDetail {
    /// Name of the capability
    pub capability_name: String,
    /// The properties that satisfied the step's parameters
    pub matched_properties: Vec<MatchedProperty>,
}

/// A matched property together with its value semantics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedProperty {
    /// Identifier of the property
    pub property_id: String,
    /// Human-readable name, if declared
    pub property_name: Option<String>,
    /// Unit of measure, if declared
    pub property_unit: Option<String>,
    /// Descriptor of the property's value semantics
    #[serde(flatten)]
    pub value: ValueDescriptor,
}

/// The value semantics of a matched property, for export
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "value_type", rename_all = "snake_case")]
pub enum ValueDescriptor {
    /// A single declared value
    Exact {
        /// The value
        value: Value,
    },
    /// Several discrete values
    DiscreteSet {
        /// The values
        values: Vec<Value>,
    },
    /// A continuous range
    Range {
        /// Lower bound, if declared
        value_min: Option<f64>,
        /// Upper bound, if declared
        value_max: Option<f64>,
    },
    /// No value information declared
    Unspecified,
}

impl From<&ValueSpec> for ValueDescriptor {
    fn from(spec: &ValueSpec) -> Self {
        match spec {
            ValueSpec::Range { min, max } => Self::Range {
                value_min: *min,
                value_max: *max,
            },
            ValueSpec::DiscreteNumeric(values) => match values.as_slice() {
                [single] => Self::Exact {
                    value: Value::from(*single),
                },
                _ => Self::DiscreteSet {
                    values: values.iter().copied().map(Value::from).collect(),
                },
            },
            ValueSpec::DiscreteLiteral(values) => match values.as_slice() {
                [single] => Self::Exact {
                    value: Value::from(single.clone()),
                },
                _ => Self::DiscreteSet {
                    values: values.iter().cloned().map(Value::from).collect(),
                },
            },
            ValueSpec::Unspecified => Self::Unspecified,
        }
    }
}

/// Build the flat records for one accepted solution
pub fn flat_records_for(
    solution_id: u32,
    recipe: &Recipe,
    chosen: &[ChosenStep],
) -> Vec<FlatRecord> {
    recipe
        .steps
        .iter()
        .zip(chosen)
        .map(|(step, choice)| {
            FlatRecord::Assignment(AssignmentRecord {
                solution_id,
                step_id: step.id.clone(),
                step_description: step.description.clone(),
                resource: choice.resource.clone(),
                capabilities: choice.cell.capability_names().map(String::from).collect(),
                costs: None,
            })
        })
        .collect()
}

/// Build the structured form of one accepted solution
pub fn structured_for(
    solution_id: u32,
    recipe: &Recipe,
    chosen: &[ChosenStep],
) -> StructuredSolution {
    let assignments = recipe
        .steps
        .iter()
        .zip(chosen)
        .map(|(step, choice)| StepAssignment {
            step_id: step.id.clone(),
            step_description: step.description.clone(),
            resource: choice.resource.clone(),
            capabilities: choice.cell.capability_names().map(String::from).collect(),
            parameter_matches: step
                .parameters
                .iter()
                .map(|parameter| ParameterRecord {
                    description: parameter.description.clone(),
                    key: parameter.key.clone(),
                    unit: parameter.unit_of_measure.clone(),
                    value: parameter.value.clone(),
                })
                .collect(),
            capability_details: choice
                .cell
                .capabilities
                .iter()
                .map(|capability| CapabilityDetail {
                    capability_name: capability.entry.name.clone(),
                    matched_properties: capability
                        .matches
                        .iter()
                        .map(|matched| MatchedProperty {
                            property_id: matched.property.id.clone(),
                            property_name: matched.property.name.clone(),
                            property_unit: matched.property.unit.clone(),
                            value: (&matched.property.values).into(),
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect();

    StructuredSolution {
        solution_id,
        assignments,
        material_flow_consistent: true,
    }
}

/// Reorder a flat record stream by an evaluation result.
///
/// Rows are grouped per solution, emitted in the order of `ranked` (best
/// first) with spacers between solutions, and each row gains the
/// solution-level costs of its solution.
pub fn apply_ranking(records: &[FlatRecord], ranked: &[EvaluatedSolution]) -> Vec<FlatRecord> {
    let mut by_solution: IndexMap<u32, Vec<&AssignmentRecord>> = IndexMap::new();
    for record in records {
        if let FlatRecord::Assignment(assignment) = record {
            by_solution
                .entry(assignment.solution_id)
                .or_default()
                .push(assignment);
        }
    }

    let mut out = Vec::new();
    for evaluated in ranked {
        let Some(rows) = by_solution.get(&evaluated.solution_id) else {
            continue;
        };
        if !out.is_empty() {
            out.push(FlatRecord::Spacer);
        }
        for row in rows {
            out.push(FlatRecord::Assignment(AssignmentRecord {
                costs: Some(evaluated.into()),
                ..(*row).clone()
            }));
        }
    }

    out
}
