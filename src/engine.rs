//! The constraint encoder and search loop.
//!
//! This is the heart of the matcher: candidate (step, resource) pairs become
//! boolean decision variables, per-step uniqueness and transport reachability
//! are asserted, and the solver session is then asked for models one at a
//! time. Each model is checked for material-flow consistency and either
//! recorded as a solution or discarded; in both cases the model is blocked so
//! the search moves on. One solver session lives for the duration of a run.
use crate::capability::{ResourceMap, has_transport_capability};
use crate::flow::{self, StepChoice};
use crate::matching::CandidateMatrix;
use crate::recipe::Recipe;
use crate::solution::{
    ChosenStep, FlatRecord, StructuredSolution, flat_records_for, structured_for,
};
use crate::solver::{SatResult, SolverSession, Variable};
use anyhow::Result;
use log::info;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// The default bound on the number of models examined per run
pub const DEFAULT_MAX_ATTEMPTS: u32 = 200;

/// Options controlling a search run
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Enumerate all solutions rather than stopping at the first accepted one
    pub find_all: bool,
    /// Also build structured per-solution objects for export and evaluation
    pub generate_structured: bool,
    /// Bound on the number of models examined
    pub max_attempts: u32,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            find_all: true,
            generate_structured: true,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Why a search run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Termination {
    /// The solver proved that no further models exist
    #[strum(serialize = "search space exhausted")]
    Proven,
    /// The attempt budget was reached before the search space was exhausted
    #[strum(serialize = "attempt budget reached")]
    BudgetExhausted,
    /// Single-solution mode stopped at the first accepted solution
    #[strum(serialize = "first solution found")]
    FirstSolution,
    /// The run was cancelled; partial results were discarded
    #[strum(serialize = "cancelled")]
    Cancelled,
}

/// The result of a search run
#[derive(Debug, PartialEq)]
pub struct RunOutcome {
    /// Flat records of all accepted solutions, with spacers between solutions
    pub records: Vec<FlatRecord>,
    /// Structured solutions, present iff requested in the options
    pub structured: Option<Vec<StructuredSolution>>,
    /// Why the run stopped
    pub termination: Termination,
    /// Number of models examined
    pub attempts: u32,
    /// Number of models rejected by the material-flow checker
    pub flow_rejections: u32,
}

/// A thread-safe flag for cancelling a running search.
///
/// The search loop polls the token between models and between material-flow
/// checks and surrenders promptly once it is cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a token that has not been cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A sink for human-readable progress messages.
///
/// The messages are diagnostics for a user watching the run; they are not part
/// of the data contract.
pub trait LogSink {
    /// Receive one progress message
    fn emit(&mut self, message: &str);
}

/// The default sink, forwarding progress messages to the log facade
#[derive(Debug, Default)]
pub struct DefaultSink;

impl LogSink for DefaultSink {
    fn emit(&mut self, message: &str) {
        info!("{message}");
    }
}

/// Match a recipe against a resource map.
///
/// Builds the candidate matrix, encodes the constraints and enumerates models
/// until the solver proves there are no more, the attempt budget is reached,
/// the first solution is accepted in single-solution mode, or the run is
/// cancelled. Solution IDs are assigned `1, 2, ...` in acceptance order.
///
/// An invalid recipe is the only error; an unsatisfiable problem or an
/// exhausted budget is a successful completion with the accepted prefix.
pub fn run(
    recipe: &Recipe,
    resources: &ResourceMap,
    options: &RunOptions,
    sink: &mut dyn LogSink,
    cancel: &CancellationToken,
) -> Result<RunOutcome> {
    recipe.validate()?;
    sink.emit(&format!(
        "Starting search for {} steps across {} resources",
        recipe.steps.len(),
        resources.len()
    ));

    let matrix = CandidateMatrix::build(recipe, resources);
    let mut session = SolverSession::new();
    let variables = encode(recipe, resources, &matrix, &mut session);
    sink.emit("Solving constraints...");

    let links = flow::classify_links(recipe);
    let mut records = Vec::new();
    let mut structured = options.generate_structured.then(Vec::new);
    let mut attempts = 0;
    let mut flow_rejections = 0;
    let mut solution_count = 0;

    let termination = loop {
        if cancel.is_cancelled() {
            break Termination::Cancelled;
        }

        if session.check() == SatResult::Unsatisfiable {
            if solution_count == 0 {
                sink.emit("No solution exists for the given recipe and resources");
            } else {
                sink.emit(&format!(
                    "Enumeration complete: {solution_count} solutions found"
                ));
            }
            break Termination::Proven;
        }
        attempts += 1;

        let chosen = extract_assignment(&session, &variables, &matrix, resources);
        let choices: Vec<StepChoice> = chosen
            .iter()
            .map(|choice| StepChoice {
                resource: choice.resource.clone(),
                transport: choice.cell.involves_transport(),
            })
            .collect();

        if cancel.is_cancelled() {
            break Termination::Cancelled;
        }

        match flow::check_flow(recipe, &links, &choices) {
            Ok(()) => {
                solution_count += 1;
                sink.emit(&format!("Solution {solution_count} found (attempt {attempts})"));

                if !records.is_empty() {
                    records.push(FlatRecord::Spacer);
                }
                records.extend(flat_records_for(solution_count, recipe, &chosen));
                if let Some(structured) = &mut structured {
                    structured.push(structured_for(solution_count, recipe, &chosen));
                }

                if !options.find_all {
                    break Termination::FirstSolution;
                }
            }
            Err(violation) => {
                flow_rejections += 1;
                sink.emit(&format!(
                    "Attempt {attempts}: assignment satisfies the constraints but not the material flow ({violation})"
                ));
            }
        }

        session.block(&session.true_variables());

        if attempts >= options.max_attempts {
            sink.emit(&format!(
                "Attempt budget of {} reached; stopping with {solution_count} accepted solutions",
                options.max_attempts
            ));
            break Termination::BudgetExhausted;
        }
    };

    if termination == Termination::Cancelled {
        sink.emit("Search cancelled");
        return Ok(RunOutcome {
            records: Vec::new(),
            structured: options.generate_structured.then(Vec::new),
            termination,
            attempts,
            flow_rejections,
        });
    }

    Ok(RunOutcome {
        records,
        structured,
        termination,
        attempts,
        flow_rejections,
    })
}

/// Encode the candidate matrix into solver constraints.
///
/// Returns one optional variable per (step, resource) pair, present iff the
/// pair is a candidate. Variables forbidden by transport reachability stay in
/// the returned table but are asserted false.
fn encode(
    recipe: &Recipe,
    resources: &ResourceMap,
    matrix: &CandidateMatrix,
    session: &mut SolverSession,
) -> Vec<Vec<Option<Variable>>> {
    let transport_capable: Vec<bool> = resources
        .values()
        .map(|capabilities| has_transport_capability(capabilities))
        .collect();
    let predecessors = predecessor_indices(recipe);

    let mut variables = Vec::with_capacity(recipe.steps.len());
    for (step, step_predecessors) in predecessors.iter().enumerate() {
        let row: Vec<Option<Variable>> = (0..resources.len())
            .map(|resource| matrix.cell(step, resource).map(|_| session.new_variable()))
            .collect();

        for (resource, variable) in row.iter().enumerate() {
            let Some(variable) = variable else { continue };
            if !transport_capable[resource]
                && needs_transfer(matrix, step_predecessors, resource)
            {
                session.assert_false(*variable);
            }
        }

        // Exactly one resource per step; a step without candidates makes the
        // problem unsatisfiable
        session.assert_exactly_one(row.iter().flatten().copied().collect());
        variables.push(row);
    }

    variables
}

/// Per step, the indices of the steps linked directly into it
fn predecessor_indices(recipe: &Recipe) -> Vec<Vec<usize>> {
    let step_index: HashMap<&str, usize> = recipe
        .steps
        .iter()
        .enumerate()
        .map(|(index, step)| (step.id.as_str(), index))
        .collect();

    let mut predecessors = vec![Vec::new(); recipe.steps.len()];
    for link in &recipe.links {
        if let (Some(from), Some(to)) = (
            step_index.get(link.from.as_str()),
            step_index.get(link.to.as_str()),
        ) {
            predecessors[*to].push(*from);
        }
    }

    predecessors
}

/// Whether running a step on the given resource requires a transfer onto it:
/// some predecessor step has a candidate on a different resource.
fn needs_transfer(matrix: &CandidateMatrix, predecessors: &[usize], resource: usize) -> bool {
    predecessors.iter().any(|predecessor| {
        matrix
            .candidate_resources(*predecessor)
            .any(|candidate| candidate != resource)
    })
}

/// Read the step assignment off the solver's current model
fn extract_assignment<'a>(
    session: &SolverSession,
    variables: &[Vec<Option<Variable>>],
    matrix: &'a CandidateMatrix,
    resources: &ResourceMap,
) -> Vec<ChosenStep<'a>> {
    variables
        .iter()
        .enumerate()
        .map(|(step, row)| {
            let resource = row
                .iter()
                .position(|variable| variable.is_some_and(|v| session.is_true(v)))
                .expect("Each step has exactly one assigned resource");
            let (key, _) = resources
                .get_index(resource)
                .expect("Resource index in range");
            ChosenStep {
                resource: key.clone(),
                cell: matrix.cell(step, resource).expect("Assigned pair is a candidate"),
            }
        })
        .collect()
}
