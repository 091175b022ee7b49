//! End-to-end scenarios for the matching engine.
use capmatch::capability::{CapabilityEntry, ResourceKey, ResourceMap};
use capmatch::engine::{CancellationToken, DefaultSink, RunOptions, RunOutcome, Termination, run};
use capmatch::evaluate::{CostTable, ResourceCost, Weights, rank};
use capmatch::recipe::Recipe;
use capmatch::solution::{AssignmentRecord, FlatRecord, ValueDescriptor, apply_ranking};
use capmatch::units::{Co2Footprint, EnergyCost, UseCost};
use float_cmp::assert_approx_eq;
use itertools::Itertools;

/// Build a resource map from (name, capabilities JSON) pairs
fn resources(entries: &[(&str, &str)]) -> ResourceMap {
    entries
        .iter()
        .map(|(name, json)| {
            let capabilities: Vec<CapabilityEntry> = serde_json::from_str(json).unwrap();
            (ResourceKey::for_name(name), capabilities)
        })
        .collect()
}

fn recipe(json: &str) -> Recipe {
    serde_json::from_str(json).unwrap()
}

fn run_engine(recipe: &Recipe, resources: &ResourceMap, options: &RunOptions) -> RunOutcome {
    run(
        recipe,
        resources,
        options,
        &mut DefaultSink,
        &CancellationToken::new(),
    )
    .unwrap()
}

fn assignments(outcome: &RunOutcome) -> Vec<&AssignmentRecord> {
    outcome
        .records
        .iter()
        .filter_map(|record| match record {
            FlatRecord::Assignment(assignment) => Some(assignment),
            FlatRecord::Spacer => None,
        })
        .collect()
}

const CUT_CAPABILITY: &str = r#"[{
    "capability_name": "Cut",
    "capability_ID": "https://example.com/caps#Cut"
}]"#;

const SINGLE_STEP_RECIPE: &str = r#"{
    "ProcessSteps": [{
        "StepID": "S1",
        "Description": "Cut the block",
        "SemanticDescription": "https://example.com/caps#Cut"
    }]
}"#;

/// One step, one matching resource: a single solution with ID 1
#[test]
fn test_singleton_step_one_matching_resource() {
    let recipe = recipe(SINGLE_STEP_RECIPE);
    let resources = resources(&[("R1", CUT_CAPABILITY)]);

    let outcome = run_engine(&recipe, &resources, &RunOptions::default());
    assert_eq!(outcome.termination, Termination::Proven);

    let rows = assignments(&outcome);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].solution_id, 1);
    assert_eq!(rows[0].step_id, "S1".into());
    assert_eq!(rows[0].resource, ResourceKey::for_name("R1"));
}

/// A `>= 100` temperature parameter is satisfied by an 80..150 range property
/// and the match is recorded in the structured output
#[test]
fn test_parameter_range_match() {
    let recipe = recipe(
        r#"{
            "ProcessSteps": [{
                "StepID": "S1",
                "Description": "Cut hot",
                "SemanticDescription": "https://example.com/caps#Cut",
                "Parameters": [{"Key": "Temp", "UnitOfMeasure": "°C", "ValueString": ">= 100"}]
            }]
        }"#,
    );
    let resources = resources(&[(
        "R1",
        r#"[{
            "capability_name": "Cut",
            "capability_ID": "https://example.com/caps#Cut",
            "properties": [{
                "property_ID": "Temp",
                "property_unit": "°C",
                "valueMin": 80,
                "valueMax": 150
            }]
        }]"#,
    )]);

    let outcome = run_engine(&recipe, &resources, &RunOptions::default());
    let structured = outcome.structured.unwrap();
    assert_eq!(structured.len(), 1);

    let details = &structured[0].assignments[0].capability_details;
    assert_eq!(details.len(), 1);
    assert_eq!(details[0].capability_name, "Cut");

    let matched = &details[0].matched_properties;
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].property_id, "Temp");
    assert_eq!(
        matched[0].value,
        ValueDescriptor::Range {
            value_min: Some(80.0),
            value_max: Some(150.0)
        }
    );
}

/// A `= 120` speed parameter finds no match in the discrete set {100, 150};
/// with no other resource, the result is empty
#[test]
fn test_discrete_mismatch_rejected() {
    let recipe = recipe(
        r#"{
            "ProcessSteps": [{
                "StepID": "S1",
                "Description": "Cut fast",
                "SemanticDescription": "https://example.com/caps#Cut",
                "Parameters": [{"Key": "Speed", "UnitOfMeasure": "rpm", "ValueString": "= 120"}]
            }]
        }"#,
    );
    let resources = resources(&[(
        "R1",
        r#"[{
            "capability_name": "Cut",
            "capability_ID": "https://example.com/caps#Cut",
            "properties": [{
                "property_ID": "Speed",
                "property_unit": "rpm",
                "value": 100,
                "value1": 150
            }]
        }]"#,
    )]);

    let outcome = run_engine(&recipe, &resources, &RunOptions::default());
    assert_eq!(outcome.termination, Termination::Proven);
    assert!(outcome.records.is_empty());
    assert_eq!(outcome.attempts, 0);
}

const SPLIT_CHAIN_RECIPE: &str = r#"{
    "ProcessSteps": [
        {"StepID": "S1", "Description": "Cut", "SemanticDescription": "https://example.com/caps#Cut"},
        {"StepID": "S2", "Description": "Move", "SemanticDescription": "https://example.com/caps#Transfer"}
    ],
    "Inputs": [{"MaterialID": "M1", "Key": "Blank", "UnitOfMeasure": "pc", "Quantity": 1}],
    "DirectedLinks": [
        {"FromID": "S1", "ToID": "M1"},
        {"FromID": "M1", "ToID": "S2"}
    ]
}"#;

/// Material produced on one resource and consumed on another needs a transport
/// capability on the consuming side
#[test]
fn test_transport_required() {
    let recipe = recipe(SPLIT_CHAIN_RECIPE);

    // R2 offers no transport capability, so S2 has no viable assignment
    let no_transport = resources(&[
        ("R1", CUT_CAPABILITY),
        (
            "R2",
            r#"[{"capability_name": "Mix", "capability_ID": "https://example.com/caps#Mix"}]"#,
        ),
    ]);
    let outcome = run_engine(&recipe, &no_transport, &RunOptions::default());
    assert!(outcome.records.is_empty());

    // With a "Transfer" capability on R2 the split assignment is acceptable
    let with_transport = resources(&[
        ("R1", CUT_CAPABILITY),
        (
            "R2",
            r#"[{"capability_name": "Transfer", "capability_ID": "https://example.com/caps#Transfer"}]"#,
        ),
    ]);
    let outcome = run_engine(&recipe, &with_transport, &RunOptions::default());
    let rows = assignments(&outcome);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].resource, ResourceKey::for_name("R1"));
    assert_eq!(rows[1].resource, ResourceKey::for_name("R2"));
}

const TWO_FREE_STEPS_RECIPE: &str = r#"{
    "ProcessSteps": [
        {"StepID": "S1", "Description": "First cut", "SemanticDescription": "https://example.com/caps#Cut"},
        {"StepID": "S2", "Description": "Second cut", "SemanticDescription": "https://example.com/caps#Cut"}
    ]
}"#;

/// Two steps with two viable resources each enumerate to four distinct
/// solutions with gapless IDs
#[test]
fn test_enumeration_and_blocking() {
    let recipe = recipe(TWO_FREE_STEPS_RECIPE);
    let resources = resources(&[("R1", CUT_CAPABILITY), ("R2", CUT_CAPABILITY)]);

    let outcome = run_engine(&recipe, &resources, &RunOptions::default());
    let structured = outcome.structured.unwrap();
    assert_eq!(structured.len(), 4);
    assert_eq!(
        structured.iter().map(|s| s.solution_id).collect_vec(),
        vec![1, 2, 3, 4]
    );

    let distinct = structured
        .iter()
        .map(|s| {
            s.assignments
                .iter()
                .map(|a| (a.step_id.clone(), a.resource.clone()))
                .collect_vec()
        })
        .unique()
        .count();
    assert_eq!(distinct, 4);
}

/// Single-solution mode returns the first accepted solution only
#[test]
fn test_single_solution_mode() {
    let recipe = recipe(TWO_FREE_STEPS_RECIPE);
    let resources = resources(&[("R1", CUT_CAPABILITY), ("R2", CUT_CAPABILITY)]);

    let options = RunOptions {
        find_all: false,
        ..RunOptions::default()
    };
    let outcome = run_engine(&recipe, &resources, &options);
    assert_eq!(outcome.termination, Termination::FirstSolution);
    assert_eq!(outcome.structured.unwrap().len(), 1);
}

/// An exhausted attempt budget returns the accepted prefix
#[test]
fn test_attempt_budget_returns_prefix() {
    let recipe = recipe(TWO_FREE_STEPS_RECIPE);
    let resources = resources(&[("R1", CUT_CAPABILITY), ("R2", CUT_CAPABILITY)]);

    let options = RunOptions {
        max_attempts: 3,
        ..RunOptions::default()
    };
    let outcome = run_engine(&recipe, &resources, &options);
    assert_eq!(outcome.termination, Termination::BudgetExhausted);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.structured.unwrap().len(), 3);
}

/// Repeated runs yield identical solution sets and IDs
#[test]
fn test_runs_are_deterministic() {
    let recipe = recipe(TWO_FREE_STEPS_RECIPE);
    let resources = resources(&[("R1", CUT_CAPABILITY), ("R2", CUT_CAPABILITY)]);

    let first = run_engine(&recipe, &resources, &RunOptions::default());
    let second = run_engine(&recipe, &resources, &RunOptions::default());
    assert_eq!(first, second);
}

/// Weighted ranking: totals (10, 10, 10) vs (20, 5, 5) under weights
/// (0.4, 0.3, 0.3) score 0.80 and 0.70, so the second solution wins
#[test]
fn test_weighted_ranking() {
    let recipe = recipe(SINGLE_STEP_RECIPE);
    let resources = resources(&[("R1", CUT_CAPABILITY), ("R2", CUT_CAPABILITY)]);

    let outcome = run_engine(&recipe, &resources, &RunOptions::default());
    let structured = outcome.structured.unwrap();
    assert_eq!(structured.len(), 2);

    let costs = CostTable::from_iter([
        (
            ResourceKey::for_name("R1"),
            ResourceCost {
                energy: EnergyCost(10.0),
                usage: UseCost(10.0),
                co2: Co2Footprint(10.0),
            },
        ),
        (
            ResourceKey::for_name("R2"),
            ResourceCost {
                energy: EnergyCost(20.0),
                usage: UseCost(5.0),
                co2: Co2Footprint(5.0),
            },
        ),
    ]);
    let weights = Weights {
        energy: 0.4,
        usage: 0.3,
        co2: 0.3,
    };

    let evaluated = rank(&structured, &costs, &weights);
    assert_eq!(evaluated.len(), 2);
    assert_eq!(evaluated[0].solution_id, 2);
    assert_approx_eq!(f64, evaluated[0].composite_score.value(), 0.70);
    assert_eq!(evaluated[1].solution_id, 1);
    assert_approx_eq!(f64, evaluated[1].composite_score.value(), 0.80);

    // The ranked flat stream leads with solution 2 and carries the costs
    let merged = apply_ranking(&outcome.records, &evaluated);
    let FlatRecord::Assignment(best) = &merged[0] else {
        panic!("Expected an assignment record");
    };
    assert_eq!(best.solution_id, 2);
    let costs = best.costs.unwrap();
    assert_approx_eq!(f64, costs.score.value(), 0.70);
    assert_eq!(costs.energy, EnergyCost(20.0));
}
