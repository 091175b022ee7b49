//! Fixtures for tests
use crate::capability::{CapabilityEntry, PropertyDescriptor, ResourceKey};
use crate::recipe::{DirectedLink, Material, ProcessStep, Recipe};
use crate::solution::{StepAssignment, StructuredSolution};
use rstest::fixture;

/// A step requiring the "Cut" concept, without parameters
pub fn cut_step(id: &str) -> ProcessStep {
    step_with_semantic(id, "https://example.com/caps#Cut")
}

/// A step with the given semantic description, without parameters
pub fn step_with_semantic(id: &str, semantic: &str) -> ProcessStep {
    ProcessStep {
        id: id.into(),
        description: format!("Step {id}"),
        semantic_description: semantic.into(),
        parameters: Vec::new(),
    }
}

/// A capability without properties
pub fn simple_capability(name: &str, id: &str) -> CapabilityEntry {
    CapabilityEntry {
        name: name.into(),
        id: id.into(),
        generalized_by: Vec::new(),
        properties: Vec::new(),
    }
}

/// A transport capability
#[fixture]
pub fn transfer_capability() -> CapabilityEntry {
    simple_capability("Transfer", "https://example.com/caps#Transfer")
}

/// A resource map entry with a single capability
pub fn resource_with(name: &str, entry: CapabilityEntry) -> (ResourceKey, Vec<CapabilityEntry>) {
    (ResourceKey::for_name(name), vec![entry])
}

/// Deserialise a property descriptor from its raw JSON shape
pub fn property_from_json(value: serde_json::Value) -> PropertyDescriptor {
    serde_json::from_value(value).unwrap()
}

fn material(id: &str) -> Material {
    Material {
        id: id.into(),
        key: "Water".into(),
        unit_of_measure: Some("l".into()),
        quantity: 1.0,
    }
}

/// A two-step recipe with a material chain: M1 -> S1 -> M2 -> S2 -> M3
#[fixture]
pub fn chain_recipe() -> Recipe {
    Recipe {
        steps: vec![cut_step("S1"), cut_step("S2")],
        inputs: vec![material("M1")],
        intermediates: vec![material("M2")],
        outputs: vec![material("M3")],
        links: vec![
            DirectedLink {
                from: "M1".into(),
                to: "S1".into(),
            },
            DirectedLink {
                from: "S1".into(),
                to: "M2".into(),
            },
            DirectedLink {
                from: "M2".into(),
                to: "S2".into(),
            },
            DirectedLink {
                from: "S2".into(),
                to: "M3".into(),
            },
        ],
    }
}

/// A structured solution assigning steps S1, S2, ... to the given resources,
/// without capability details
pub fn structured_solution(solution_id: u32, resources: &[&str]) -> StructuredSolution {
    StructuredSolution {
        solution_id,
        assignments: resources
            .iter()
            .enumerate()
            .map(|(index, resource)| StepAssignment {
                step_id: format!("S{}", index + 1).into(),
                step_description: String::new(),
                resource: ResourceKey::for_name(resource),
                capabilities: Vec::new(),
                parameter_matches: Vec::new(),
                capability_details: Vec::new(),
            })
            .collect(),
        material_flow_consistent: true,
    }
}
