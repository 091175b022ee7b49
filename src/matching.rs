//! The compatibility builder.
//!
//! For each (step, resource) pair this module computes the capabilities on the
//! resource that are semantically and parametrically compatible with the step
//! and whose preconditions are met by the step's input materials. The result is
//! a sparse candidate matrix; pairs with no matching capability simply have no
//! entry and never become decision variables.
use crate::capability::{CapabilityEntry, PropertyDescriptor, ResourceMap, ValueSpec};
use crate::capability::is_transport_capability;
use crate::recipe::{Material, Parameter, ProcessStep, Recipe};
use crate::values::ValueExpression;
use log::debug;

/// The candidate matrix: per (step, resource) either absent or the non-empty
/// list of matching capabilities.
///
/// Steps are indexed by their position in the recipe, resources by their
/// position in the resource map.
pub struct CandidateMatrix<'a> {
    cells: Vec<Vec<Option<CandidateCell<'a>>>>,
}

/// The matching capabilities of one viable (step, resource) pair
#[derive(Debug)]
pub struct CandidateCell<'a> {
    /// The capabilities compatible with the step, in declaration order
    pub capabilities: Vec<CandidateCapability<'a>>,
}

/// One capability found compatible with a step
#[derive(Debug)]
pub struct CandidateCapability<'a> {
    /// The capability entry on the resource
    pub entry: &'a CapabilityEntry,
    /// The (parameter, property) pairs that matched, one per step parameter
    pub matches: Vec<PropertyMatch<'a>>,
}

/// A step parameter together with the property that satisfied it
#[derive(Debug)]
pub struct PropertyMatch<'a> {
    /// The step parameter
    pub parameter: &'a Parameter,
    /// The first property of the capability compatible with the parameter
    pub property: &'a PropertyDescriptor,
}

impl<'a> CandidateMatrix<'a> {
    /// Build the candidate matrix for a recipe against a resource map
    pub fn build(recipe: &'a Recipe, resources: &'a ResourceMap) -> Self {
        let cells = recipe
            .steps
            .iter()
            .map(|step| {
                let inputs = recipe.input_materials_of(&step.id);
                resources
                    .values()
                    .map(|capabilities| build_cell(step, capabilities, &inputs))
                    .collect()
            })
            .collect();

        Self { cells }
    }

    /// The number of steps covered by the matrix
    pub fn num_steps(&self) -> usize {
        self.cells.len()
    }

    /// The cell for the given step and resource indices, if the pair is viable
    pub fn cell(&self, step: usize, resource: usize) -> Option<&CandidateCell<'a>> {
        self.cells[step][resource].as_ref()
    }

    /// Indices of the resources that are candidates for the given step
    pub fn candidate_resources(&self, step: usize) -> impl Iterator<Item = usize> + '_ {
        self.cells[step]
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.is_some())
            .map(|(resource, _)| resource)
    }
}

impl CandidateCell<'_> {
    /// Names of the matching capabilities, in declaration order
    pub fn capability_names(&self) -> impl Iterator<Item = &str> {
        self.capabilities.iter().map(|cap| cap.entry.name.as_str())
    }

    /// Whether any matching capability is a transport capability.
    ///
    /// A step assigned to this cell moves material rather than transforming it.
    pub fn involves_transport(&self) -> bool {
        self.capability_names().any(is_transport_capability)
    }
}

/// Compute the candidate cell for one (step, resource) pair
fn build_cell<'a>(
    step: &'a ProcessStep,
    capabilities: &'a [CapabilityEntry],
    inputs: &[&Material],
) -> Option<CandidateCell<'a>> {
    let matching: Vec<_> = capabilities
        .iter()
        .filter(|entry| semantic_match(step, entry))
        .filter_map(|entry| {
            let matches = parameters_compatible(step, entry)?;
            preconditions_met(entry, inputs).then_some(CandidateCapability { entry, matches })
        })
        .collect();

    (!matching.is_empty()).then_some(CandidateCell {
        capabilities: matching,
    })
}

/// Whether a capability semantically matches a step: either the full semantic URI
/// is equal, or the step's concept short name appears among the capability's
/// generalisations.
fn semantic_match(step: &ProcessStep, entry: &CapabilityEntry) -> bool {
    entry.id == step.semantic_description
        || entry
            .generalized_by
            .iter()
            .any(|parent| parent == step.semantic_short_name())
}

/// Check every parameter of the step against the properties of a capability.
///
/// Returns the matched (parameter, property) pairs, retaining the first
/// compatible property per parameter, or `None` if any parameter has no match.
/// A step without parameters is compatible with no matches recorded.
fn parameters_compatible<'a>(
    step: &'a ProcessStep,
    entry: &'a CapabilityEntry,
) -> Option<Vec<PropertyMatch<'a>>> {
    let mut matches = Vec::with_capacity(step.parameters.len());
    for parameter in &step.parameters {
        let property = entry.properties.iter().find(|property| {
            property.id == parameter.key
                && units_compatible(&parameter.unit_of_measure, &property.unit)
                && value_compatible(&parameter.value, property)
        })?;
        matches.push(PropertyMatch {
            parameter,
            property,
        });
    }

    Some(matches)
}

/// Units are compatible when absent on either side or equal.
///
/// An empty unit string counts as absent.
fn units_compatible(a: &Option<String>, b: &Option<String>) -> bool {
    match (normalise_unit(a), normalise_unit(b)) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

fn normalise_unit(unit: &Option<String>) -> Option<&str> {
    unit.as_deref().filter(|unit| !unit.is_empty())
}

/// Whether the parameter's value expression is compatible with the property's
/// declared values.
fn value_compatible(value: &str, property: &PropertyDescriptor) -> bool {
    match &property.values {
        ValueSpec::Range { min, max } => {
            // An unparseable expression leaves a range property unconstrained
            let Ok(expr) = value.parse::<ValueExpression>() else {
                return true;
            };
            range_compatible(&expr, *min, *max)
        }
        ValueSpec::DiscreteNumeric(values) => {
            let Ok(expr) = value.parse::<ValueExpression>() else {
                debug!(
                    "Rejecting property {}: malformed value expression {value:?}",
                    property.id
                );
                return false;
            };
            values.iter().any(|d| expr.op.compare(*d, expr.value))
        }
        ValueSpec::DiscreteLiteral(_) | ValueSpec::Unspecified => true,
    }
}

/// Check a parsed expression against a range property
fn range_compatible(expr: &ValueExpression, min: Option<f64>, max: Option<f64>) -> bool {
    use crate::values::CompareOp::*;

    if let Some(min) = min {
        let below = match expr.op {
            Equal | GreaterOrEqual => expr.value < min,
            Greater => expr.value <= min,
            LessOrEqual | Less => false,
        };
        if below {
            return false;
        }
    }

    if let Some(max) = max {
        let above = match expr.op {
            Equal | LessOrEqual => expr.value > max,
            Less => expr.value >= max,
            GreaterOrEqual | Greater => false,
        };
        if above {
            return false;
        }
    }

    true
}

/// Every "Pre" constraint on every property of the capability must be satisfied
/// by at least one input material of the step.
///
/// Unlike parameter matching, the material's unit must equal the constraint's
/// unit exactly (both may be absent).
fn preconditions_met(entry: &CapabilityEntry, inputs: &[&Material]) -> bool {
    entry
        .properties
        .iter()
        .flat_map(|property| &property.constraints)
        .filter(|constraint| constraint.is_precondition())
        .all(|constraint| {
            inputs.iter().any(|material| {
                material.key == constraint.key
                    && normalise_unit(&material.unit_of_measure)
                        == normalise_unit(&constraint.unit)
                    && constraint
                        .expression
                        .parse::<ValueExpression>()
                        .is_ok_and(|expr| expr.holds_for(material.quantity))
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{cut_step, property_from_json, resource_with, simple_capability};
    use rstest::rstest;
    use serde_json::json;

    fn step_with_parameter(key: &str, unit: Option<&str>, value: &str) -> ProcessStep {
        let mut step = cut_step("S1");
        step.parameters.push(Parameter {
            description: String::new(),
            key: key.into(),
            unit_of_measure: unit.map(String::from),
            value: value.into(),
        });
        step
    }

    #[test]
    fn test_semantic_match_exact_id() {
        let entry = simple_capability("Cut", "https://example.com/caps#Cut");
        assert!(semantic_match(&cut_step("S1"), &entry));
    }

    #[test]
    fn test_semantic_match_generalised() {
        let mut entry = simple_capability("Sever", "https://example.com/caps#Sever");
        assert!(!semantic_match(&cut_step("S1"), &entry));

        entry.generalized_by.push("Cut".into());
        assert!(semantic_match(&cut_step("S1"), &entry));
    }

    #[test]
    fn test_empty_parameters_bypass_property_matching() {
        let entry = simple_capability("Cut", "https://example.com/caps#Cut");
        let step = cut_step("S1");
        let matches = parameters_compatible(&step, &entry).unwrap();
        assert!(matches.is_empty());
    }

    #[rstest]
    #[case(">= 100", true)] // within [80, 150]
    #[case("= 120", true)]
    #[case("= 70", false)] // below min
    #[case("= 160", false)] // above max
    #[case("> 80", true)]
    #[case("> 150", true)] // only min is checked for `>`
    #[case("< 80", true)] // only max is checked for `<`
    #[case("< 150", false)] // `< max` itself is rejected
    #[case("<= 160", false)]
    #[case("not a number", true)] // unparseable leaves ranges unconstrained
    fn test_range_value_compatibility(#[case] value: &str, #[case] compatible: bool) {
        let property = property_from_json(json!({
            "property_ID": "Temp",
            "property_unit": "°C",
            "valueMin": 80,
            "valueMax": 150,
        }));
        assert_eq!(value_compatible(value, &property), compatible);
    }

    #[rstest]
    #[case("= 120", false)] // not in {100, 150}
    #[case("= 150", true)]
    #[case(">= 120", true)] // 150 >= 120
    #[case(">= 200", false)]
    #[case("<= 120", true)] // 100 <= 120
    #[case("<= 90", false)]
    #[case("> 100", true)]
    #[case("< 100", false)]
    #[case("garbage", false)] // unparseable rejects discrete properties
    fn test_discrete_value_compatibility(#[case] value: &str, #[case] compatible: bool) {
        let property = property_from_json(json!({
            "property_ID": "Speed",
            "value": 100,
            "value1": 150,
        }));
        assert_eq!(value_compatible(value, &property), compatible);
    }

    #[test]
    fn test_literal_and_unspecified_accept() {
        let literal = property_from_json(json!({"property_ID": "Mode", "value": "fast"}));
        assert!(value_compatible("anything", &literal));

        let unspecified = property_from_json(json!({"property_ID": "Mode"}));
        assert!(value_compatible("= 5", &unspecified));
    }

    #[test]
    fn test_parameter_requires_some_property() {
        let entry = simple_capability("Cut", "https://example.com/caps#Cut");
        let step = step_with_parameter("Temp", Some("°C"), ">= 100");
        assert!(parameters_compatible(&step, &entry).is_none());
    }

    #[test]
    fn test_unit_mismatch_skips_to_next_property() {
        let mut entry = simple_capability("Cut", "https://example.com/caps#Cut");
        entry.properties.push(property_from_json(json!({
            "property_ID": "Temp",
            "property_unit": "K",
            "valueMin": 0,
            "valueMax": 500,
        })));
        entry.properties.push(property_from_json(json!({
            "property_ID": "Temp",
            "property_unit": "°C",
            "valueMin": 80,
            "valueMax": 150,
        })));

        let step = step_with_parameter("Temp", Some("°C"), ">= 100");
        let matches = parameters_compatible(&step, &entry).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].property.unit.as_deref(), Some("°C"));
    }

    #[test]
    fn test_unitless_parameter_matches_any_unit() {
        let mut entry = simple_capability("Cut", "https://example.com/caps#Cut");
        entry.properties.push(property_from_json(json!({
            "property_ID": "Temp",
            "property_unit": "°C",
            "valueMin": 80,
            "valueMax": 150,
        })));

        let step = step_with_parameter("Temp", None, "= 100");
        assert!(parameters_compatible(&step, &entry).is_some());
    }

    #[test]
    fn test_preconditions() {
        let mut entry = simple_capability("Cut", "https://example.com/caps#Cut");
        entry.properties.push(property_from_json(json!({
            "property_ID": "Volume",
            "property_constraint": [{
                "conditional_type": "Pre",
                "property_constraint_ID": "Water",
                "property_constraint_unit": "l",
                "property_constraint_value": ">= 10",
            }],
        })));

        let enough = Material {
            id: "M1".into(),
            key: "Water".into(),
            unit_of_measure: Some("l".into()),
            quantity: 12.0,
        };
        assert!(preconditions_met(&entry, &[&enough]));

        let too_little = Material {
            quantity: 5.0,
            ..enough.clone()
        };
        assert!(!preconditions_met(&entry, &[&too_little]));

        let wrong_unit = Material {
            unit_of_measure: Some("ml".into()),
            ..enough.clone()
        };
        assert!(!preconditions_met(&entry, &[&wrong_unit]));

        // Precondition units must match exactly; a unitless material does not do
        let missing_unit = Material {
            unit_of_measure: None,
            ..enough.clone()
        };
        assert!(!preconditions_met(&entry, &[&missing_unit]));

        let wrong_key = Material {
            key: "Oil".into(),
            ..enough
        };
        assert!(!preconditions_met(&entry, &[&wrong_key]));
        assert!(!preconditions_met(&entry, &[]));
    }

    #[test]
    fn test_build_matrix() {
        let recipe = Recipe {
            steps: vec![cut_step("S1")],
            inputs: Vec::new(),
            intermediates: Vec::new(),
            outputs: Vec::new(),
            links: Vec::new(),
        };
        let resources = ResourceMap::from_iter([
            resource_with("saw", simple_capability("Cut", "https://example.com/caps#Cut")),
            resource_with("mixer", simple_capability("Mix", "https://example.com/caps#Mix")),
        ]);

        let matrix = CandidateMatrix::build(&recipe, &resources);
        assert_eq!(matrix.num_steps(), 1);
        assert!(matrix.cell(0, 0).is_some());
        assert!(matrix.cell(0, 1).is_none());
        assert_eq!(matrix.candidate_resources(0).collect::<Vec<_>>(), vec![0]);

        let cell = matrix.cell(0, 0).unwrap();
        assert_eq!(cell.capability_names().collect::<Vec<_>>(), vec!["Cut"]);
        assert!(!cell.involves_transport());
    }
}
