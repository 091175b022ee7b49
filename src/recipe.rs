//! The General Recipe data model.
//!
//! A recipe describes a job independently of any specific plant: an ordered
//! list of process steps, the materials they consume and produce, and directed
//! links tying the two together. Link order is meaningful; the material-flow
//! checker scans links in their declared order.
use crate::id::{HasID, define_id_getter, define_id_type};
use anyhow::{Result, ensure};
use itertools::chain;
use log::warn;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::DiGraph;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

define_id_type! {StepID}
define_id_type! {MaterialID}

/// An immutable description of the job to be matched
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Recipe {
    /// The ordered sequence of process steps
    #[serde(rename = "ProcessSteps")]
    pub steps: Vec<ProcessStep>,
    /// Materials fed into the recipe from outside
    #[serde(rename = "Inputs", default)]
    pub inputs: Vec<Material>,
    /// Materials produced and consumed within the recipe
    #[serde(rename = "Intermediates", default)]
    pub intermediates: Vec<Material>,
    /// Materials leaving the recipe
    #[serde(rename = "Outputs", default)]
    pub outputs: Vec<Material>,
    /// Directed links between steps and materials, in declared order
    #[serde(rename = "DirectedLinks", default)]
    pub links: Vec<DirectedLink>,
}

/// A single step of the recipe
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProcessStep {
    /// Stable identifier, unique within the recipe
    #[serde(rename = "StepID")]
    pub id: StepID,
    /// Human-readable description
    #[serde(rename = "Description", default)]
    pub description: String,
    /// URI-like string whose trailing fragment names the required capability concept
    #[serde(rename = "SemanticDescription")]
    pub semantic_description: String,
    /// Parametric requirements on the capability
    #[serde(rename = "Parameters", default)]
    pub parameters: Vec<Parameter>,
}
define_id_getter! {ProcessStep}

impl ProcessStep {
    /// The short name of the required capability concept: the text after the last `#`
    /// of the semantic description (the whole string if it contains no `#`).
    pub fn semantic_short_name(&self) -> &str {
        self.semantic_description
            .rsplit('#')
            .next()
            .unwrap_or(&self.semantic_description)
    }
}

/// A parametric requirement of a process step
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Parameter {
    /// Human-readable description
    #[serde(rename = "Description", default)]
    pub description: String,
    /// The property this parameter constrains
    #[serde(rename = "Key")]
    pub key: String,
    /// Unit of measure, if any
    #[serde(rename = "UnitOfMeasure", default)]
    pub unit_of_measure: Option<String>,
    /// Textual `[op] number` expression (see [`crate::values::ValueExpression`])
    #[serde(rename = "ValueString")]
    pub value: String,
}

/// A material appearing in the recipe
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Material {
    /// Stable identifier, unique within the recipe
    #[serde(rename = "MaterialID")]
    pub id: MaterialID,
    /// The substance this material consists of
    #[serde(rename = "Key", default)]
    pub key: String,
    /// Unit of measure for the quantity, if any
    #[serde(rename = "UnitOfMeasure", default)]
    pub unit_of_measure: Option<String>,
    /// Amount of the material
    #[serde(rename = "Quantity", default)]
    pub quantity: f64,
}
define_id_getter! {Material}

/// A directed link between two recipe elements.
///
/// A link from a step to a material means the step produces the material; a link
/// from a material to a step means the step consumes it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DirectedLink {
    /// ID of the source element (step or material)
    #[serde(rename = "FromID")]
    pub from: String,
    /// ID of the target element (step or material)
    #[serde(rename = "ToID")]
    pub to: String,
}

impl Recipe {
    /// Iterate over all materials of the recipe (inputs, intermediates, outputs)
    pub fn materials(&self) -> impl Iterator<Item = &Material> {
        chain!(&self.inputs, &self.intermediates, &self.outputs)
    }

    /// The input materials of a step: materials from inputs or intermediates with a
    /// directed link into the step.
    pub fn input_materials_of(&self, step_id: &StepID) -> Vec<&Material> {
        let linked: HashSet<&str> = self
            .links
            .iter()
            .filter(|link| link.to == step_id.as_str())
            .map(|link| link.from.as_str())
            .collect();

        chain!(&self.inputs, &self.intermediates)
            .filter(|material| linked.contains(material.id.as_str()))
            .collect()
    }

    /// The steps linked directly into the given step
    pub fn predecessor_steps(&self, step_id: &StepID) -> Vec<&ProcessStep> {
        self.links
            .iter()
            .filter(|link| link.to == step_id.as_str())
            .filter_map(|link| self.steps.iter().find(|step| *step.id.as_str() == link.from))
            .collect()
    }

    /// Check the structural invariants of the recipe.
    ///
    /// Step and material IDs must be globally unique within the recipe and every
    /// link endpoint must refer to an existing element. A cycle in the link graph
    /// is legal but suspicious, so it is logged as a warning.
    pub fn validate(&self) -> Result<()> {
        let mut ids = HashSet::new();
        for id in self
            .steps
            .iter()
            .map(HasID::get_id)
            .chain(self.materials().map(HasID::get_id))
        {
            ensure!(ids.insert(id), "Duplicate ID {id} in recipe");
        }

        for link in &self.links {
            for endpoint in [&link.from, &link.to] {
                ensure!(
                    ids.contains(endpoint.as_str()),
                    "Link {} -> {} refers to unknown ID {endpoint}",
                    link.from,
                    link.to
                );
            }
        }

        if is_cyclic_directed(&self.link_graph()) {
            warn!("Recipe link graph contains a cycle");
        }

        Ok(())
    }

    /// Build a directed graph over step and material IDs from the recipe's links
    fn link_graph(&self) -> DiGraph<&str, ()> {
        let mut graph = DiGraph::new();
        let mut id_to_node = HashMap::new();

        for link in &self.links {
            let [from, to] = [&link.from, &link.to].map(|id| {
                *id_to_node
                    .entry(id.as_str())
                    .or_insert_with(|| graph.add_node(id.as_str()))
            });
            graph.add_edge(from, to, ());
        }

        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str) -> ProcessStep {
        ProcessStep {
            id: id.into(),
            description: String::new(),
            semantic_description: format!("urn:caps#{id}"),
            parameters: Vec::new(),
        }
    }

    fn material(id: &str) -> Material {
        Material {
            id: id.into(),
            key: "Water".into(),
            unit_of_measure: Some("l".into()),
            quantity: 1.0,
        }
    }

    fn link(from: &str, to: &str) -> DirectedLink {
        DirectedLink {
            from: from.into(),
            to: to.into(),
        }
    }

    fn two_step_recipe() -> Recipe {
        Recipe {
            steps: vec![step("S1"), step("S2")],
            inputs: vec![material("M1")],
            intermediates: vec![material("M2")],
            outputs: vec![material("M3")],
            links: vec![
                link("M1", "S1"),
                link("S1", "M2"),
                link("M2", "S2"),
                link("S2", "M3"),
            ],
        }
    }

    #[test]
    fn test_semantic_short_name() {
        let mut step = step("S1");
        step.semantic_description = "https://example.com/caps#Cut".into();
        assert_eq!(step.semantic_short_name(), "Cut");

        step.semantic_description = "Cut".into();
        assert_eq!(step.semantic_short_name(), "Cut");
    }

    #[test]
    fn test_validate_ok() {
        assert!(two_step_recipe().validate().is_ok());
    }

    #[test]
    fn test_validate_duplicate_id() {
        let mut recipe = two_step_recipe();
        recipe.outputs.push(material("S1"));
        assert!(recipe.validate().is_err());
    }

    #[test]
    fn test_validate_unknown_link_endpoint() {
        let mut recipe = two_step_recipe();
        recipe.links.push(link("S1", "M9"));
        assert!(recipe.validate().is_err());
    }

    #[test]
    fn test_input_materials_of() {
        let recipe = two_step_recipe();
        let materials = recipe.input_materials_of(&"S1".into());
        assert_eq!(materials.len(), 1);
        assert_eq!(materials[0].id, "M1".into());

        // Outputs are never input materials, even when linked into a step
        let materials = recipe.input_materials_of(&"S2".into());
        assert_eq!(materials.len(), 1);
        assert_eq!(materials[0].id, "M2".into());
    }

    #[test]
    fn test_predecessor_steps() {
        let mut recipe = two_step_recipe();
        assert!(recipe.predecessor_steps(&"S2".into()).is_empty());

        // Only direct step-to-step links count as predecessors
        recipe.links.push(link("S1", "S2"));
        let predecessors = recipe.predecessor_steps(&"S2".into());
        assert_eq!(predecessors.len(), 1);
        assert_eq!(predecessors[0].id, "S1".into());
    }
}
