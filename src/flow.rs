//! The material-flow checker.
//!
//! Given a complete step-to-resource assignment, this module simulates the
//! recipe's directed material links in their declared order and confirms that
//! every material arrives at the resource that needs it, either because it was
//! produced there or because an assigned transport step can move it.
//!
//! The checker does not plan transports; it verifies that the assignment plus
//! the declared transport capabilities are sufficient to explain material
//! co-location. Note that consumption by a process step pins the material to
//! the consumer's resource, which is stricter than merely requiring the
//! material to have been available there.
use crate::capability::ResourceKey;
use crate::recipe::{MaterialID, Recipe, StepID};
use std::collections::HashMap;
use std::fmt;

/// How one step of an assignment is performed
#[derive(Debug, Clone, PartialEq)]
pub struct StepChoice {
    /// The resource the step is assigned to
    pub resource: ResourceKey,
    /// Whether any capability matched for the (step, resource) pair is a
    /// transport capability, making this a transport step
    pub transport: bool,
}

/// The interpretation of one directed link for the checker
#[derive(Debug, Clone, PartialEq)]
pub enum LinkKind {
    /// The step produces the material
    Produce {
        /// Index of the producing step
        step: usize,
        /// The produced material
        material: MaterialID,
    },
    /// The step consumes the material
    Consume {
        /// The consumed material
        material: MaterialID,
        /// Index of the consuming step
        step: usize,
    },
    /// Step-to-step or material-to-material; ignored by the checker
    Unrelated,
}

/// Classify the recipe's links once per run; the classification is independent
/// of any particular assignment.
pub fn classify_links(recipe: &Recipe) -> Vec<LinkKind> {
    let step_index: HashMap<&str, usize> = recipe
        .steps
        .iter()
        .enumerate()
        .map(|(index, step)| (step.id.as_str(), index))
        .collect();
    let materials: HashMap<&str, &MaterialID> = recipe
        .materials()
        .map(|material| (material.id.as_str(), &material.id))
        .collect();

    recipe
        .links
        .iter()
        .map(|link| {
            let from_step = step_index.get(link.from.as_str());
            let to_step = step_index.get(link.to.as_str());
            match (from_step, to_step) {
                (Some(step), None) => match materials.get(link.to.as_str()) {
                    Some(material) => LinkKind::Produce {
                        step: *step,
                        material: (*material).clone(),
                    },
                    None => LinkKind::Unrelated,
                },
                (None, Some(step)) => match materials.get(link.from.as_str()) {
                    Some(material) => LinkKind::Consume {
                        material: (*material).clone(),
                        step: *step,
                    },
                    None => LinkKind::Unrelated,
                },
                _ => LinkKind::Unrelated,
            }
        })
        .collect()
}

/// The current location of a material during the simulation
#[derive(Debug, Clone, PartialEq)]
enum Location {
    /// Not yet pinned to any resource
    Anywhere,
    /// Observed at the given resource
    At(ResourceKey),
}

/// A material that a process step cannot reach
#[derive(Debug, Clone, PartialEq)]
pub struct FlowViolation {
    /// The material that is out of place
    pub material: MaterialID,
    /// The consuming step
    pub step: StepID,
    /// Where the material currently is
    pub located_at: ResourceKey,
    /// Where the consuming step runs
    pub required_at: ResourceKey,
}

impl fmt::Display for FlowViolation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Material {} is at \"{}\" but step {} runs on \"{}\"",
            self.material, self.located_at, self.step, self.required_at
        )
    }
}

/// Check whether an assignment is material-flow consistent.
///
/// `links` must be the classification of `recipe`'s links and `choices` one
/// [`StepChoice`] per recipe step, in step order. Every material starts
/// unlocated; links are scanned in declared order.
pub fn check_flow(
    recipe: &Recipe,
    links: &[LinkKind],
    choices: &[StepChoice],
) -> Result<(), FlowViolation> {
    debug_assert_eq!(recipe.steps.len(), choices.len());

    let mut location: HashMap<&str, Location> = recipe
        .materials()
        .map(|material| (material.id.as_str(), Location::Anywhere))
        .collect();

    for kind in links {
        match kind {
            LinkKind::Produce { step, material } => {
                let choice = &choices[*step];
                // A transport producer leaves the material free to go anywhere
                let produced_at = if choice.transport {
                    Location::Anywhere
                } else {
                    Location::At(choice.resource.clone())
                };
                location.insert(material.as_str(), produced_at);
            }
            LinkKind::Consume { material, step } => {
                let choice = &choices[*step];
                if choice.transport {
                    // A transport step may pick the material up wherever it is
                    continue;
                }

                let current = location
                    .get_mut(material.as_str())
                    .expect("All linked materials have a location");
                match current {
                    Location::At(resource) if *resource != choice.resource => {
                        return Err(FlowViolation {
                            material: material.clone(),
                            step: recipe.steps[*step].id.clone(),
                            located_at: resource.clone(),
                            required_at: choice.resource.clone(),
                        });
                    }
                    // Consumption by a process step pins the material there
                    _ => *current = Location::At(choice.resource.clone()),
                }
            }
            LinkKind::Unrelated => {}
        }
    }

    Ok(())
}
