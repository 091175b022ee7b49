//! Collaborator routines for loading engine inputs.
//!
//! The engine itself never touches the filesystem; these functions produce its
//! inputs. Per-file capability parse failures degrade to warnings so a single
//! bad description does not abort a run, but directory-level failures (an
//! unreadable directory, no usable resource at all, a malformed cost sheet)
//! are errors.
use crate::capability::{CapabilityEntry, ResourceKey, ResourceMap};
use crate::evaluate::{CostTable, ResourceCost};
use crate::recipe::Recipe;
use crate::units::{Co2Footprint, EnergyCost, UseCost};
use anyhow::{Context, Result, ensure};
use itertools::Itertools;
use log::{info, warn};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// The cost sheet expected in the resource directory
const COSTS_FILE_NAME: &str = "costs.csv";

/// File extensions considered to hold resource capability descriptions
const RESOURCE_FILE_EXTENSIONS: [&str; 3] = ["json", "xml", "aasx"];

/// Format an error message to include the file path. To be used with `anyhow::Context`.
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().to_string_lossy())
}

/// Parse a JSON file at the specified path.
pub fn read_json<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let file = File::open(file_path).with_context(|| input_err_msg(file_path))?;
    serde_json::from_reader(BufReader::new(file)).with_context(|| input_err_msg(file_path))
}

/// Parse a TOML file at the specified path.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Read a series of type `T`s from a CSV file.
fn read_csv<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    csv::Reader::from_path(file_path)
        .with_context(|| input_err_msg(file_path))?
        .into_deserialize()
        .process_results(|iter| iter.collect_vec())
        .with_context(|| input_err_msg(file_path))
}

/// Read a recipe from a JSON file and check its structural invariants.
pub fn read_recipe(file_path: &Path) -> Result<Recipe> {
    let recipe: Recipe = read_json(file_path)?;
    recipe.validate().with_context(|| input_err_msg(file_path))?;
    Ok(recipe)
}

/// Collect resource capabilities from a directory.
///
/// Files with extensions `.json`, `.xml` and `.aasx` are considered, in file
/// name order; each becomes a resource keyed `resource: <file-stem>`. Only the
/// JSON representation is currently understood; other formats and unparseable
/// files are logged and skipped. An empty result is an error.
pub fn read_resource_dir(dir: &Path) -> Result<ResourceMap> {
    let paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Error reading directory {}", dir.display()))?
        .map_ok(|entry| entry.path())
        .process_results(|iter| {
            iter.filter(|path| {
                extension_of(path)
                    .is_some_and(|ext| RESOURCE_FILE_EXTENSIONS.contains(&ext.as_str()))
            })
            .sorted()
            .collect_vec()
        })
        .with_context(|| format!("Error reading directory {}", dir.display()))?;

    let mut resources = ResourceMap::new();
    for path in &paths {
        let Some(stem) = path.file_stem() else {
            continue;
        };
        let stem = stem.to_string_lossy();

        if extension_of(path).as_deref() != Some("json") {
            warn!(
                "Skipping {}: only the JSON capability representation is supported",
                path.display()
            );
            continue;
        }

        match read_json::<Vec<CapabilityEntry>>(path) {
            Ok(capabilities) if capabilities.is_empty() => {
                warn!("Skipping {}: no capabilities declared", path.display());
            }
            Ok(capabilities) => {
                info!(
                    "Loaded {} capabilities for resource {stem}",
                    capabilities.len()
                );
                resources.insert(ResourceKey::for_name(&stem), capabilities);
            }
            Err(err) => {
                warn!("Failed to parse {}: {err:#}", path.display());
            }
        }
    }

    ensure!(
        !resources.is_empty(),
        "No valid resource descriptions found in {}",
        dir.display()
    );
    Ok(resources)
}

/// A row of the cost sheet
#[derive(Deserialize)]
struct CostRow {
    resource: String,
    energy: f64,
    #[serde(rename = "use")]
    usage: f64,
    co2: f64,
}

/// Read the cost sheet from the resource directory.
///
/// A missing sheet is not an error; every resource then costs zero.
pub fn read_costs(dir: &Path) -> Result<CostTable> {
    let file_path = dir.join(COSTS_FILE_NAME);
    if !file_path.is_file() {
        info!(
            "No {COSTS_FILE_NAME} in {}; all resources cost zero",
            dir.display()
        );
        return Ok(CostTable::new());
    }

    let rows: Vec<CostRow> = read_csv(&file_path)?;
    Ok(rows
        .into_iter()
        .map(|row| {
            (
                ResourceKey::for_name(&row.resource),
                ResourceCost {
                    energy: EnergyCost(row.energy),
                    usage: UseCost(row.usage),
                    co2: Co2Footprint(row.co2),
                },
            )
        })
        .collect())
}

/// The lowercased extension of a path, if any
fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_file(dir: &Path, name: &str, contents: &str) {
        let mut file = File::create(dir.join(name)).unwrap();
        write!(file, "{contents}").unwrap();
    }

    const RECIPE_JSON: &str = r#"{
        "ProcessSteps": [{
            "StepID": "S1",
            "Description": "Cut the block",
            "SemanticDescription": "https://example.com/caps#Cut"
        }],
        "Inputs": [{"MaterialID": "M1", "Key": "Water", "UnitOfMeasure": "l", "Quantity": 5}],
        "DirectedLinks": [{"FromID": "M1", "ToID": "S1"}]
    }"#;

    const CAPABILITIES_JSON: &str = r#"[{
        "capability_name": "Cut",
        "capability_ID": "https://example.com/caps#Cut",
        "generalized_by": [],
        "properties": [{"property_ID": "Temp", "property_unit": "°C", "valueMin": 80, "valueMax": 150}]
    }]"#;

    #[test]
    fn test_read_recipe() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), "recipe.json", RECIPE_JSON);

        let recipe = read_recipe(&dir.path().join("recipe.json")).unwrap();
        assert_eq!(recipe.steps.len(), 1);
        assert_eq!(recipe.steps[0].id, "S1".into());
        assert_eq!(recipe.inputs[0].quantity, 5.0);
        assert_eq!(recipe.links.len(), 1);
    }

    #[test]
    fn test_read_recipe_invalid_link() {
        let dir = tempdir().unwrap();
        write_file(
            dir.path(),
            "recipe.json",
            r#"{"ProcessSteps": [], "DirectedLinks": [{"FromID": "A", "ToID": "B"}]}"#,
        );
        assert!(read_recipe(&dir.path().join("recipe.json")).is_err());
    }

    #[test]
    fn test_read_resource_dir() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), "saw.json", CAPABILITIES_JSON);
        write_file(dir.path(), "mixer.xml", "<aas/>");
        write_file(dir.path(), "broken.json", "{not json");
        write_file(dir.path(), "notes.txt", "ignored");

        let resources = read_resource_dir(dir.path()).unwrap();
        // Only the parseable JSON file becomes a resource
        assert_eq!(resources.len(), 1);
        let (key, capabilities) = resources.get_index(0).unwrap();
        assert_eq!(key, &ResourceKey::for_name("saw"));
        assert_eq!(capabilities.len(), 1);
        assert_eq!(capabilities[0].name, "Cut");
    }

    #[test]
    fn test_read_resource_dir_empty_is_an_error() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), "notes.txt", "no resources here");
        assert!(read_resource_dir(dir.path()).is_err());
    }

    #[test]
    fn test_read_costs() {
        let dir = tempdir().unwrap();
        write_file(
            dir.path(),
            COSTS_FILE_NAME,
            "resource,energy,use,co2\nsaw,10,5,1\nmixer,20,2.5,0\n",
        );

        let costs = read_costs(dir.path()).unwrap();
        assert_eq!(costs.len(), 2);
        let saw = &costs[&ResourceKey::for_name("saw")];
        assert_eq!(saw.energy, EnergyCost(10.0));
        assert_eq!(saw.usage, UseCost(5.0));
        assert_eq!(saw.co2, Co2Footprint(1.0));
    }

    #[test]
    fn test_read_costs_missing_file() {
        let dir = tempdir().unwrap();
        assert!(read_costs(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_read_costs_malformed_is_an_error() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), COSTS_FILE_NAME, "resource,energy\nsaw,oops\n");
        assert!(read_costs(dir.path()).is_err());
    }
}
