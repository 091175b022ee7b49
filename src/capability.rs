//! The capability model for production resources.
//!
//! Each resource offers a list of capability entries taken from its Asset
//! Administration Shell description. A capability names a concept, the parent
//! concepts generalising it, and the properties describing its parametric
//! envelope. Property values arrive as a loose bag of keys (`valueMin`,
//! `valueMax`, `value`, `value1`, ...) which is normalised into the tagged
//! [`ValueSpec`] at construction time.
use crate::id::define_id_type;
use indexmap::IndexMap;
use log::warn;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

define_id_type! {ResourceKey}

impl ResourceKey {
    /// The key for the resource with the given name
    pub fn for_name(name: &str) -> Self {
        format!("resource: {name}").into()
    }
}

/// Capability names that move material between resources
pub const TRANSPORT_CAPABILITIES: [&str; 3] = ["Dosing", "Transfer", "Discharge"];

/// Whether the named capability moves material between resources
pub fn is_transport_capability(name: &str) -> bool {
    TRANSPORT_CAPABILITIES.contains(&name)
}

/// The capabilities of all known resources, in collaborator output order.
///
/// The iteration order of this map is the resource order used when encoding the
/// constraint problem, so it determines the order in which solutions are
/// enumerated.
pub type ResourceMap = IndexMap<ResourceKey, Vec<CapabilityEntry>>;

/// Whether any capability of a resource is a transport capability
pub fn has_transport_capability(capabilities: &[CapabilityEntry]) -> bool {
    capabilities
        .iter()
        .any(|entry| is_transport_capability(&entry.name))
}

/// A single capability offered by a resource
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CapabilityEntry {
    /// Human-readable capability name (e.g. "Cut")
    #[serde(rename = "capability_name")]
    pub name: String,
    /// Semantic URI identifying the capability concept
    #[serde(rename = "capability_ID")]
    pub id: String,
    /// Short names of the parent concepts this capability generalises to
    #[serde(rename = "generalized_by", default)]
    pub generalized_by: Vec<String>,
    /// The declared properties of the capability
    #[serde(default)]
    pub properties: Vec<PropertyDescriptor>,
}

/// A declared property of a capability
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDescriptor {
    /// Identifier matched against parameter keys
    pub id: String,
    /// Human-readable name, if declared
    pub name: Option<String>,
    /// Unit of measure, if declared
    pub unit: Option<String>,
    /// The value envelope of the property
    pub values: ValueSpec,
    /// Constraints attached to the property
    pub constraints: Vec<PropertyConstraint>,
}

/// The value semantics declared for a property
#[derive(Debug, Clone, PartialEq)]
pub enum ValueSpec {
    /// A continuous range, possibly unbounded on either side
    Range {
        /// Lower bound, if declared and numeric
        min: Option<f64>,
        /// Upper bound, if declared and numeric
        max: Option<f64>,
    },
    /// A set of discrete numeric values
    DiscreteNumeric(Vec<f64>),
    /// A set of discrete non-numeric values
    DiscreteLiteral(Vec<String>),
    /// No value information declared
    Unspecified,
}

/// A constraint attached to a property.
///
/// Constraints with `conditional_type` of `"Pre"` are preconditions on the input
/// materials of the step the capability would perform.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PropertyConstraint {
    /// The kind of constraint
    #[serde(rename = "conditional_type")]
    pub conditional_type: String,
    /// Material key the constraint applies to
    #[serde(rename = "property_constraint_ID")]
    pub key: String,
    /// Unit of measure the matching material must carry
    #[serde(rename = "property_constraint_unit", default)]
    pub unit: Option<String>,
    /// `[op] number` expression on the material quantity
    #[serde(rename = "property_constraint_value")]
    pub expression: String,
}

impl PropertyConstraint {
    /// Whether this constraint is a precondition on input materials
    pub fn is_precondition(&self) -> bool {
        self.conditional_type == "Pre"
    }
}

/// The raw shape of a property in AAS-derived capability data.
///
/// Discrete values are spread over keys named `value`, `value1`, `value2` and so
/// on, collected here through the flattened map.
#[derive(Deserialize)]
struct PropertyRaw {
    #[serde(rename = "property_ID")]
    id: String,
    #[serde(rename = "property_name", default)]
    name: Option<String>,
    #[serde(rename = "property_unit", default)]
    unit: Option<String>,
    #[serde(rename = "valueMin", default)]
    value_min: Option<Value>,
    #[serde(rename = "valueMax", default)]
    value_max: Option<Value>,
    #[serde(rename = "property_constraint", default)]
    constraints: Vec<PropertyConstraint>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

impl<'de> Deserialize<'de> for PropertyDescriptor {
    fn deserialize<D>(deserialiser: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = PropertyRaw::deserialize(deserialiser)?;
        Ok(raw.into())
    }
}

impl From<PropertyRaw> for PropertyDescriptor {
    fn from(raw: PropertyRaw) -> Self {
        let discrete: Vec<&Value> = raw
            .extra
            .iter()
            .filter(|(key, value)| {
                key.starts_with("value") && *key != "valueType" && !value.is_null()
            })
            .map(|(_, value)| value)
            .collect();

        let has_range = raw.value_min.is_some() || raw.value_max.is_some();
        let values = if has_range {
            if !discrete.is_empty() {
                warn!(
                    "Property {} declares both range bounds and discrete values; using the range",
                    raw.id
                );
            }
            ValueSpec::Range {
                min: raw.value_min.as_ref().and_then(coerce_number),
                max: raw.value_max.as_ref().and_then(coerce_number),
            }
        } else {
            let numeric: Vec<f64> = discrete.iter().copied().filter_map(coerce_number).collect();
            if !numeric.is_empty() {
                ValueSpec::DiscreteNumeric(numeric)
            } else if !discrete.is_empty() {
                ValueSpec::DiscreteLiteral(discrete.into_iter().map(render_literal).collect())
            } else {
                ValueSpec::Unspecified
            }
        };

        Self {
            id: raw.id,
            name: raw.name,
            unit: raw.unit,
            values,
            constraints: raw.constraints,
        }
    }
}

/// Interpret a JSON value as a number, accepting numeric strings with a decimal
/// comma or point.
fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().replace(',', ".").parse().ok(),
        _ => None,
    }
}

/// Render a non-numeric discrete value for display and export
fn render_literal(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
