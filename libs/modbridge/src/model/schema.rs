use std::collections::{BTreeMap, BTreeSet};

/// A type ascribed to one input/output/supporting-type field by the Schema
/// Inferrer.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PropertyType {
    String,
    Number,
    Boolean,
    Any,
    Array {
        element: Box<PropertyType>,
    },
    Object {
        additional_properties: Box<PropertyType>,
    },
    /// Reference to a named complex type in `InferredModuleSchema::supporting_types`,
    /// rendered by the host as `#/types/<name>`.
    Ref {
        #[serde(rename = "type")]
        type_name: String,
    },
}

impl PropertyType {
    pub fn array_of(element: PropertyType) -> Self {
        PropertyType::Array {
            element: Box::new(element),
        }
    }

    pub fn map_of(value: PropertyType) -> Self {
        PropertyType::Object {
            additional_properties: Box::new(value),
        }
    }
}

/// One input or output's full spec: its type plus bookkeeping the host
/// schema needs (description is optional and omitted by inference, only
/// ever supplied by an override).
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct PropertySpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_type: Option<PropertyType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Field specs for a named complex type registered under
    /// `InferredModuleSchema::supporting_types`; empty for every other spec.
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub properties: BTreeMap<String, PropertySpec>,
    /// Names of `properties` that are required; meaningful only alongside
    /// `properties`.
    #[serde(skip_serializing_if = "BTreeSet::is_empty", default)]
    pub required_properties: BTreeSet<String>,
}

impl PropertySpec {
    pub fn of(ty: PropertyType) -> Self {
        Self {
            property_type: Some(ty),
            description: None,
            properties: BTreeMap::new(),
            required_properties: BTreeSet::new(),
        }
    }

    /// A named complex type's own spec: its field list, stored under
    /// `InferredModuleSchema::supporting_types` and pointed to by a
    /// `PropertyType::Ref`.
    pub fn object_type(
        properties: BTreeMap<String, PropertySpec>,
        required_properties: BTreeSet<String>,
    ) -> Self {
        Self {
            property_type: None,
            description: None,
            properties,
            required_properties,
        }
    }

    fn is_empty(&self) -> bool {
        self.property_type.is_none()
            && self.description.is_none()
            && self.properties.is_empty()
            && self.required_properties.is_empty()
    }

    /// Override merge: non-empty override fields replace the
    /// corresponding inferred field, field by field. Nested `properties`
    /// merge the same way, recursively; `required_properties` unions.
    fn merge_override(&self, over: &PropertySpec) -> PropertySpec {
        let mut properties = self.properties.clone();
        for (name, ovr_spec) in &over.properties {
            if ovr_spec.is_empty() {
                continue;
            }
            let merged = match properties.get(name) {
                Some(base_spec) => base_spec.merge_override(ovr_spec),
                None => ovr_spec.clone(),
            };
            properties.insert(name.clone(), merged);
        }
        PropertySpec {
            property_type: over
                .property_type
                .clone()
                .or_else(|| self.property_type.clone()),
            description: over.description.clone().or_else(|| self.description.clone()),
            properties,
            required_properties: self
                .required_properties
                .union(&over.required_properties)
                .cloned()
                .collect(),
        }
    }
}

/// The typed input/output/provider-config schema produced for a named
/// module source+version.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct InferredModuleSchema {
    pub inputs: BTreeMap<String, PropertySpec>,
    pub outputs: BTreeMap<String, PropertySpec>,
    pub required_inputs: BTreeSet<String>,
    pub non_null_outputs: BTreeSet<String>,
    pub supporting_types: BTreeMap<String, PropertySpec>,
    pub provider_config: BTreeMap<String, PropertySpec>,
}

impl InferredModuleSchema {
    /// Merge a partial override over an inferred base schema.
    ///
    /// Per-field map entries: non-empty override field replaces the
    /// inferred one. Supporting types union, override wins on name
    /// collision. Required-input/non-null-output sets union.
    pub fn merge_override(&self, over: &InferredModuleSchema) -> InferredModuleSchema {
        let merge_maps = |base: &BTreeMap<String, PropertySpec>,
                           ovr: &BTreeMap<String, PropertySpec>|
         -> BTreeMap<String, PropertySpec> {
            let mut out = base.clone();
            for (name, ovr_spec) in ovr {
                if ovr_spec.is_empty() {
                    continue;
                }
                let merged = match out.get(name) {
                    Some(base_spec) => base_spec.merge_override(ovr_spec),
                    None => ovr_spec.clone(),
                };
                out.insert(name.clone(), merged);
            }
            out
        };

        InferredModuleSchema {
            inputs: merge_maps(&self.inputs, &over.inputs),
            outputs: merge_maps(&self.outputs, &over.outputs),
            required_inputs: self
                .required_inputs
                .union(&over.required_inputs)
                .cloned()
                .collect(),
            non_null_outputs: self
                .non_null_outputs
                .union(&over.non_null_outputs)
                .cloned()
                .collect(),
            supporting_types: {
                // supporting types are themselves named records; override wins wholesale on overlap.
                let mut out = self.supporting_types.clone();
                out.extend(over.supporting_types.clone());
                out
            },
            provider_config: merge_maps(&self.provider_config, &over.provider_config),
        }
    }
}
