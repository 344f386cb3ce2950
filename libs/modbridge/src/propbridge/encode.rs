//! Outbound direction of the Property Bridge: turns a `PropertyValue` input
//! tree into the JSON the runtime config file embeds, replacing `Unknown`
//! leaves with a reference to the unknown-proxy resource and `Secret`
//! leaves with a reference to a synthesized `local`.

use std::collections::BTreeMap;

use serde_json::Value as Json;

use crate::model::PropertyValue;

/// Output of encoding one module's full input set: the JSON-ready input
/// map, any synthesized `local` assignments the secrets were hoisted into,
/// and whether the unknown-proxy resource needs to be emitted at all.
#[derive(Debug, Clone, Default)]
pub struct EncodedInputs {
    pub inputs: BTreeMap<String, Json>,
    pub locals: BTreeMap<String, Json>,
    pub needs_unknown_proxy: bool,
}

const UNKNOWN_PROXY_REF: &str = "${terraform_data.unknown_proxy.output}";

/// Encode a full top-level input map.
pub fn encode_inputs(inputs: &BTreeMap<String, PropertyValue>) -> EncodedInputs {
    let mut out = EncodedInputs::default();
    for (name, value) in inputs {
        let encoded = encode_value(value, &mut out);
        out.inputs.insert(name.clone(), encoded);
    }
    out
}

fn encode_value(value: &PropertyValue, acc: &mut EncodedInputs) -> Json {
    match value {
        PropertyValue::Null => Json::Null,
        PropertyValue::Bool(b) => Json::Bool(*b),
        PropertyValue::Number(n) => {
            serde_json::Number::from_f64(*n).map(Json::Number).unwrap_or(Json::Null)
        }
        PropertyValue::String(s) => Json::String(s.clone()),
        PropertyValue::Array(items) => {
            Json::Array(items.iter().map(|v| encode_value(v, acc)).collect())
        }
        PropertyValue::Object(fields) => {
            let mut map = serde_json::Map::new();
            for (k, v) in fields {
                map.insert(k.clone(), encode_value(v, acc));
            }
            Json::Object(map)
        }
        PropertyValue::Unknown => {
            acc.needs_unknown_proxy = true;
            Json::String(UNKNOWN_PROXY_REF.to_string())
        }
        PropertyValue::Secret(inner) => hoist_secret(inner, acc),
        PropertyValue::Output { known, element, .. } => {
            if !*known {
                acc.needs_unknown_proxy = true;
                Json::String(UNKNOWN_PROXY_REF.to_string())
            } else {
                encode_value(element, acc)
            }
        }
    }
}

/// Synthesize a fresh `local` assignment for a secret leaf and return a
/// reference to it in place of the value itself.
fn hoist_secret(inner: &PropertyValue, acc: &mut EncodedInputs) -> Json {
    let local_name = format!("local{}", acc.locals.len() + 1);
    let encoded_inner = encode_value(inner, acc);
    let local_name = if acc.locals.contains_key(&local_name) {
        // Guard against an (impossible in practice, but cheap to guard)
        // name collision from re-entrant encoding order.
        format!("local{}", acc.locals.len() + 1)
    } else {
        local_name
    };
    acc.locals.insert(local_name.clone(), encoded_inner);
    Json::String(format!("${{sensitive(local.{local_name})}}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(pairs: Vec<(&str, PropertyValue)>) -> BTreeMap<String, PropertyValue> {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn plain_values_pass_through_unchanged() {
        let result = encode_inputs(&inputs(vec![
            ("name", PropertyValue::String("demo".into())),
            ("count", PropertyValue::Number(3.0)),
        ]));
        assert_eq!(result.inputs["name"], Json::String("demo".into()));
        assert_eq!(result.inputs["count"], Json::from(3.0));
        assert!(!result.needs_unknown_proxy);
        assert!(result.locals.is_empty());
    }

    #[test]
    fn unknown_leaf_becomes_proxy_reference_and_sets_flag() {
        let result = encode_inputs(&inputs(vec![("region", PropertyValue::Unknown)]));
        assert_eq!(result.inputs["region"], Json::String(UNKNOWN_PROXY_REF.into()));
        assert!(result.needs_unknown_proxy);
    }

    #[test]
    fn secret_leaf_is_hoisted_into_a_local_and_referenced() {
        let result = encode_inputs(&inputs(vec![(
            "password",
            PropertyValue::Secret(Box::new(PropertyValue::String("hunter2".into()))),
        )]));
        assert_eq!(
            result.inputs["password"],
            Json::String("${sensitive(local.local1)}".into())
        );
        assert_eq!(result.locals["local1"], Json::String("hunter2".into()));
    }

    #[test]
    fn nested_unknown_inside_array_propagates_flag() {
        let result = encode_inputs(&inputs(vec![(
            "tags",
            PropertyValue::Array(vec![PropertyValue::String("a".into()), PropertyValue::Unknown]),
        )]));
        assert!(result.needs_unknown_proxy);
        assert_eq!(
            result.inputs["tags"],
            Json::Array(vec![Json::String("a".into()), Json::String(UNKNOWN_PROXY_REF.into())])
        );
    }

    #[test]
    fn known_output_encodes_its_element_directly() {
        let result = encode_inputs(&inputs(vec![(
            "endpoint",
            PropertyValue::Output {
                known: true,
                secret: false,
                dependencies: vec![],
                element: Box::new(PropertyValue::String("host".into())),
            },
        )]));
        assert_eq!(result.inputs["endpoint"], Json::String("host".into()));
    }
}
