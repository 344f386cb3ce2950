//! JSON encoding of `PropertyValue` for the host-facing RPC wire format
//! (distinct from the runtime-facing encoding in `encode`/`decode`): the
//! host's own property maps tag `Unknown`/`Secret`/`Output` values with a
//! reserved `__modbridge_kind` marker rather than going through the
//! module runtime's local/proxy-resource conventions.

use serde_json::{json, Value as Json};

use crate::model::PropertyValue;

const KIND_KEY: &str = "__modbridge_kind";

pub fn to_wire_json(value: &PropertyValue) -> Json {
    match value {
        PropertyValue::Null => Json::Null,
        PropertyValue::Bool(b) => Json::Bool(*b),
        PropertyValue::Number(n) => {
            serde_json::Number::from_f64(*n).map(Json::Number).unwrap_or(Json::Null)
        }
        PropertyValue::String(s) => Json::String(s.clone()),
        PropertyValue::Array(items) => Json::Array(items.iter().map(to_wire_json).collect()),
        PropertyValue::Object(fields) => {
            let mut map = serde_json::Map::new();
            for (k, v) in fields {
                map.insert(k.clone(), to_wire_json(v));
            }
            Json::Object(map)
        }
        PropertyValue::Unknown => json!({KIND_KEY: "unknown"}),
        PropertyValue::Secret(inner) => json!({KIND_KEY: "secret", "value": to_wire_json(inner)}),
        PropertyValue::Output { known, secret, dependencies, element } => json!({
            KIND_KEY: "output",
            "known": known,
            "secret": secret,
            "dependencies": dependencies,
            "value": to_wire_json(element),
        }),
    }
}

pub fn from_wire_json(value: &Json) -> PropertyValue {
    match value {
        Json::Null => PropertyValue::Null,
        Json::Bool(b) => PropertyValue::Bool(*b),
        Json::Number(n) => PropertyValue::Number(n.as_f64().unwrap_or_default()),
        Json::String(s) => PropertyValue::String(s.clone()),
        Json::Array(items) => PropertyValue::Array(items.iter().map(from_wire_json).collect()),
        Json::Object(fields) => match fields.get(KIND_KEY).and_then(Json::as_str) {
            Some("unknown") => PropertyValue::Unknown,
            Some("secret") => PropertyValue::Secret(Box::new(
                fields.get("value").map(from_wire_json).unwrap_or(PropertyValue::Null),
            )),
            Some("output") => PropertyValue::Output {
                known: fields.get("known").and_then(Json::as_bool).unwrap_or(true),
                secret: fields.get("secret").and_then(Json::as_bool).unwrap_or(false),
                dependencies: fields
                    .get("dependencies")
                    .and_then(Json::as_array)
                    .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                    .unwrap_or_default(),
                element: Box::new(
                    fields.get("value").map(from_wire_json).unwrap_or(PropertyValue::Null),
                ),
            },
            _ => PropertyValue::Object(
                fields.iter().map(|(k, v)| (k.clone(), from_wire_json(v))).collect(),
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_values_round_trip() {
        let original = PropertyValue::Object(
            [("name".to_string(), PropertyValue::String("demo".into()))]
                .into_iter()
                .collect(),
        );
        let wire = to_wire_json(&original);
        assert_eq!(from_wire_json(&wire), original);
    }

    #[test]
    fn unknown_round_trips() {
        let wire = to_wire_json(&PropertyValue::Unknown);
        assert_eq!(from_wire_json(&wire), PropertyValue::Unknown);
    }

    #[test]
    fn secret_round_trips() {
        let original = PropertyValue::secret(PropertyValue::String("hunter2".into()));
        let wire = to_wire_json(&original);
        assert_eq!(from_wire_json(&wire), original);
    }

    #[test]
    fn output_round_trips_with_dependencies() {
        let original = PropertyValue::Output {
            known: true,
            secret: false,
            dependencies: vec!["urn:a".to_string()],
            element: Box::new(PropertyValue::String("host".into())),
        };
        let wire = to_wire_json(&original);
        assert_eq!(from_wire_json(&wire), original);
    }
}
