//! Inbound direction of the Property Bridge: turns the runtime's raw JSON
//! planned/applied attributes back into `PropertyValue` trees, restoring
//! `Secret` wrappers from the runtime's own sensitivity marks and `Unknown`
//! from its own unknown marks.

use std::collections::BTreeSet;

use serde_json::Value as Json;

use crate::model::PropertyValue;

/// Dotted-path sensitivity/unknown marks as reported by the runtime
/// alongside a plan (e.g. `module.m.aws_db_instance.this.password`).
#[derive(Debug, Clone, Default)]
pub struct AttributeMarks {
    pub sensitive_paths: BTreeSet<String>,
    pub unknown_paths: BTreeSet<String>,
}

/// Decode one attribute tree rooted at `path`, consulting `marks` at every
/// level so a sensitive/unknown mark on a container also covers its
/// children even if the runtime didn't repeat the mark on each leaf.
pub fn decode_value(raw: &Json, path: &str, marks: &AttributeMarks) -> PropertyValue {
    let is_unknown = marks.unknown_paths.contains(path);
    let is_secret = marks.sensitive_paths.contains(path);

    let base = if is_unknown {
        PropertyValue::Unknown
    } else {
        decode_plain(raw, path, marks)
    };

    if is_secret {
        PropertyValue::Secret(Box::new(base))
    } else {
        base
    }
}

fn decode_plain(raw: &Json, path: &str, marks: &AttributeMarks) -> PropertyValue {
    match raw {
        Json::Null => PropertyValue::Null,
        Json::Bool(b) => PropertyValue::Bool(*b),
        Json::Number(n) => PropertyValue::Number(n.as_f64().unwrap_or_default()),
        Json::String(s) => PropertyValue::String(s.clone()),
        Json::Array(items) => PropertyValue::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, v)| decode_value(v, &format!("{path}[{i}]"), marks))
                .collect(),
        ),
        Json::Object(fields) => PropertyValue::Object(
            fields
                .iter()
                .map(|(k, v)| {
                    let child_path = if path.is_empty() {
                        k.clone()
                    } else {
                        format!("{path}.{k}")
                    };
                    (k.clone(), decode_value(v, &child_path, marks))
                })
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_tree_decodes_without_marks() {
        let raw = json!({"name": "demo", "count": 3});
        let value = decode_value(&raw, "module.m.res", &AttributeMarks::default());
        match value {
            PropertyValue::Object(fields) => {
                assert_eq!(fields.get("name"), Some(&PropertyValue::String("demo".into())));
                assert_eq!(fields.get("count"), Some(&PropertyValue::Number(3.0)));
            }
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn marked_sensitive_path_wraps_in_secret() {
        let raw = json!({"password": "hunter2"});
        let mut marks = AttributeMarks::default();
        marks.sensitive_paths.insert("module.m.res.password".to_string());
        let value = decode_value(&raw, "module.m.res", &marks);
        let PropertyValue::Object(fields) = value else { panic!("expected object") };
        assert_eq!(
            fields.get("password"),
            Some(&PropertyValue::Secret(Box::new(PropertyValue::String("hunter2".into()))))
        );
    }

    #[test]
    fn marked_unknown_path_becomes_unknown_regardless_of_raw_value() {
        let raw = json!({"arn": null});
        let mut marks = AttributeMarks::default();
        marks.unknown_paths.insert("module.m.res.arn".to_string());
        let value = decode_value(&raw, "module.m.res", &marks);
        let PropertyValue::Object(fields) = value else { panic!("expected object") };
        assert_eq!(fields.get("arn"), Some(&PropertyValue::Unknown));
    }

    #[test]
    fn array_elements_get_indexed_paths() {
        let raw = json!(["a", "b"]);
        let mut marks = AttributeMarks::default();
        marks.unknown_paths.insert("module.m.res.tags[1]".to_string());
        let value = decode_value(&raw, "module.m.res.tags", &marks);
        let PropertyValue::Array(items) = value else { panic!("expected array") };
        assert_eq!(items[0], PropertyValue::String("a".into()));
        assert_eq!(items[1], PropertyValue::Unknown);
    }
}
