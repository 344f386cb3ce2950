//! Emits the single runtime-facing JSON config file for a module
//! instantiation: a `module` block, an optional `unknown_proxy` resource,
//! zero or more `locals`, and one `output` per declared output.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{json, Map, Value};

use crate::propbridge::EncodedInputs;

pub const CONFIG_FILE_NAME: &str = "main.tf.json";

/// Render and write the config file for one module instantiation.
///
/// `tf_name` is the module block's local name, derived from the URN's name
/// segment (e.g. the block is named `module.<tf_name>` in the emitted
/// JSON).
pub fn emit_config(
    working_dir: &Path,
    tf_name: &str,
    source: &str,
    version: Option<&str>,
    encoded_inputs: &EncodedInputs,
    output_names: &[String],
) -> Result<()> {
    let mut doc = Map::new();

    // module.<tfName> = { source, version, ...inputs }
    let mut module_block = Map::new();
    module_block.insert("source".to_string(), Value::String(source.to_string()));
    if let Some(v) = version {
        module_block.insert("version".to_string(), Value::String(v.to_string()));
    }
    for (name, value) in &encoded_inputs.inputs {
        module_block.insert(name.clone(), value.clone());
    }
    let mut module_wrapper = Map::new();
    module_wrapper.insert(tf_name.to_string(), Value::Object(module_block));
    doc.insert("module".to_string(), Value::Object(module_wrapper));

    // resource.terraform_data.unknown_proxy.input = "unknown", iff needed.
    if encoded_inputs.needs_unknown_proxy {
        let unknown_proxy = json!({ "input": "unknown" });
        let mut terraform_data = Map::new();
        terraform_data.insert("unknown_proxy".to_string(), unknown_proxy);
        let mut resource_kind = Map::new();
        resource_kind.insert("terraform_data".to_string(), Value::Object(terraform_data));
        doc.insert("resource".to_string(), Value::Object(resource_kind));
    }

    // locals.<localN> = value, one per distinct secret payload, deterministic order.
    if !encoded_inputs.locals.is_empty() {
        let mut locals = Map::new();
        let mut ordered: Vec<_> = encoded_inputs.locals.iter().collect();
        ordered.sort_by_key(|(name, _)| local_ordinal(name));
        for (name, value) in ordered {
            locals.insert(name.clone(), value.clone());
        }
        doc.insert("locals".to_string(), Value::Object(locals));
    }

    // output.<name>.value = module.<tfName>.<name>
    if !output_names.is_empty() {
        let mut outputs = Map::new();
        for name in output_names {
            outputs.insert(
                name.clone(),
                json!({ "value": format!("${{module.{tf_name}.{name}}}") }),
            );
        }
        doc.insert("output".to_string(), Value::Object(outputs));
    }

    let rendered = serde_json::to_string_pretty(&Value::Object(doc))
        .context("serializing runtime-facing config document")?;
    let target = working_dir.join(CONFIG_FILE_NAME);
    std::fs::write(&target, rendered)
        .with_context(|| format!("writing {}", target.display()))?;
    Ok(())
}

/// `local1`, `local2`, ... sort numerically rather than lexicographically.
fn local_ordinal(name: &str) -> u64 {
    name.trim_start_matches("local").parse().unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propbridge::EncodedInputs;
    use std::collections::BTreeMap;

    /// Reads back outputs declared in a previously emitted config; only
    /// exercised by `emits_one_output_entry_per_declared_output` below.
    fn declared_output_names(working_dir: &Path) -> Result<Vec<String>> {
        let path = working_dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&path)?;
        let doc: Value = serde_json::from_str(&raw)?;
        let names = doc
            .get("output")
            .and_then(Value::as_object)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        Ok(names)
    }

    fn tmp_dir(label: &str) -> std::path::PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("modbridge-cfgtest-{label}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn emits_module_block_with_source_and_version() {
        let dir = tmp_dir("basic");
        let inputs = EncodedInputs {
            inputs: {
                let mut m = BTreeMap::new();
                m.insert("region".to_string(), Value::String("us-east-1".into()));
                m
            },
            locals: BTreeMap::new(),
            needs_unknown_proxy: false,
        };
        emit_config(&dir, "m", "hashicorp/consul/aws", Some("0.0.5"), &inputs, &[]).unwrap();

        let raw = std::fs::read_to_string(dir.join(CONFIG_FILE_NAME)).unwrap();
        let doc: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["module"]["m"]["source"], "hashicorp/consul/aws");
        assert_eq!(doc["module"]["m"]["version"], "0.0.5");
        assert_eq!(doc["module"]["m"]["region"], "us-east-1");
        assert!(doc.get("resource").is_none());
        assert!(doc.get("locals").is_none());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn emits_unknown_proxy_resource_when_requested() {
        let dir = tmp_dir("unknown");
        let inputs = EncodedInputs {
            inputs: {
                let mut m = BTreeMap::new();
                m.insert(
                    "tf_var".to_string(),
                    Value::String("${terraform_data.unknown_proxy.output}".into()),
                );
                m
            },
            locals: BTreeMap::new(),
            needs_unknown_proxy: true,
        };
        emit_config(&dir, "m", "src", None, &inputs, &[]).unwrap();

        let raw = std::fs::read_to_string(dir.join(CONFIG_FILE_NAME)).unwrap();
        let doc: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["resource"]["terraform_data"]["unknown_proxy"]["input"], "unknown");
        assert_eq!(
            doc["module"]["m"]["tf_var"],
            "${terraform_data.unknown_proxy.output}"
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn emits_locals_in_numeric_order() {
        let dir = tmp_dir("locals");
        let mut locals = BTreeMap::new();
        locals.insert("local2".to_string(), Value::String("second".into()));
        locals.insert("local10".to_string(), Value::String("tenth".into()));
        locals.insert("local1".to_string(), Value::String("first".into()));
        let inputs = EncodedInputs {
            inputs: BTreeMap::new(),
            locals,
            needs_unknown_proxy: false,
        };
        emit_config(&dir, "m", "src", None, &inputs, &[]).unwrap();

        let raw = std::fs::read_to_string(dir.join(CONFIG_FILE_NAME)).unwrap();
        let doc: Value = serde_json::from_str(&raw).unwrap();
        let keys: Vec<_> = doc["locals"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["local1", "local2", "local10"]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn emits_one_output_entry_per_declared_output() {
        let dir = tmp_dir("outputs");
        let inputs = EncodedInputs {
            inputs: BTreeMap::new(),
            locals: BTreeMap::new(),
            needs_unknown_proxy: false,
        };
        emit_config(
            &dir,
            "m",
            "src",
            None,
            &inputs,
            &["endpoint".to_string(), "arn".to_string()],
        )
        .unwrap();

        let raw = std::fs::read_to_string(dir.join(CONFIG_FILE_NAME)).unwrap();
        let doc: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["output"]["endpoint"]["value"], "${module.m.endpoint}");
        assert_eq!(doc["output"]["arn"]["value"], "${module.m.arn}");

        let names = declared_output_names(&dir).unwrap();
        assert_eq!(names.len(), 2);

        std::fs::remove_dir_all(&dir).ok();
    }
}
