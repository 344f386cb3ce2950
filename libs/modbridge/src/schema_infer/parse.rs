//! Phase 2 of schema inference: reads every `.tf` file in the resolved
//! module directory and assembles an `InferredModuleSchema` from the
//! `variable` and `output` blocks declared there.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use hcl::{Block, Body, Expression, Structure};

use crate::errors::InferenceError;
use crate::model::{InferredModuleSchema, PropertySpec, PropertyType};

/// Parse every `.tf` file under `module_dir` and fold the declared
/// `variable`/`output` blocks into a schema. Declaration order across
/// files is not significant; a name repeated across files is an error.
pub fn infer_from_module_dir(module_dir: &Path) -> Result<InferredModuleSchema, InferenceError> {
    let mut schema = InferredModuleSchema::default();
    let mut seen_variables = BTreeMap::new();
    let mut seen_outputs = BTreeMap::new();

    let entries = std::fs::read_dir(module_dir)
        .map_err(|e| InferenceError::Init(anyhow::anyhow!(e)))?;
    let mut tf_files: Vec<_> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("tf"))
        .collect();
    tf_files.sort();

    for path in tf_files {
        let content = std::fs::read_to_string(&path)
            .map_err(|e| InferenceError::Init(anyhow::anyhow!(e)))?;
        let body: Body = hcl::parse(&content)
            .map_err(|e| InferenceError::Parse(format!("{}: {e}", path.display())))?;

        for structure in body.into_iter() {
            let Structure::Block(block) = structure else { continue };
            match block.identifier.as_str() {
                "variable" => {
                    let name = first_label(&block)
                        .ok_or_else(|| InferenceError::Parse(format!("{}: variable block missing a name label", path.display())))?;
                    if seen_variables.insert(name.clone(), ()).is_some() {
                        return Err(InferenceError::DuplicateDeclaration {
                            construct: "variable",
                            name,
                        });
                    }
                    let (spec, required) = infer_variable(&block, &name, &mut schema);
                    if required {
                        schema.required_inputs.insert(name.clone());
                    }
                    schema.inputs.insert(name, spec);
                }
                "output" => {
                    let name = first_label(&block)
                        .ok_or_else(|| InferenceError::Parse(format!("{}: output block missing a name label", path.display())))?;
                    if seen_outputs.insert(name.clone(), ()).is_some() {
                        return Err(InferenceError::DuplicateDeclaration {
                            construct: "output",
                            name,
                        });
                    }
                    let (spec, non_null) = infer_output(&block, &schema.inputs);
                    if non_null {
                        schema.non_null_outputs.insert(name.clone());
                    }
                    schema.outputs.insert(name, spec);
                }
                _ => {}
            }
        }
    }

    Ok(schema)
}

fn first_label(block: &Block) -> Option<String> {
    block.labels.first().map(|l| l.as_str().to_string())
}

fn attr<'a>(block: &'a Block, name: &str) -> Option<&'a Expression> {
    block.body.iter().find_map(|s| match s {
        Structure::Attribute(a) if a.key.as_str() == name => Some(&a.expr),
        _ => None,
    })
}

/// `variable` block → (spec, required). Required iff there is no default
/// and the variable is not declared nullable.
fn infer_variable(block: &Block, name: &str, schema: &mut InferredModuleSchema) -> (PropertySpec, bool) {
    let ty = attr(block, "type")
        .map(|expr| type_expr_to_property_type(expr, name, schema))
        .unwrap_or(PropertyType::String);
    let has_default = attr(block, "default").is_some();
    let nullable = attr(block, "nullable")
        .and_then(expr_as_bool)
        .unwrap_or(false);
    let required = !has_default && !nullable;
    (PropertySpec::of(ty), required)
}

/// `output` block → (spec, non_null). Output type comes from its `value`
/// expression shape. Nothing in a declared `output` block signals
/// nullability (unlike `variable`'s `nullable` attribute); inference never
/// marks an output non-null, leaving `non_null_outputs` for overrides to
/// populate.
fn infer_output(block: &Block, inputs: &BTreeMap<String, PropertySpec>) -> (PropertySpec, bool) {
    let ty = attr(block, "value")
        .map(|expr| infer_output_type(expr, inputs))
        .unwrap_or(PropertyType::Any);
    (PropertySpec::of(ty), false)
}

fn infer_output_type(expr: &Expression, inputs: &BTreeMap<String, PropertySpec>) -> PropertyType {
    let rendered = expr.to_string();
    if let Some(var_name) = rendered.strip_prefix("var.") {
        if let Some(spec) = inputs.get(var_name.trim()) {
            if let Some(ty) = &spec.property_type {
                return ty.clone();
            }
        }
        return PropertyType::Any;
    }
    if rendered.contains("compact(") {
        return PropertyType::array_of(PropertyType::String);
    }
    if rendered.trim_start().starts_with("try(") {
        return PropertyType::String;
    }
    if rendered.contains("[for ") {
        return PropertyType::array_of(PropertyType::String);
    }
    if rendered.trim_start().starts_with('[') && rendered.contains("...]") {
        return PropertyType::array_of(PropertyType::String);
    }
    match expr {
        Expression::Conditional(cond) => infer_output_type(&cond.true_expr, inputs),
        _ => PropertyType::Any,
    }
}

fn expr_as_bool(expr: &Expression) -> Option<bool> {
    match expr {
        Expression::Bool(b) => Some(*b),
        _ => None,
    }
}

/// Maps a `type = ...` constraint expression to the inferred property
/// type table. `hint` (the declaring variable's name) seeds the name
/// given to a named complex type when the expression is `object({...})`.
fn type_expr_to_property_type(expr: &Expression, hint: &str, schema: &mut InferredModuleSchema) -> PropertyType {
    let rendered = expr.to_string();
    let rendered = rendered.trim();
    if rendered == "string" {
        PropertyType::String
    } else if rendered == "number" {
        PropertyType::Number
    } else if rendered == "bool" {
        PropertyType::Boolean
    } else if rendered == "any" || rendered == "dynamic" {
        PropertyType::Any
    } else if let Some(inner) = strip_wrapper(rendered, "list").or_else(|| strip_wrapper(rendered, "set")) {
        PropertyType::array_of(type_expr_to_property_type_str(inner))
    } else if let Some(inner) = strip_wrapper(rendered, "map") {
        PropertyType::map_of(type_expr_to_property_type_str(inner))
    } else if rendered.starts_with("object(") {
        PropertyType::Ref {
            type_name: register_object_type(rendered, hint, schema),
        }
    } else {
        PropertyType::String
    }
}

fn type_expr_to_property_type_str(inner: &str) -> PropertyType {
    match inner.trim() {
        "string" => PropertyType::String,
        "number" => PropertyType::Number,
        "bool" => PropertyType::Boolean,
        _ => PropertyType::Any,
    }
}

/// Parses an `object({ name = string, age = optional(number, 0) })`
/// expression's field list and registers the result as a named complex
/// type under `schema.supporting_types`, returning the registered name.
/// Nested `object(...)` field types are not recursively registered; they
/// fall back to `any` the same way any other unrecognized field type
/// does.
fn register_object_type(rendered: &str, hint: &str, schema: &mut InferredModuleSchema) -> String {
    let mut properties = BTreeMap::new();
    let mut required_properties = BTreeSet::new();
    for (field_name, field_type, required) in parse_object_fields(rendered) {
        if required {
            required_properties.insert(field_name.clone());
        }
        properties.insert(field_name, PropertySpec::of(field_type));
    }

    let type_name = unique_type_name(&pascal_case(hint), &schema.supporting_types);
    schema.supporting_types.insert(
        type_name.clone(),
        PropertySpec::object_type(properties, required_properties),
    );
    type_name
}

/// `object({...})`'s field list → `(field name, field type, required)`.
/// A field is required unless its type is wrapped in `optional(...)`.
fn parse_object_fields(rendered: &str) -> Vec<(String, PropertyType, bool)> {
    let inner = rendered
        .strip_prefix("object(")
        .and_then(|rest| rest.strip_suffix(')'))
        .unwrap_or("")
        .trim();
    let body = inner
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .unwrap_or(inner)
        .trim();

    split_top_level(body)
        .into_iter()
        .filter_map(|entry| {
            let (key, value) = entry.split_once('=')?;
            let key = key.trim().trim_matches('"').to_string();
            let value = value.trim();
            if let Some(opt_inner) = strip_wrapper(value, "optional") {
                let type_part = split_top_level(opt_inner).into_iter().next().unwrap_or("any");
                Some((key, type_expr_text_to_property_type(type_part), false))
            } else {
                Some((key, type_expr_text_to_property_type(value), true))
            }
        })
        .collect()
}

/// Like `type_expr_to_property_type_str` but also understands the
/// `list`/`set`/`map` wrappers, for use on a field's type text within an
/// `object({...})` body.
fn type_expr_text_to_property_type(text: &str) -> PropertyType {
    let text = text.trim();
    if text == "string" {
        PropertyType::String
    } else if text == "number" {
        PropertyType::Number
    } else if text == "bool" {
        PropertyType::Boolean
    } else if text == "any" || text == "dynamic" {
        PropertyType::Any
    } else if let Some(inner) = strip_wrapper(text, "list").or_else(|| strip_wrapper(text, "set")) {
        PropertyType::array_of(type_expr_to_property_type_str(inner))
    } else if let Some(inner) = strip_wrapper(text, "map") {
        PropertyType::map_of(type_expr_to_property_type_str(inner))
    } else {
        PropertyType::Any
    }
}

/// Splits on top-level commas and newlines, ignoring separators nested
/// inside `()`/`{}`/`[]` or string literals. Used to walk an
/// `object({...})` field list without a full recursive-descent parser.
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    let mut in_string = false;
    for (i, ch) in s.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '(' | '{' | '[' if !in_string => depth += 1,
            ')' | '}' | ']' if !in_string => depth -= 1,
            ',' | '\n' if !in_string && depth == 0 => {
                let part = s[start..i].trim();
                if !part.is_empty() {
                    parts.push(part);
                }
                start = i + ch.len_utf8();
            }
            _ => {}
        }
    }
    let last = s[start..].trim();
    if !last.is_empty() {
        parts.push(last);
    }
    parts
}

/// Generates a unique PascalCased supporting-type name from a variable
/// name, appending a numeric suffix on collision.
fn unique_type_name(base: &str, existing: &BTreeMap<String, PropertySpec>) -> String {
    let base = if base.is_empty() { "Object" } else { base };
    if !existing.contains_key(base) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}{n}");
        if !existing.contains_key(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn pascal_case(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
                None => String::new(),
            }
        })
        .collect()
}

fn strip_wrapper<'a>(s: &'a str, wrapper: &str) -> Option<&'a str> {
    let prefix = format!("{wrapper}(");
    s.strip_prefix(&prefix).and_then(|rest| rest.strip_suffix(')'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_module(files: &[(&str, &str)]) -> std::path::PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("modbridge-schema-test-{}-{}", std::process::id(), files.len()));
        std::fs::create_dir_all(&dir).unwrap();
        for (name, content) in files {
            let mut f = std::fs::File::create(dir.join(name)).unwrap();
            f.write_all(content.as_bytes()).unwrap();
        }
        dir
    }

    #[test]
    fn infers_required_string_variable_without_default() {
        let dir = write_module(&[(
            "variables.tf",
            r#"variable "region" { type = string }"#,
        )]);
        let schema = infer_from_module_dir(&dir).unwrap();
        assert!(schema.required_inputs.contains("region"));
        assert_eq!(schema.inputs["region"].property_type, Some(PropertyType::String));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn variable_with_default_is_not_required() {
        let dir = write_module(&[(
            "variables.tf",
            r#"variable "count" { type = number default = 1 }"#,
        )]);
        let schema = infer_from_module_dir(&dir).unwrap();
        assert!(!schema.required_inputs.contains("count"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn duplicate_variable_across_files_is_an_error() {
        let dir = write_module(&[
            ("a.tf", r#"variable "region" { type = string }"#),
            ("b.tf", r#"variable "region" { type = string }"#),
        ]);
        let err = infer_from_module_dir(&dir).unwrap_err();
        assert!(matches!(err, InferenceError::DuplicateDeclaration { .. }));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn output_referencing_a_variable_inherits_its_type() {
        let dir = write_module(&[(
            "main.tf",
            "variable \"region\" { type = string }\noutput \"echoed\" { value = var.region }",
        )]);
        let schema = infer_from_module_dir(&dir).unwrap();
        assert_eq!(schema.outputs["echoed"].property_type, Some(PropertyType::String));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn output_sensitive_attribute_does_not_mark_non_null() {
        let dir = write_module(&[(
            "main.tf",
            r#"output "secret" { value = "x" sensitive = true }"#,
        )]);
        let schema = infer_from_module_dir(&dir).unwrap();
        assert!(!schema.non_null_outputs.contains("secret"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn object_typed_variable_registers_a_named_supporting_type() {
        let dir = write_module(&[(
            "variables.tf",
            r#"variable "tags" { type = object({ name = string, age = optional(number, 0) }) }"#,
        )]);
        let schema = infer_from_module_dir(&dir).unwrap();

        let ty = schema.inputs["tags"].property_type.clone().unwrap();
        let type_name = match ty {
            PropertyType::Ref { type_name } => type_name,
            other => panic!("expected a Ref, got {other:?}"),
        };
        assert_eq!(type_name, "Tags");

        let supporting = &schema.supporting_types[&type_name];
        assert_eq!(supporting.properties["name"].property_type, Some(PropertyType::String));
        assert_eq!(supporting.properties["age"].property_type, Some(PropertyType::Number));
        assert!(supporting.required_properties.contains("name"));
        assert!(!supporting.required_properties.contains("age"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn colliding_object_type_names_get_distinct_suffixes() {
        let dir = write_module(&[(
            "variables.tf",
            "variable \"config\" { type = object({ a = string }) }\n\
             variable \"config_extra\" { type = object({ b = string }) }",
        )]);
        let schema = infer_from_module_dir(&dir).unwrap();
        let first = match schema.inputs["config"].property_type.clone().unwrap() {
            PropertyType::Ref { type_name } => type_name,
            other => panic!("expected a Ref, got {other:?}"),
        };
        assert_eq!(first, "Config");
        assert_eq!(schema.supporting_types.len(), 2);
        std::fs::remove_dir_all(&dir).ok();
    }
}
