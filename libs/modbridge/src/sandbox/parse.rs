//! Converts the runtime's NDJSON result messages into `Plan`/`State`
//! value trees via the Property Bridge's decode direction.

use anyhow::{anyhow, Result};
use serde_json::Value as Json;

use crate::model::{
    ChangeKind, OutputChange, Plan, ResourceAddress, ResourcePlan, ResourceState, State,
};
use crate::propbridge::{decode_value, AttributeMarks};

fn change_kind_from_action(action: &str) -> ChangeKind {
    match action {
        "create" => ChangeKind::Create,
        "update" => ChangeKind::Update,
        "delete" => ChangeKind::Delete,
        "read" => ChangeKind::Read,
        "no-op" => ChangeKind::NoOp,
        "replace" => ChangeKind::Replace,
        "replace_destroy_before_create" => ChangeKind::ReplaceDestroyBeforeCreate,
        "forget" => ChangeKind::Forget,
        other => {
            tracing::warn!(action = other, "unrecognized change action from runtime, treating as update");
            ChangeKind::Update
        }
    }
}

fn marks_from(prefix: &str, unknown: Option<&Json>, sensitive: Option<&Json>) -> AttributeMarks {
    let mut marks = AttributeMarks::default();
    collect_paths(prefix, unknown, &mut marks.unknown_paths);
    collect_paths(prefix, sensitive, &mut marks.sensitive_paths);
    marks
}

/// The runtime marks unknown/sensitive-ness with a mirror-shaped JSON tree
/// of booleans (or arrays/objects of such); collect every path whose leaf
/// is `true`.
fn collect_paths(path: &str, value: Option<&Json>, out: &mut std::collections::BTreeSet<String>) {
    let Some(value) = value else { return };
    match value {
        Json::Bool(true) => {
            out.insert(path.to_string());
        }
        Json::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                collect_paths(&format!("{path}[{i}]"), Some(item), out);
            }
        }
        Json::Object(fields) => {
            for (k, v) in fields {
                let child = if path.is_empty() { k.clone() } else { format!("{path}.{k}") };
                collect_paths(&child, Some(v), out);
            }
        }
        _ => {}
    }
}

/// Parse the NDJSON messages from a plan-producing subcommand into a Plan.
pub fn parse_plan(messages: &[Json]) -> Result<Plan> {
    let mut plan = Plan::default();
    for message in messages {
        let Some(kind) = message.get("type").and_then(Json::as_str) else {
            continue;
        };
        match kind {
            "planned_change" => {
                let address_raw = message
                    .get("address")
                    .and_then(Json::as_str)
                    .ok_or_else(|| anyhow!("planned_change missing address"))?;
                let address = ResourceAddress::new(address_raw);
                let underlying_type = message
                    .get("resource_type")
                    .and_then(Json::as_str)
                    .unwrap_or_default()
                    .to_string();
                let action = message.get("action").and_then(Json::as_str).unwrap_or("no-op");
                let after = message.get("after").cloned().unwrap_or(Json::Null);
                let marks = marks_from(
                    address_raw,
                    message.get("after_unknown"),
                    message.get("after_sensitive"),
                );
                let planned_attributes = decode_value(&after, address_raw, &marks);
                plan.resources.insert(
                    address,
                    ResourcePlan {
                        underlying_type,
                        change: change_kind_from_action(action),
                        planned_attributes,
                    },
                );
            }
            "output_change" => {
                let name = message
                    .get("name")
                    .and_then(Json::as_str)
                    .ok_or_else(|| anyhow!("output_change missing name"))?
                    .to_string();
                let action = message.get("action").and_then(Json::as_str).unwrap_or("no-op");
                plan.output_changes.push(OutputChange {
                    name,
                    change: change_kind_from_action(action),
                });
            }
            "prior_state" => {
                let state_value = message.get("state").cloned().unwrap_or(Json::Null);
                plan.prior_state = Some(parse_state(&[state_value])?);
            }
            _ => {}
        }
    }
    Ok(plan)
}

/// Parse the NDJSON messages from an apply/refresh/show subcommand into a
/// State.
pub fn parse_state(messages: &[Json]) -> Result<State> {
    let mut state = State::default();
    for message in messages {
        let resources = message.get("resources").and_then(Json::as_array);
        if let Some(resources) = resources {
            for entry in resources {
                let address_raw = entry
                    .get("address")
                    .and_then(Json::as_str)
                    .ok_or_else(|| anyhow!("state resource missing address"))?;
                let underlying_type = entry
                    .get("resource_type")
                    .and_then(Json::as_str)
                    .unwrap_or_default()
                    .to_string();
                let attrs = entry.get("attributes").cloned().unwrap_or(Json::Null);
                let marks = marks_from(address_raw, None, entry.get("sensitive"));
                let attributes = decode_value(&attrs, address_raw, &marks);
                state.resources.insert(
                    ResourceAddress::new(address_raw),
                    ResourceState { underlying_type, attributes },
                );
            }
        }
        if let Some(outputs) = message.get("outputs").and_then(Json::as_object) {
            for (name, entry) in outputs {
                let value = entry.get("value").cloned().unwrap_or(Json::Null);
                let sensitive = entry.get("sensitive").and_then(Json::as_bool).unwrap_or(false);
                let decoded = decode_value(&value, name, &AttributeMarks::default());
                let decoded = if sensitive {
                    crate::model::PropertyValue::Secret(Box::new(decoded))
                } else {
                    decoded
                };
                state.outputs.insert(name.clone(), decoded);
            }
        }
    }
    Ok(state)
}
