use serde_json::Value;

use crate::data::{
    node::{ConfigNode, NodeKind, NodeValue},
    snapshot::Envelope,
};

/// Apply a backend snapshot onto a forest in place.
///
/// Only fields present in the snapshot are touched. Choice groups are resolved
/// after their children: the option reported as selected names the group's
/// value and every other option is forced to `false`. If several options are
/// reported as selected, the last one wins.
///
/// Returns `false` without touching anything when the snapshot has no values.
pub fn merge(nodes: &mut [ConfigNode], envelope: &Envelope) -> bool {
    if envelope.is_empty() {
        return false;
    }
    for node in nodes.iter_mut() {
        merge_node(node, envelope);
    }
    true
}

fn merge_node(node: &mut ConfigNode, envelope: &Envelope) {
    if node.kind != NodeKind::Choice
        && let Some(raw) = envelope.values.get(&node.name)
    {
        match NodeValue::from_json(node.kind, raw, &node.name) {
            Ok(value) => node.value = value,
            Err(e) => warn!("ignoring value for `{}`: {e}", node.id),
        }
    }
    if let Some(visible) = envelope.visible.get(&node.id) {
        node.visible = *visible;
    }
    if let Some(range) = envelope.ranges.get(&node.name) {
        node.range = Some(*range);
    }

    for child in node.children.iter_mut() {
        merge_node(child, envelope);
    }

    if node.kind == NodeKind::Choice {
        resolve_choice(node, envelope);
    }
}

fn resolve_choice(choice: &mut ConfigNode, envelope: &Envelope) {
    let selected = choice
        .children
        .iter()
        .rposition(|child| envelope.values.get(&child.name).is_some_and(is_truthy));
    let Some(selected) = selected else {
        return;
    };

    choice.value = NodeValue::Str(choice.children[selected].name.clone());
    for (idx, child) in choice.children.iter_mut().enumerate() {
        if idx != selected {
            child.value = NodeValue::Bool(false);
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Null => false,
        Value::Array(_) | Value::Object(_) => true,
    }
}
