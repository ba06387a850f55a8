//! Parsed operation model: operation kind plus an ordered sequence of
//! field-path/argument pairs, extracted from the GraphQL AST with fragment
//! spreads resolved. Rule matching downstream works over this flat form.

use std::collections::{BTreeMap, HashSet};
use std::fmt::{Display, Formatter};

use graphql_parser::query::{
    Definition, Document, FragmentDefinition, OperationDefinition, Selection, SelectionSet, Value,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Query => write!(f, "query"),
            OperationKind::Mutation => write!(f, "mutation"),
            OperationKind::Subscription => write!(f, "subscription"),
        }
    }
}

/// An argument value as seen by the inspector: a literal converted to JSON,
/// or a reference to a request variable.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Literal(serde_json::Value),
    Variable(String),
}

/// One selected field, named by its dotted path from the operation root.
/// Paths use the field's real name, never its alias, so aliasing cannot
/// route around authorization.
#[derive(Debug, Clone)]
pub struct FieldSelection {
    pub path: String,
    pub arguments: Vec<(String, ArgValue)>,
}

#[derive(Debug, Clone)]
pub struct OperationInfo {
    pub kind: OperationKind,
    pub name: Option<String>,
    pub fields: Vec<FieldSelection>,
}

fn to_arg_value(value: &Value<'_, String>) -> ArgValue {
    match value {
        Value::Variable(name) => ArgValue::Variable(name.clone()),
        other => ArgValue::Literal(literal_to_json(other)),
    }
}

fn literal_to_json(value: &Value<'_, String>) -> serde_json::Value {
    match value {
        Value::Variable(name) => serde_json::Value::String(format!("${}", name)),
        Value::Int(n) => n.as_i64().map(serde_json::Value::from).unwrap_or(serde_json::Value::Null),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Null => serde_json::Value::Null,
        Value::Enum(e) => serde_json::Value::String(e.clone()),
        Value::List(items) => serde_json::Value::Array(items.iter().map(literal_to_json).collect()),
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map.iter() {
                out.insert(k.clone(), literal_to_json(v));
            }
            serde_json::Value::Object(out)
        }
    }
}

fn walk_selection_set(
    set: &SelectionSet<'_, String>,
    prefix: &str,
    fragments: &BTreeMap<String, &FragmentDefinition<'_, String>>,
    in_flight: &mut HashSet<String>,
    out: &mut Vec<FieldSelection>,
) -> Result<(), String> {
    for item in &set.items {
        match item {
            Selection::Field(field) => {
                let path = if prefix.is_empty() {
                    field.name.clone()
                } else {
                    format!("{}.{}", prefix, field.name)
                };
                out.push(FieldSelection {
                    path: path.clone(),
                    arguments: field
                        .arguments
                        .iter()
                        .map(|(name, value)| (name.clone(), to_arg_value(value)))
                        .collect(),
                });
                walk_selection_set(&field.selection_set, &path, fragments, in_flight, out)?;
            }
            Selection::FragmentSpread(spread) => {
                let Some(frag) = fragments.get(spread.fragment_name.as_str()) else {
                    return Err(format!("unknown fragment '{}'", spread.fragment_name));
                };
                if !in_flight.insert(spread.fragment_name.clone()) {
                    return Err(format!("fragment cycle through '{}'", spread.fragment_name));
                }
                walk_selection_set(&frag.selection_set, prefix, fragments, in_flight, out)?;
                in_flight.remove(spread.fragment_name.as_str());
            }
            Selection::InlineFragment(inline) => {
                walk_selection_set(&inline.selection_set, prefix, fragments, in_flight, out)?;
            }
        }
    }
    Ok(())
}

/// Flatten every operation in the document. Fragment problems (unknown name,
/// cycle) are document-validity errors, reported as `Err(reason)`.
pub fn extract_operations(doc: &Document<'_, String>) -> Result<Vec<OperationInfo>, String> {
    let mut fragments: BTreeMap<String, &FragmentDefinition<'_, String>> = BTreeMap::new();
    for def in &doc.definitions {
        if let Definition::Fragment(frag) = def {
            fragments.insert(frag.name.clone(), frag);
        }
    }

    let mut ops = Vec::new();
    for def in &doc.definitions {
        let Definition::Operation(op) = def else { continue };
        let (kind, name, selection_set) = match op {
            OperationDefinition::SelectionSet(set) => (OperationKind::Query, None, set),
            OperationDefinition::Query(q) => (OperationKind::Query, q.name.clone(), &q.selection_set),
            OperationDefinition::Mutation(m) => (OperationKind::Mutation, m.name.clone(), &m.selection_set),
            OperationDefinition::Subscription(s) => {
                (OperationKind::Subscription, s.name.clone(), &s.selection_set)
            }
        };
        let mut fields = Vec::new();
        let mut in_flight = HashSet::new();
        walk_selection_set(selection_set, "", &fragments, &mut in_flight, &mut fields)?;
        ops.push(OperationInfo { kind, name, fields });
    }
    Ok(ops)
}

/// Per-request variable map type alias used across the inspector.
pub type Variables = serde_json::Map<String, serde_json::Value>;

pub fn variables_from_value(value: Option<serde_json::Value>) -> Result<Variables, String> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(Variables::new()),
        Some(serde_json::Value::Object(map)) => Ok(map),
        Some(other) => Err(format!("variables must be an object, got {}", json_kind(&other))),
    }
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
