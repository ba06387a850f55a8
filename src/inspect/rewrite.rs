//! Workspace scope enforcement over the mutable AST.
//!
//! Scoped rules apply to top-level fields of operations (and of fragment
//! definitions, which can be spread at top level) — the level where the
//! orchestration API takes its entity arguments. A present argument is
//! checked against the caller's scope; an absent one is injected when the
//! scope is unambiguous, otherwise rejected.

use graphql_parser::query::{Definition, Document, Field, OperationDefinition, Selection, Value};

use crate::identity::AuthContext;
use super::document::Variables;
use super::rules::RuleSet;

#[derive(Debug, Default)]
pub struct ScopeOutcome {
    pub rewritten: bool,
    pub violations: Vec<String>,
}

/// Enforce workspace scoping in place. `Err` means the document is invalid
/// with respect to its own variables (never forwarded); scope violations are
/// collected in the outcome instead so all of them can be reported.
pub fn enforce_workspace_scope(
    doc: &mut Document<'_, String>,
    variables: &Variables,
    ctx: &AuthContext,
    rules: &RuleSet,
) -> Result<ScopeOutcome, String> {
    let mut outcome = ScopeOutcome::default();
    for def in doc.definitions.iter_mut() {
        let set = match def {
            Definition::Operation(OperationDefinition::SelectionSet(s)) => s,
            Definition::Operation(OperationDefinition::Query(q)) => &mut q.selection_set,
            Definition::Operation(OperationDefinition::Mutation(m)) => &mut m.selection_set,
            Definition::Operation(OperationDefinition::Subscription(s)) => &mut s.selection_set,
            Definition::Fragment(f) => &mut f.selection_set,
        };
        for item in set.items.iter_mut() {
            if let Selection::Field(field) = item {
                enforce_field(field, variables, ctx, rules, &mut outcome)?;
            }
        }
    }
    Ok(outcome)
}

fn enforce_field(
    field: &mut Field<'_, String>,
    variables: &Variables,
    ctx: &AuthContext,
    rules: &RuleSet,
    outcome: &mut ScopeOutcome,
) -> Result<(), String> {
    let Some(arg_name) = rules.workspace_arg(ctx.role, &field.name) else {
        return Ok(());
    };
    let arg_name = arg_name.to_string();

    let present = field.arguments.iter().position(|(name, _)| name == &arg_name);
    let Some(idx) = present else {
        return match ctx.single_workspace() {
            Some(ws) => {
                field.arguments.push((arg_name, Value::String(ws.to_string())));
                outcome.rewritten = true;
                Ok(())
            }
            None => {
                outcome
                    .violations
                    .push(format!("ambiguous workspace scope on {}", field.name));
                Ok(())
            }
        };
    };

    match &field.arguments[idx].1 {
        Value::String(ws) => {
            if !ctx.in_scope(ws) {
                outcome.violations.push(format!(
                    "workspace scope mismatch on {} ({}=\"{}\")",
                    field.name, arg_name, ws
                ));
            }
        }
        Value::Variable(var) => match variables.get(var.as_str()) {
            Some(serde_json::Value::String(ws)) => {
                if !ctx.in_scope(ws) {
                    outcome.violations.push(format!(
                        "workspace scope mismatch on {} ({}=${})",
                        field.name, arg_name, var
                    ));
                }
            }
            Some(_) => {
                return Err(format!(
                    "workspace argument '{}' on {} must be a string",
                    arg_name, field.name
                ));
            }
            None => {
                return Err(format!(
                    "variable '${}' for workspace argument '{}' on {} is not provided",
                    var, arg_name, field.name
                ));
            }
        },
        _ => {
            return Err(format!(
                "workspace argument '{}' on {} must be a string",
                arg_name, field.name
            ));
        }
    }
    Ok(())
}
