//! GraphQL inspection: parse the client's document, classify every operation
//! and field path against the caller's authorization context, and reject,
//! pass through, or rewrite (workspace argument injection).
//!
//! Evaluation is short-circuit-free: every violation in the document is
//! collected and reported, sorted by message, so clients can see the full
//! set of scope problems at once.

mod document;
mod rules;
mod rewrite;

pub use document::{
    extract_operations, variables_from_value, ArgValue, FieldSelection, OperationInfo,
    OperationKind, Variables,
};
pub use rules::{pattern_matches, FieldRule, RolePolicy, RuleSet};
pub use rewrite::{enforce_workspace_scope, ScopeOutcome};

use graphql_parser::query::parse_query;
use thiserror::Error;

use crate::identity::AuthContext;

#[derive(Debug, Error)]
pub enum InspectionFailure {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("invalid document: {0}")]
    InvalidDocument(String),
    #[error("forbidden: {}", .violations.join("; "))]
    Forbidden { violations: Vec<String> },
}

/// An operation cleared for forwarding. `document` is the original text when
/// nothing was injected, or the re-serialized rewritten document.
#[derive(Debug)]
pub struct ApprovedDocument {
    pub document: String,
    pub variables: Variables,
    pub rewritten: bool,
    pub has_mutation: bool,
    pub operations: Vec<OperationInfo>,
}

pub fn inspect(
    query: &str,
    variables: Variables,
    ctx: &AuthContext,
    rules: &RuleSet,
) -> Result<ApprovedDocument, InspectionFailure> {
    let mut doc =
        parse_query::<String>(query).map_err(|e| InspectionFailure::Parse(e.to_string()))?;
    let operations = extract_operations(&doc).map_err(InspectionFailure::InvalidDocument)?;
    if operations.is_empty() {
        return Err(InspectionFailure::InvalidDocument(
            "document contains no operations".to_string(),
        ));
    }

    let mut violations: Vec<String> = Vec::new();
    for op in &operations {
        // Role-level gate: operation kinds the role may never reach,
        // regardless of field-level rules.
        if !rules.operation_allowed(ctx.role, op.kind) {
            violations.push(format!(
                "operation {} not allowed for role {}",
                op.kind, ctx.role
            ));
        }
        for field in &op.fields {
            if !rules.field_allowed(ctx.role, &field.path) {
                violations.push(format!(
                    "field {} not allowed for role {}",
                    field.path, ctx.role
                ));
            }
        }
    }

    let scope = enforce_workspace_scope(&mut doc, &variables, ctx, rules)
        .map_err(InspectionFailure::InvalidDocument)?;
    violations.extend(scope.violations);

    if !violations.is_empty() {
        violations.sort();
        violations.dedup();
        return Err(InspectionFailure::Forbidden { violations });
    }

    let document = if scope.rewritten { doc.to_string() } else { query.to_string() };
    let has_mutation = operations.iter().any(|o| o.kind == OperationKind::Mutation);
    Ok(ApprovedDocument {
        document,
        variables,
        rewritten: scope.rewritten,
        has_mutation,
        operations,
    })
}
