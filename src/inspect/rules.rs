//! Authorization rules: role -> allowed operation kinds and field-path
//! patterns, loaded once at startup and immutable for the process lifetime.
//!
//! Patterns are dotted paths where `*` matches exactly one segment and a
//! trailing `**` matches any remainder (including none). A field tagged with
//! `workspace_arg` is workspace-scoped: the named argument must carry a
//! workspace id inside the caller's scope.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::identity::Role;
use super::document::OperationKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRule {
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_arg: Option<String>,
}

impl FieldRule {
    fn new(pattern: &str) -> Self {
        Self { pattern: pattern.to_string(), workspace_arg: None }
    }

    fn workspace_scoped(pattern: &str, arg: &str) -> Self {
        Self { pattern: pattern.to_string(), workspace_arg: Some(arg.to_string()) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolePolicy {
    pub operations: Vec<OperationKind>,
    pub allow: Vec<FieldRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    /// Subscriptions are disabled globally unless explicitly enabled.
    #[serde(default)]
    pub allow_subscriptions: bool,
    pub roles: HashMap<Role, RolePolicy>,
}

/// Match a dotted pattern against a dotted path.
pub fn pattern_matches(pattern: &str, path: &str) -> bool {
    let mut pat = pattern.split('.').peekable();
    let mut segs = path.split('.');
    loop {
        match pat.next() {
            Some("**") => return true,
            Some(p) => match segs.next() {
                Some(s) if p == "*" || p == s => continue,
                _ => return false,
            },
            None => return segs.next().is_none(),
        }
    }
}

impl RuleSet {
    pub fn operation_allowed(&self, role: Role, kind: OperationKind) -> bool {
        if kind == OperationKind::Subscription && !self.allow_subscriptions {
            return false;
        }
        self.roles
            .get(&role)
            .map(|p| p.operations.contains(&kind))
            .unwrap_or(false)
    }

    pub fn field_allowed(&self, role: Role, path: &str) -> bool {
        self.roles
            .get(&role)
            .map(|p| p.allow.iter().any(|r| pattern_matches(&r.pattern, path)))
            .unwrap_or(false)
    }

    /// The workspace argument name for a scoped field, if any matching allow
    /// rule tags it. The first declared workspace rule wins.
    pub fn workspace_arg(&self, role: Role, path: &str) -> Option<&str> {
        let policy = self.roles.get(&role)?;
        policy
            .allow
            .iter()
            .find(|r| r.workspace_arg.is_some() && pattern_matches(&r.pattern, path))
            .and_then(|r| r.workspace_arg.as_deref())
    }

    /// Load from a JSON policy file, or fall back to the built-in default.
    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => {
                let raw = std::fs::read_to_string(Path::new(p))
                    .with_context(|| format!("Failed to read policy file: {}", p))?;
                let rules: RuleSet = serde_json::from_str(&raw)
                    .with_context(|| format!("Failed to parse policy file: {}", p))?;
                Ok(rules)
            }
            None => Ok(Self::default_policy()),
        }
    }

    /// Built-in policy for the orchestration API this gateway fronts.
    /// Entities the proxy refuses to touch (cloud hooks, messages, artifacts)
    /// simply have no allow rule.
    pub fn default_policy() -> Self {
        let read_fields = || -> Vec<FieldRule> {
            vec![
                FieldRule::workspace_scoped("workspace", "id"),
                FieldRule::new("workspace.**"),
                FieldRule::new("flow.**"),
                FieldRule::new("flow_run.**"),
                FieldRule::new("flow_group.**"),
                FieldRule::new("task.**"),
                FieldRule::new("task_run.**"),
                FieldRule::new("project.**"),
                FieldRule::new("agent.**"),
                FieldRule::new("log.**"),
                // Public, unscoped surface
                FieldRule::new("hello"),
                FieldRule::new("api"),
                FieldRule::new("reference_data.**"),
                FieldRule::new("__schema.**"),
            ]
        };

        let write_fields = vec![
            FieldRule::new("create_flow_run.**"),
            FieldRule::new("delete_flow_run.**"),
            FieldRule::new("set_flow_run_state.**"),
            FieldRule::new("set_task_run_state.**"),
            FieldRule::new("write_run_logs.**"),
            FieldRule::new("register_flow.**"),
            FieldRule::new("archive_flow.**"),
            FieldRule::new("cancel_flow_run.**"),
        ];

        let mut roles = HashMap::new();
        roles.insert(
            Role::Admin,
            RolePolicy {
                operations: vec![OperationKind::Query, OperationKind::Mutation, OperationKind::Subscription],
                allow: vec![FieldRule::new("**")],
            },
        );
        let mut operator_allow = read_fields();
        operator_allow.extend(write_fields);
        roles.insert(
            Role::Operator,
            RolePolicy {
                operations: vec![OperationKind::Query, OperationKind::Mutation],
                allow: operator_allow,
            },
        );
        roles.insert(
            Role::ReadOnly,
            RolePolicy {
                operations: vec![OperationKind::Query],
                allow: read_fields(),
            },
        );
        RuleSet { allow_subscriptions: false, roles }
    }
}
