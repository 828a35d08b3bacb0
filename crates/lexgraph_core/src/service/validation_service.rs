//! Reference integrity scan ahead of cross-graph writes.
//!
//! # Responsibility
//! - Check every reference a copy would carry resolves in the target.
//! - Report what a copy policy will drop and which properties will be skipped.
//!
//! # Invariants
//! - Read-only over both graphs.
//! - Visit order is deterministic: roots in input order, properties in name
//!   order, owned children in stored order.
//! - Findings are never truncated or deduplicated.

use crate::model::node::NodeId;
use crate::repo::capability::{ExistenceCheckable, Findable};
use crate::schema::classifier::Schema;
use crate::service::duplicate_service::CopyPolicy;
use log::{debug, warn};
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Finding severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Blocks writes unless explicitly overridden.
    Critical,
    /// Informational; never blocks.
    Warning,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Warning => "warning",
        }
    }
}

/// What a finding is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindingKind {
    /// Reference target is not live in the target graph.
    UnresolvedReference { missing: NodeId },
    /// Owned property excluded by policy still holds children.
    DroppedOwnedContent { child_count: usize },
    /// Property is undeclared or unclassifiable and will be skipped.
    UnclassifiedProperty { reason: String },
    /// Owned child id does not resolve in the source graph.
    MissingOwnedChild { child: NodeId },
    /// Requested root is not live in the source graph.
    MissingSourceNode,
}

impl FindingKind {
    pub fn severity(&self) -> Severity {
        match self {
            Self::UnresolvedReference { .. } => Severity::Critical,
            _ => Severity::Warning,
        }
    }

    /// Machine-oriented detail value, if the finding carries one.
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::UnresolvedReference { missing } => Some(missing.to_string()),
            Self::DroppedOwnedContent { child_count } => Some(child_count.to_string()),
            Self::UnclassifiedProperty { reason } => Some(reason.clone()),
            Self::MissingOwnedChild { child } => Some(child.to_string()),
            Self::MissingSourceNode => None,
        }
    }
}

impl Display for FindingKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnresolvedReference { missing } => {
                write!(f, "reference target {missing} does not exist in target graph")
            }
            Self::DroppedOwnedContent { child_count } => {
                write!(f, "{child_count} owned node(s) will not be copied")
            }
            Self::UnclassifiedProperty { reason } => {
                write!(f, "property will be skipped: {reason}")
            }
            Self::MissingOwnedChild { child } => {
                write!(f, "owned child {child} does not exist in source graph")
            }
            Self::MissingSourceNode => write!(f, "node does not exist in source graph"),
        }
    }
}

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub severity: Severity,
    pub node_id: NodeId,
    /// Class of the node; empty when the node is missing.
    pub class: String,
    pub property: Option<String>,
    pub kind: FindingKind,
}

/// Flat renderable form of one finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationRecord {
    pub severity: Severity,
    pub node_id: NodeId,
    pub property: Option<String>,
    pub message: String,
    pub detail: Option<String>,
}

/// Ordered findings of one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    findings: Vec<Finding>,
    visited: usize,
}

impl ValidationReport {
    pub fn has_critical(&self) -> bool {
        self.findings
            .iter()
            .any(|finding| finding.severity == Severity::Critical)
    }

    /// All findings in visit order.
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn criticals(&self) -> Vec<&Finding> {
        self.of_severity(Severity::Critical)
    }

    pub fn warnings(&self) -> Vec<&Finding> {
        self.of_severity(Severity::Warning)
    }

    /// Number of source nodes the scan visited.
    pub fn visited(&self) -> usize {
        self.visited
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    /// Flat record list in visit order.
    pub fn records(&self) -> Vec<ValidationRecord> {
        self.findings
            .iter()
            .map(|finding| ValidationRecord {
                severity: finding.severity,
                node_id: finding.node_id,
                property: finding.property.clone(),
                message: finding.kind.to_string(),
                detail: finding.kind.detail(),
            })
            .collect()
    }

    fn of_severity(&self, severity: Severity) -> Vec<&Finding> {
        self.findings
            .iter()
            .filter(|finding| finding.severity == severity)
            .collect()
    }

    fn push(&mut self, node_id: NodeId, class: &str, property: Option<&str>, kind: FindingKind) {
        self.findings.push(Finding {
            severity: kind.severity(),
            node_id,
            class: class.to_string(),
            property: property.map(str::to_string),
            kind,
        });
    }
}

/// Read-only reference checker.
#[derive(Debug, Clone)]
pub struct ReferenceValidator {
    schema: Arc<Schema>,
    policy: CopyPolicy,
}

impl ReferenceValidator {
    pub fn new(schema: Arc<Schema>, policy: CopyPolicy) -> Self {
        Self { schema, policy }
    }

    /// Scans `roots` and the owned descendants the policy carries over.
    pub fn validate<S, T>(&self, source: &S, roots: &[NodeId], target: &T) -> ValidationReport
    where
        S: Findable + ?Sized,
        T: ExistenceCheckable + ?Sized,
    {
        let mut report = ValidationReport::default();

        for root in roots {
            let Some(root_node) = source.find(*root) else {
                report.push(*root, "", None, FindingKind::MissingSourceNode);
                continue;
            };

            let mut stack = vec![root_node];
            while let Some(node) = stack.pop() {
                report.visited += 1;
                let mut children = Vec::new();

                for (property, value) in &node.properties {
                    let kind = match self.schema.classify(&node.class, property) {
                        Ok(kind) => kind,
                        Err(err) => {
                            report.push(
                                node.id,
                                &node.class,
                                Some(property.as_str()),
                                FindingKind::UnclassifiedProperty {
                                    reason: err.to_string(),
                                },
                            );
                            continue;
                        }
                    };
                    let excluded = self.policy.excludes(&node.class, property);

                    if kind.is_reference() && !excluded {
                        for missing in value
                            .reference_targets()
                            .iter()
                            .filter(|id| !target.exists(**id))
                        {
                            report.push(
                                node.id,
                                &node.class,
                                Some(property.as_str()),
                                FindingKind::UnresolvedReference { missing: *missing },
                            );
                        }
                    } else if kind.is_owning() {
                        let owned = value.owned_children();
                        if excluded {
                            if !owned.is_empty() {
                                report.push(
                                    node.id,
                                    &node.class,
                                    Some(property.as_str()),
                                    FindingKind::DroppedOwnedContent {
                                        child_count: owned.len(),
                                    },
                                );
                            }
                            continue;
                        }
                        for child in owned {
                            match source.find(*child) {
                                Some(child_node) => children.push(child_node),
                                None => report.push(
                                    node.id,
                                    &node.class,
                                    Some(property.as_str()),
                                    FindingKind::MissingOwnedChild { child: *child },
                                ),
                            }
                        }
                    }
                }

                stack.extend(children.into_iter().rev());
            }
        }

        let criticals = report.criticals().len();
        if criticals > 0 {
            warn!(
                "event=reference_validate module=service status=blocked roots={} visited={} critical={} warnings={}",
                roots.len(),
                report.visited,
                criticals,
                report.findings.len() - criticals
            );
        } else {
            debug!(
                "event=reference_validate module=service status=ok roots={} visited={} warnings={}",
                roots.len(),
                report.visited,
                report.findings.len()
            );
        }
        report
    }
}
