//! One-way selective import between two graphs.
//!
//! # Responsibility
//! - Select source nodes of one class through a filter.
//! - Gate writes on the reference scan, then duplicate or report.
//!
//! # Invariants
//! - The source graph is only borrowed immutably.
//! - Additive only: existing target nodes are never overwritten or deleted.
//! - No identity matching across graphs; re-running creates new copies.
//! - A Critical finding blocks every write unless `allow_critical` is set.
//!
//! # See also
//! - `service::duplicate_service`
//! - `service::validation_service`

use crate::model::node::{Node, NodeId};
use crate::repo::graph_repo::{Destination, GraphStore};
use crate::schema::classifier::SchemaError;
use crate::service::duplicate_service::{
    CopyPolicy, DuplicateError, DuplicateReport, DuplicationEngine,
};
use crate::service::validation_service::{Finding, ReferenceValidator, ValidationReport};
use log::{error, info, warn};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

/// Source node selection.
pub enum ImportFilter {
    All,
    /// `created_at` strictly after the epoch ms bound.
    CreatedAfter(i64),
    /// `updated_at` strictly after the epoch ms bound.
    ModifiedAfter(i64),
    Ids(BTreeSet<NodeId>),
    Matching(Box<dyn Fn(&Node) -> bool>),
}

impl ImportFilter {
    /// Wraps a predicate filter.
    pub fn matching<F>(predicate: F) -> Self
    where
        F: Fn(&Node) -> bool + 'static,
    {
        Self::Matching(Box::new(predicate))
    }

    pub fn matches(&self, node: &Node) -> bool {
        match self {
            Self::All => true,
            Self::CreatedAfter(bound) => node.created_at > *bound,
            Self::ModifiedAfter(bound) => node.updated_at > *bound,
            Self::Ids(ids) => ids.contains(&node.id),
            Self::Matching(predicate) => predicate(node),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::CreatedAfter(_) => "created_after",
            Self::ModifiedAfter(_) => "modified_after",
            Self::Ids(_) => "ids",
            Self::Matching(_) => "matching",
        }
    }
}

impl Debug for ImportFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str("All"),
            Self::CreatedAfter(bound) => f.debug_tuple("CreatedAfter").field(bound).finish(),
            Self::ModifiedAfter(bound) => f.debug_tuple("ModifiedAfter").field(bound).finish(),
            Self::Ids(ids) => f.debug_tuple("Ids").field(ids).finish(),
            Self::Matching(_) => f.write_str("Matching(<predicate>)"),
        }
    }
}

/// Import parameters.
#[derive(Debug)]
pub struct ImportRequest {
    /// Class of the source nodes to import.
    pub class: String,
    pub filter: ImportFilter,
    /// Run the reference scan before writing.
    pub validate_references: bool,
    /// Report what would be created without writing.
    pub dry_run: bool,
    pub policy: CopyPolicy,
    /// Where each imported node is attached in the target.
    pub destination: Destination,
    /// Write even when Critical findings exist.
    pub allow_critical: bool,
}

impl ImportRequest {
    /// Validated, deep, non-dry-run import of every node of `class` as roots.
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            filter: ImportFilter::All,
            validate_references: true,
            dry_run: false,
            policy: CopyPolicy::deep(),
            destination: Destination::Root,
            allow_critical: false,
        }
    }

    pub fn with_filter(mut self, filter: ImportFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_validation(mut self, validate_references: bool) -> Self {
        self.validate_references = validate_references;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_policy(mut self, policy: CopyPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_allow_critical(mut self, allow_critical: bool) -> Self {
        self.allow_critical = allow_critical;
        self
    }
}

/// Import state machine states, recorded in traversal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportState {
    Selecting,
    Validating,
    /// Terminal: Critical findings and no override.
    Blocked,
    Ready,
    /// Dry runs plan instead of writing.
    Reporting,
    Writing,
    Done,
}

impl ImportState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Selecting => "selecting",
            Self::Validating => "validating",
            Self::Blocked => "blocked",
            Self::Ready => "ready",
            Self::Reporting => "reporting",
            Self::Writing => "writing",
            Self::Done => "done",
        }
    }
}

/// Result for one selected source node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeImportOutcome {
    Created(DuplicateReport),
    Failed(DuplicateError),
    /// Dry run: nodes a write would create.
    Planned { node_count: usize },
    /// Not attempted after an earlier allocation failure.
    Skipped,
}

/// One selected node and its outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeImport {
    pub source: NodeId,
    pub outcome: NodeImportOutcome,
}

/// Aggregate counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportCounts {
    pub selected: usize,
    /// Selected nodes copied in full.
    pub created_roots: usize,
    /// Every node written, including those of interrupted copies.
    pub created_nodes: usize,
    pub planned_nodes: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Full import outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportResult {
    pub trace: Vec<ImportState>,
    pub selected: Vec<NodeId>,
    /// Present when the reference scan ran.
    pub report: Option<ValidationReport>,
    pub outcomes: Vec<NodeImport>,
    pub counts: ImportCounts,
}

impl ImportResult {
    pub fn final_state(&self) -> ImportState {
        self.trace.last().copied().unwrap_or(ImportState::Selecting)
    }

    pub fn is_blocked(&self) -> bool {
        self.final_state() == ImportState::Blocked
    }

    /// Critical findings of the reference scan, verbatim.
    pub fn criticals(&self) -> Vec<&Finding> {
        self.report
            .as_ref()
            .map(ValidationReport::criticals)
            .unwrap_or_default()
    }
}

/// Errors that prevent an import from starting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    /// Requested class is not declared in the target schema.
    Schema(SchemaError),
    /// Destination parent is not live in the target graph.
    DestinationNotFound(NodeId),
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Schema(err) => write!(f, "{err}"),
            Self::DestinationNotFound(id) => write!(f, "import destination not found: {id}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Schema(err) => Some(err),
            Self::DestinationNotFound(_) => None,
        }
    }
}

impl From<SchemaError> for ImportError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

/// Import facade over one read-only source graph.
pub struct ImportService<'s, S: GraphStore> {
    source: &'s S,
}

impl<'s, S: GraphStore> ImportService<'s, S> {
    pub fn new(source: &'s S) -> Self {
        Self { source }
    }

    /// Runs select, validate, then dry-run report or write.
    ///
    /// # Errors
    /// - `Schema(UnknownClass)` when the class is unknown to the target.
    /// - `DestinationNotFound` when the destination parent is not live.
    pub fn import_filtered<T: GraphStore>(
        &self,
        target: &mut T,
        request: &ImportRequest,
    ) -> Result<ImportResult, ImportError> {
        target.schema().class(&request.class)?;
        if let Destination::OwnedAtom { parent, .. } | Destination::Append { parent, .. } =
            &request.destination
        {
            if !target.exists(*parent) {
                return Err(ImportError::DestinationNotFound(*parent));
            }
        }

        info!(
            "event=import_start module=service status=start class={} filter={} dry_run={} validate={}",
            request.class,
            request.filter.label(),
            request.dry_run,
            request.validate_references
        );

        let mut result = ImportResult {
            trace: vec![ImportState::Selecting],
            selected: self.select(request),
            report: None,
            outcomes: Vec::new(),
            counts: ImportCounts::default(),
        };
        result.counts.selected = result.selected.len();

        if request.validate_references {
            result.trace.push(ImportState::Validating);
            let validator =
                ReferenceValidator::new(std::sync::Arc::clone(target.schema()), request.policy.clone());
            let report = validator.validate(self.source, &result.selected, &*target);
            let blocked = report.has_critical() && !request.allow_critical;
            let critical = report.criticals().len();
            result.report = Some(report);

            if blocked {
                result.trace.push(ImportState::Blocked);
                warn!(
                    "event=import_blocked module=service status=blocked class={} selected={} critical={}",
                    request.class, result.counts.selected, critical
                );
                return Ok(result);
            }
            if critical > 0 {
                warn!(
                    "event=import_override module=service status=ok class={} critical={}",
                    request.class, critical
                );
            }
        }
        result.trace.push(ImportState::Ready);

        let engine = DuplicationEngine::new(request.policy.clone());
        if request.dry_run {
            result.trace.push(ImportState::Reporting);
            self.plan(&engine, &mut result);
            result.trace.push(ImportState::Done);
            info!(
                "event=import_done module=service status=ok class={} dry_run=true selected={} planned_nodes={}",
                request.class, result.counts.selected, result.counts.planned_nodes
            );
            return Ok(result);
        }

        result.trace.push(ImportState::Writing);
        self.write(&engine, target, &request.destination, &mut result);
        result.trace.push(ImportState::Done);
        info!(
            "event=import_done module=service status=ok class={} dry_run=false selected={} created_roots={} created_nodes={} failed={} skipped={}",
            request.class,
            result.counts.selected,
            result.counts.created_roots,
            result.counts.created_nodes,
            result.counts.failed,
            result.counts.skipped
        );
        Ok(result)
    }

    fn select(&self, request: &ImportRequest) -> Vec<NodeId> {
        // `nodes_of_class` is already ordered by (created_at, id).
        self.source
            .nodes_of_class(&request.class)
            .into_iter()
            .filter(|node| request.filter.matches(node))
            .map(|node| node.id)
            .collect()
    }

    fn plan(&self, engine: &DuplicationEngine, result: &mut ImportResult) {
        for source in &result.selected {
            let outcome = match engine.plan(self.source, *source) {
                Ok(node_count) => {
                    result.counts.planned_nodes += node_count;
                    NodeImportOutcome::Planned { node_count }
                }
                Err(err) => {
                    result.counts.failed += 1;
                    NodeImportOutcome::Failed(err)
                }
            };
            result.outcomes.push(NodeImport {
                source: *source,
                outcome,
            });
        }
    }

    fn write<T: GraphStore>(
        &self,
        engine: &DuplicationEngine,
        target: &mut T,
        destination: &Destination,
        result: &mut ImportResult,
    ) {
        let mut aborted = false;
        for source in &result.selected {
            let outcome = if aborted {
                result.counts.skipped += 1;
                NodeImportOutcome::Skipped
            } else {
                match engine.duplicate(self.source, *source, target, destination) {
                    Ok(report) => {
                        result.counts.created_roots += 1;
                        result.counts.created_nodes += report.created_count();
                        NodeImportOutcome::Created(report)
                    }
                    Err(err) => {
                        result.counts.failed += 1;
                        result.counts.created_nodes += err.created().len();
                        if err.is_allocation() {
                            error!(
                                "event=import_write module=service status=error source={} error_code=allocation created={} error={}",
                                source,
                                err.created().len(),
                                err
                            );
                            aborted = true;
                        } else {
                            warn!(
                                "event=import_write module=service status=error source={} error={}",
                                source, err
                            );
                        }
                        NodeImportOutcome::Failed(err)
                    }
                }
            };
            result.outcomes.push(NodeImport {
                source: *source,
                outcome,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ImportFilter, ImportRequest};
    use crate::repo::graph_repo::Destination;

    #[test]
    fn request_defaults_validate_and_write_deep_roots() {
        let request = ImportRequest::new("LexEntry");
        assert!(request.validate_references);
        assert!(!request.dry_run);
        assert!(!request.allow_critical);
        assert!(request.policy.is_deep());
        assert_eq!(request.destination, Destination::Root);
        assert!(matches!(request.filter, ImportFilter::All));
    }

    #[test]
    fn predicate_filter_debug_hides_closure() {
        let filter = ImportFilter::matching(|node| node.class == "LexEntry");
        assert_eq!(format!("{filter:?}"), "Matching(<predicate>)");
    }
}
