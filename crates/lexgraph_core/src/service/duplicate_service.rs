//! Deep duplication of owned subtrees.
//!
//! # Responsibility
//! - Clone a node and its owned descendants into a destination store.
//! - Copy references shallowly: copies point at the original targets.
//!
//! # Invariants
//! - The source is read once into an owned snapshot and never mutated.
//! - Every new node is built through [`Sequencer`].
//! - Owned sequence order is preserved child for child.
//! - Allocation failure aborts the whole call without rollback and reports
//!   what was written; other failures are recorded per property and
//!   duplication continues.
//!
//! # See also
//! - `service::validation_service` for the pre-write reference scan.

use crate::lifecycle::{AttachedNode, Sequencer};
use crate::model::node::{Node, NodeId, PropertyValue};
use crate::model::text::FormattedText;
use crate::repo::capability::Findable;
use crate::repo::graph_repo::{Destination, GraphError, GraphResult, GraphStore};
use crate::schema::classifier::{Schema, SchemaError};
use crate::schema::kind::PropertyKind;
use log::{error, info};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Owned properties that are not carried into copies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyPolicy {
    /// Class name to excluded property names.
    excluded: BTreeMap<String, BTreeSet<String>>,
}

impl CopyPolicy {
    /// Copies everything.
    pub fn deep() -> Self {
        Self::default()
    }

    /// Excludes `class.property` from copies.
    pub fn exclude(mut self, class: &str, property: &str) -> Self {
        self.excluded
            .entry(class.to_string())
            .or_default()
            .insert(property.to_string());
        self
    }

    pub fn excludes(&self, class: &str, property: &str) -> bool {
        self.excluded
            .get(class)
            .is_some_and(|properties| properties.contains(property))
    }

    pub fn is_deep(&self) -> bool {
        self.excluded.is_empty()
    }
}

/// Why one property of one copied node was not carried over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyFailureReason {
    /// Property is undeclared or unclassifiable.
    Schema(SchemaError),
    /// Stored value shape disagrees with the declared kind.
    ShapeMismatch {
        expected: PropertyKind,
        found: &'static str,
    },
    /// Owned child id does not resolve in the source.
    MissingOwnedChild(NodeId),
    /// Target store rejected the write.
    Write(GraphError),
}

impl Display for PropertyFailureReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Schema(err) => write!(f, "{err}"),
            Self::ShapeMismatch { expected, found } => {
                write!(f, "stored {found} value does not match declared kind {expected}")
            }
            Self::MissingOwnedChild(child) => write!(f, "owned child not found: {child}"),
            Self::Write(err) => write!(f, "{err}"),
        }
    }
}

/// One property that was skipped while copying one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyFailure {
    pub source_node: NodeId,
    pub new_node: NodeId,
    pub property: String,
    pub reason: PropertyFailureReason,
}

/// Outcome of one successful duplicate call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateReport {
    /// Id of the copy of the requested node.
    pub root: NodeId,
    /// `(source, copy)` pairs in creation order.
    pub id_map: Vec<(NodeId, NodeId)>,
    pub failures: Vec<PropertyFailure>,
}

impl DuplicateReport {
    /// Copy id of one source node, if it was duplicated.
    pub fn copy_of(&self, source: NodeId) -> Option<NodeId> {
        self.id_map
            .iter()
            .find(|(original, _)| *original == source)
            .map(|(_, copy)| *copy)
    }

    /// Number of nodes created by this call.
    pub fn created_count(&self) -> usize {
        self.id_map.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Errors that abort a duplicate call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateError {
    /// Requested source node does not exist.
    SourceNotFound(NodeId),
    /// Store failure before any node was created.
    Graph(GraphError),
    /// Allocation failed after part of the subtree was written. The created
    /// nodes stay attached in the target.
    Interrupted {
        /// `(source, copy)` pairs written before the failure; the first pair
        /// is the copied root.
        id_map: Vec<(NodeId, NodeId)>,
        cause: GraphError,
    },
}

impl DuplicateError {
    pub fn is_allocation(&self) -> bool {
        match self {
            Self::Graph(err) | Self::Interrupted { cause: err, .. } => err.is_allocation(),
            Self::SourceNotFound(_) => false,
        }
    }

    /// Nodes left behind in the target by an interrupted duplicate.
    pub fn created(&self) -> &[(NodeId, NodeId)] {
        match self {
            Self::Interrupted { id_map, .. } => id_map,
            _ => &[],
        }
    }

    /// Copy of the requested root, when it was written before the failure.
    pub fn partial_root(&self) -> Option<NodeId> {
        self.created().first().map(|(_, copy)| *copy)
    }
}

impl Display for DuplicateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceNotFound(id) => write!(f, "source node not found: {id}"),
            Self::Graph(err) => write!(f, "{err}"),
            Self::Interrupted { id_map, cause } => {
                write!(f, "{cause} after {} nodes were created", id_map.len())
            }
        }
    }
}

impl Error for DuplicateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Graph(err) | Self::Interrupted { cause: err, .. } => Some(err),
            Self::SourceNotFound(_) => None,
        }
    }
}

impl From<GraphError> for DuplicateError {
    fn from(value: GraphError) -> Self {
        Self::Graph(value)
    }
}

/// Owned copy of the source subtree taken before any write.
struct Snapshot {
    nodes: HashMap<NodeId, Node>,
}

/// Recursive clone engine.
#[derive(Debug, Clone, Default)]
pub struct DuplicationEngine {
    policy: CopyPolicy,
}

impl DuplicationEngine {
    pub fn new(policy: CopyPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &CopyPolicy {
        &self.policy
    }

    /// Duplicates `source_id` from `source` into `target` at `destination`.
    ///
    /// # Errors
    /// - `SourceNotFound` when `source_id` is not live in `source`.
    /// - `Graph` when the copy root cannot be allocated or attached.
    /// - `Interrupted` when a descendant allocation fails; the error lists
    ///   the nodes already written.
    pub fn duplicate<S, D>(
        &self,
        source: &S,
        source_id: NodeId,
        target: &mut D,
        destination: &Destination,
    ) -> Result<DuplicateReport, DuplicateError>
    where
        S: Findable + ?Sized,
        D: GraphStore,
    {
        let snapshot = self.capture(source, source_id)?;
        self.write(&snapshot, source_id, target, destination)
    }

    /// Duplicates a node beside itself inside one store.
    pub fn duplicate_within<S: GraphStore>(
        &self,
        store: &mut S,
        source_id: NodeId,
        destination: &Destination,
    ) -> Result<DuplicateReport, DuplicateError> {
        let snapshot = self.capture(&*store, source_id)?;
        self.write(&snapshot, source_id, store, destination)
    }

    /// Number of nodes a duplicate of `source_id` would create.
    pub fn plan<S: Findable + ?Sized>(
        &self,
        source: &S,
        source_id: NodeId,
    ) -> Result<usize, DuplicateError> {
        Ok(self.capture(source, source_id)?.nodes.len())
    }

    fn capture<S: Findable + ?Sized>(
        &self,
        source: &S,
        root: NodeId,
    ) -> Result<Snapshot, DuplicateError> {
        let root_node = source.find(root).ok_or(DuplicateError::SourceNotFound(root))?;
        let mut nodes = HashMap::new();
        let mut stack = vec![root_node];
        while let Some(node) = stack.pop() {
            if nodes.contains_key(&node.id) {
                continue;
            }
            for (property, value) in &node.properties {
                if self.policy.excludes(&node.class, property) {
                    continue;
                }
                stack.extend(
                    value
                        .owned_children()
                        .iter()
                        .filter_map(|child| source.find(*child)),
                );
            }
            nodes.insert(node.id, node.clone());
        }
        Ok(Snapshot { nodes })
    }

    fn write<D: GraphStore>(
        &self,
        snapshot: &Snapshot,
        source_id: NodeId,
        target: &mut D,
        destination: &Destination,
    ) -> Result<DuplicateReport, DuplicateError> {
        let mut id_map = Vec::with_capacity(snapshot.nodes.len());
        let mut failures = Vec::new();

        let root = match self.copy_node(
            snapshot,
            source_id,
            target,
            destination,
            &mut id_map,
            &mut failures,
        ) {
            Ok(root) => root,
            Err(err) => {
                error!(
                    "event=node_duplicate module=service status=error source={} created={} error={}",
                    source_id,
                    id_map.len(),
                    err
                );
                if id_map.is_empty() {
                    return Err(err.into());
                }
                return Err(DuplicateError::Interrupted { id_map, cause: err });
            }
        };

        info!(
            "event=node_duplicate module=service status=ok source={} copy={} created={} failures={}",
            source_id,
            root,
            id_map.len(),
            failures.len()
        );
        Ok(DuplicateReport {
            root,
            id_map,
            failures,
        })
    }

    fn copy_node<D: GraphStore>(
        &self,
        snapshot: &Snapshot,
        source_id: NodeId,
        target: &mut D,
        destination: &Destination,
        id_map: &mut Vec<(NodeId, NodeId)>,
        failures: &mut Vec<PropertyFailure>,
    ) -> GraphResult<NodeId> {
        let source = snapshot
            .nodes
            .get(&source_id)
            .ok_or(GraphError::NotFound(source_id))?;
        let schema = std::sync::Arc::clone(target.schema());
        let mut owned = Vec::new();

        let new_id = Sequencer::new(&mut *target).create(&source.class, destination, |node| {
            self.populate(&schema, source, node, &mut owned, failures);
            Ok(())
        })?;
        id_map.push((source_id, new_id));

        for (property, kind, children) in owned {
            let child_destination = if kind == PropertyKind::OwnedAtom {
                Destination::owned_atom(new_id, property.as_str())
            } else {
                Destination::append(new_id, property.as_str())
            };
            for child in children {
                let failure = |reason| PropertyFailure {
                    source_node: source_id,
                    new_node: new_id,
                    property: property.clone(),
                    reason,
                };
                if !snapshot.nodes.contains_key(&child) {
                    failures.push(failure(PropertyFailureReason::MissingOwnedChild(child)));
                    continue;
                }
                match self.copy_node(snapshot, child, target, &child_destination, id_map, failures)
                {
                    Ok(_) => {}
                    Err(err) if err.is_allocation() => return Err(err),
                    Err(err) => failures.push(failure(PropertyFailureReason::Write(err))),
                }
            }
        }

        Ok(new_id)
    }

    /// Writes every value property of `source` onto the attached copy and
    /// collects owned properties for the recursive pass.
    fn populate<D: GraphStore>(
        &self,
        schema: &Schema,
        source: &Node,
        node: &mut AttachedNode<'_, D>,
        owned: &mut Vec<(String, PropertyKind, Vec<NodeId>)>,
        failures: &mut Vec<PropertyFailure>,
    ) {
        let new_node = node.id();
        for (property, value) in &source.properties {
            if self.policy.excludes(&source.class, property) {
                continue;
            }
            let mut fail = |reason| {
                failures.push(PropertyFailure {
                    source_node: source.id,
                    new_node,
                    property: property.clone(),
                    reason,
                })
            };

            let kind = match schema.classify(&source.class, property) {
                Ok(kind) => kind,
                Err(err) => {
                    fail(PropertyFailureReason::Schema(err));
                    continue;
                }
            };
            if !value.matches_kind(kind) {
                fail(PropertyFailureReason::ShapeMismatch {
                    expected: kind,
                    found: value.shape_name(),
                });
                continue;
            }

            let written = match value {
                PropertyValue::MultiText(alternatives) => {
                    node.copy_alternatives_from(property, alternatives)
                }
                PropertyValue::Text(formatted) => {
                    let (text, ws) = formatted.extract();
                    node.set_text(property, FormattedText::make(text, ws))
                }
                PropertyValue::Reference(targets) => {
                    node.set_references(property, targets.clone())
                }
                PropertyValue::Basic(basic) => node.set_basic(property, basic.clone()),
                PropertyValue::OwnedAtom(_)
                | PropertyValue::OwnedSequence(_)
                | PropertyValue::OwnedCollection(_) => {
                    owned.push((property.clone(), kind, value.owned_children().to_vec()));
                    Ok(())
                }
            };
            if let Err(err) = written {
                fail(PropertyFailureReason::Write(err));
            }
        }
    }
}
