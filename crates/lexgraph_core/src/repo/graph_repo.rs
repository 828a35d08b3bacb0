//! Graph store contracts and in-memory arena implementation.
//!
//! # Responsibility
//! - Allocate identities, attach nodes to ownership destinations, store values.
//! - Cascade deletes through owned descendants.
//!
//! # Invariants
//! - An allocated identity is not a live node until attached.
//! - An allocated identity holds its reservation until attached or released.
//! - Property writes on an unattached identity fail with `NotAttached`.
//! - Owned children enter a parent only through `attach`.
//! - Delete never touches nodes that are merely referenced.

use crate::model::node::{Node, NodeId, Owner, PropertyValue};
use crate::model::text::MultiText;
use crate::repo::capability::{ExistenceCheckable, Findable};
use crate::schema::classifier::{Schema, SchemaError};
use crate::schema::kind::PropertyKind;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Result type used by graph store operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors from graph store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Store cannot allocate a new identity.
    Allocation { class: String, reason: String },
    /// Identity does not resolve to a live node.
    NotFound(NodeId),
    /// Identity is allocated but not attached yet.
    NotAttached(NodeId),
    /// Handle was already attached.
    AlreadyAttached(NodeId),
    /// Requested identity is already allocated or live.
    IdentityInUse(NodeId),
    /// Destination property cannot receive an owned child of this shape.
    InvalidDestination {
        parent: NodeId,
        property: String,
        kind: PropertyKind,
    },
    /// Owned atom slot already holds a child.
    SlotOccupied { parent: NodeId, property: String },
    /// Owned properties cannot be assigned directly.
    OwnedPropertyWrite { node: NodeId, property: String },
    /// Value shape does not match the declared kind.
    ValueKindMismatch {
        node: NodeId,
        property: String,
        expected: PropertyKind,
        found: &'static str,
    },
    /// Schema lookup failure.
    Schema(SchemaError),
}

impl GraphError {
    /// Returns whether this error must abort a whole duplicate call.
    pub fn is_allocation(&self) -> bool {
        matches!(self, Self::Allocation { .. })
    }
}

impl Display for GraphError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allocation { class, reason } => {
                write!(f, "cannot allocate {class} node: {reason}")
            }
            Self::NotFound(id) => write!(f, "node not found: {id}"),
            Self::NotAttached(id) => write!(f, "node is allocated but not attached: {id}"),
            Self::AlreadyAttached(id) => write!(f, "node is already attached: {id}"),
            Self::IdentityInUse(id) => write!(f, "node identity already in use: {id}"),
            Self::InvalidDestination {
                parent,
                property,
                kind,
            } => write!(
                f,
                "property {property} ({kind}) on node {parent} cannot receive this child"
            ),
            Self::SlotOccupied { parent, property } => {
                write!(f, "owned slot {property} on node {parent} is occupied")
            }
            Self::OwnedPropertyWrite { node, property } => write!(
                f,
                "owned property {property} on node {node} can only change through attach"
            ),
            Self::ValueKindMismatch {
                node,
                property,
                expected,
                found,
            } => write!(
                f,
                "property {property} on node {node} expects {expected}, got {found}"
            ),
            Self::Schema(err) => write!(f, "{err}"),
        }
    }
}

impl Error for GraphError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Schema(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SchemaError> for GraphError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

/// Where a freshly allocated node is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Register as a graph root.
    Root,
    /// Fill an empty owned atom slot.
    OwnedAtom { parent: NodeId, property: String },
    /// Append into an owned sequence or collection.
    Append { parent: NodeId, property: String },
}

impl Destination {
    pub fn owned_atom(parent: NodeId, property: impl Into<String>) -> Self {
        Self::OwnedAtom {
            parent,
            property: property.into(),
        }
    }

    pub fn append(parent: NodeId, property: impl Into<String>) -> Self {
        Self::Append {
            parent,
            property: property.into(),
        }
    }

    /// Ownership edge the attached node will carry.
    pub fn owner(&self) -> Option<Owner> {
        match self {
            Self::Root => None,
            Self::OwnedAtom { parent, property } | Self::Append { parent, property } => {
                Some(Owner {
                    parent: *parent,
                    property: property.clone(),
                })
            }
        }
    }
}

/// Allocated identity that is not attached yet.
///
/// Carries no property setters: the only ways forward are
/// [`GraphStore::attach`] and [`GraphStore::release`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "an allocated node must be attached or released"]
pub struct UnattachedNode {
    id: NodeId,
    class: String,
}

impl UnattachedNode {
    /// Mints a handle for an identity the store has just reserved. Only
    /// [`GraphStore`] implementations should call this.
    pub fn new(id: NodeId, class: impl Into<String>) -> Self {
        Self {
            id,
            class: class.into(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn class(&self) -> &str {
        self.class.as_str()
    }
}

/// Backing store interface for ownership-structured graphs.
pub trait GraphStore: Findable + ExistenceCheckable {
    /// Schema governing classes and property kinds in this store.
    fn schema(&self) -> &Arc<Schema>;
    /// Allocates a new identity for `class`.
    fn allocate(&mut self, class: &str) -> GraphResult<UnattachedNode>;
    /// Allocates a caller-chosen identity, e.g. shared template nodes that
    /// keep the same id across graphs.
    fn allocate_with_id(&mut self, class: &str, id: NodeId) -> GraphResult<UnattachedNode>;
    /// Attaches an allocated handle; afterwards the node is live.
    fn attach(&mut self, handle: UnattachedNode, destination: &Destination)
        -> GraphResult<NodeId>;
    /// Drops an unattached reservation; its identity and capacity are free
    /// again afterwards.
    fn release(&mut self, handle: UnattachedNode) -> GraphResult<()>;
    /// Writes one non-owning property of a live node.
    fn set_property(
        &mut self,
        node: NodeId,
        property: &str,
        value: PropertyValue,
    ) -> GraphResult<()>;
    /// Mutable multi-text value of a live node, created empty when absent.
    fn multi_text_mut(&mut self, node: NodeId, property: &str) -> GraphResult<&mut MultiText>;
    /// Live nodes of one class ordered by `(created_at, id)`.
    fn nodes_of_class(&self, class: &str) -> Vec<&Node>;
    /// Root node ids in registration order.
    fn roots(&self) -> Vec<NodeId>;
    /// Deletes a node and all owned descendants; returns removed ids in
    /// post-order (children before owners).
    fn delete(&mut self, node: NodeId) -> GraphResult<Vec<NodeId>>;
    /// Number of live nodes.
    fn node_count(&self) -> usize;

    /// Loads one live node or fails with `NotFound`.
    fn resolve(&self, id: NodeId) -> GraphResult<&Node> {
        self.find(id).ok_or(GraphError::NotFound(id))
    }
}

enum Slot {
    Allocated { class: String },
    Live(Node),
}

/// Identity-indexed in-memory graph store.
pub struct MemoryGraph {
    schema: Arc<Schema>,
    slots: HashMap<NodeId, Slot>,
    roots: Vec<NodeId>,
    capacity: Option<usize>,
    frozen_clock_ms: Option<i64>,
}

impl MemoryGraph {
    /// Creates an empty store governed by `schema`.
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            slots: HashMap::new(),
            roots: Vec::new(),
            capacity: None,
            frozen_clock_ms: None,
        }
    }

    /// Creates a store that refuses allocation beyond `max_slots` identities
    /// (allocated or live).
    pub fn with_capacity_limit(schema: Arc<Schema>, max_slots: usize) -> Self {
        Self {
            capacity: Some(max_slots),
            ..Self::new(schema)
        }
    }

    /// Freezes the store clock at `now_ms` for subsequent writes.
    pub fn set_clock(&mut self, now_ms: i64) {
        self.frozen_clock_ms = Some(now_ms);
    }

    fn now_ms(&self) -> i64 {
        if let Some(frozen) = self.frozen_clock_ms {
            return frozen;
        }
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis() as i64)
    }

    fn live(&self, id: NodeId) -> GraphResult<&Node> {
        match self.slots.get(&id) {
            Some(Slot::Live(node)) => Ok(node),
            Some(Slot::Allocated { .. }) => Err(GraphError::NotAttached(id)),
            None => Err(GraphError::NotFound(id)),
        }
    }

    fn live_mut(&mut self, id: NodeId) -> GraphResult<&mut Node> {
        match self.slots.get_mut(&id) {
            Some(Slot::Live(node)) => Ok(node),
            Some(Slot::Allocated { .. }) => Err(GraphError::NotAttached(id)),
            None => Err(GraphError::NotFound(id)),
        }
    }

    fn link_to_owner(&mut self, child: NodeId, destination: &Destination) -> GraphResult<()> {
        let now = self.now_ms();
        match destination {
            Destination::Root => {
                self.roots.push(child);
                Ok(())
            }
            Destination::OwnedAtom { parent, property } => {
                let kind = self.classify_on(*parent, property)?;
                if kind != PropertyKind::OwnedAtom {
                    return Err(GraphError::InvalidDestination {
                        parent: *parent,
                        property: property.clone(),
                        kind,
                    });
                }
                let node = self.live_mut(*parent)?;
                if let Some(PropertyValue::OwnedAtom(Some(_))) = node.properties.get(property) {
                    return Err(GraphError::SlotOccupied {
                        parent: *parent,
                        property: property.clone(),
                    });
                }
                node.properties
                    .insert(property.clone(), PropertyValue::OwnedAtom(Some(child)));
                node.updated_at = now;
                Ok(())
            }
            Destination::Append { parent, property } => {
                let kind = self.classify_on(*parent, property)?;
                let empty = match kind {
                    PropertyKind::OwnedSequence => PropertyValue::OwnedSequence(Vec::new()),
                    PropertyKind::OwnedCollection => PropertyValue::OwnedCollection(Vec::new()),
                    other => {
                        return Err(GraphError::InvalidDestination {
                            parent: *parent,
                            property: property.clone(),
                            kind: other,
                        })
                    }
                };
                let node = self.live_mut(*parent)?;
                match node.properties.entry(property.clone()).or_insert(empty) {
                    PropertyValue::OwnedSequence(children)
                    | PropertyValue::OwnedCollection(children) => children.push(child),
                    other => {
                        return Err(GraphError::ValueKindMismatch {
                            node: *parent,
                            property: property.clone(),
                            expected: kind,
                            found: other.shape_name(),
                        })
                    }
                }
                node.updated_at = now;
                Ok(())
            }
        }
    }

    fn reserve(&mut self, class: &str, id: NodeId) -> GraphResult<UnattachedNode> {
        if !self.schema.has_class(class) {
            return Err(SchemaError::UnknownClass(class.to_string()).into());
        }
        if let Some(limit) = self.capacity {
            if self.slots.len() >= limit {
                warn!(
                    "event=node_allocate module=repo status=error class={} error_code=capacity_exhausted limit={}",
                    class, limit
                );
                return Err(GraphError::Allocation {
                    class: class.to_string(),
                    reason: format!("capacity of {limit} nodes reached"),
                });
            }
        }

        self.slots.insert(
            id,
            Slot::Allocated {
                class: class.to_string(),
            },
        );
        Ok(UnattachedNode::new(id, class))
    }

    fn classify_on(&self, node: NodeId, property: &str) -> GraphResult<PropertyKind> {
        let node = self.live(node)?;
        Ok(self.schema.classify(&node.class, property)?)
    }

    fn post_order(&self, root: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![(root, false)];
        while let Some((current, expanded)) = stack.pop() {
            if expanded {
                order.push(current);
                continue;
            }
            stack.push((current, true));
            if let Some(Slot::Live(node)) = self.slots.get(&current) {
                for child in node.owned_children().into_iter().rev() {
                    stack.push((child, false));
                }
            }
        }
        order
    }
}

impl Findable for MemoryGraph {
    fn find(&self, id: NodeId) -> Option<&Node> {
        match self.slots.get(&id) {
            Some(Slot::Live(node)) => Some(node),
            _ => None,
        }
    }
}

impl ExistenceCheckable for MemoryGraph {
    fn exists(&self, id: NodeId) -> bool {
        self.find(id).is_some()
    }
}

impl GraphStore for MemoryGraph {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn allocate(&mut self, class: &str) -> GraphResult<UnattachedNode> {
        self.reserve(class, Uuid::new_v4())
    }

    fn allocate_with_id(&mut self, class: &str, id: NodeId) -> GraphResult<UnattachedNode> {
        if self.slots.contains_key(&id) {
            return Err(GraphError::IdentityInUse(id));
        }
        self.reserve(class, id)
    }

    fn attach(
        &mut self,
        handle: UnattachedNode,
        destination: &Destination,
    ) -> GraphResult<NodeId> {
        let UnattachedNode { id, class } = handle;
        match self.slots.get(&id) {
            Some(Slot::Allocated { .. }) => {}
            Some(Slot::Live(_)) => return Err(GraphError::AlreadyAttached(id)),
            None => return Err(GraphError::NotFound(id)),
        }

        if let Err(err) = self.link_to_owner(id, destination) {
            // Release the reservation so a failed attach leaves no orphan slot.
            self.slots.remove(&id);
            return Err(err);
        }

        let now = self.now_ms();
        self.slots
            .insert(id, Slot::Live(Node::new(id, class, destination.owner(), now)));
        Ok(id)
    }

    fn release(&mut self, handle: UnattachedNode) -> GraphResult<()> {
        let id = handle.id();
        match self.slots.get(&id) {
            Some(Slot::Allocated { .. }) => {
                self.slots.remove(&id);
                debug!(
                    "event=node_release module=repo status=ok class={} node={}",
                    handle.class(),
                    id
                );
                Ok(())
            }
            Some(Slot::Live(_)) => Err(GraphError::AlreadyAttached(id)),
            None => Err(GraphError::NotFound(id)),
        }
    }

    fn set_property(
        &mut self,
        node: NodeId,
        property: &str,
        value: PropertyValue,
    ) -> GraphResult<()> {
        let now = self.now_ms();
        let schema = Arc::clone(&self.schema);
        let target = self.live_mut(node)?;
        let kind = schema.classify(&target.class, property)?;
        if kind.is_owning() {
            return Err(GraphError::OwnedPropertyWrite {
                node,
                property: property.to_string(),
            });
        }
        if !value.matches_kind(kind) {
            return Err(GraphError::ValueKindMismatch {
                node,
                property: property.to_string(),
                expected: kind,
                found: value.shape_name(),
            });
        }
        target.properties.insert(property.to_string(), value);
        target.updated_at = now;
        Ok(())
    }

    fn multi_text_mut(&mut self, node: NodeId, property: &str) -> GraphResult<&mut MultiText> {
        let now = self.now_ms();
        let schema = Arc::clone(&self.schema);
        let target = self.live_mut(node)?;
        let kind = schema.classify(&target.class, property)?;
        if kind != PropertyKind::MultiText {
            return Err(GraphError::ValueKindMismatch {
                node,
                property: property.to_string(),
                expected: kind,
                found: "multi_text",
            });
        }
        target.updated_at = now;
        match target
            .properties
            .entry(property.to_string())
            .or_insert_with(|| PropertyValue::MultiText(MultiText::new()))
        {
            PropertyValue::MultiText(value) => Ok(value),
            other => Err(GraphError::ValueKindMismatch {
                node,
                property: property.to_string(),
                expected: kind,
                found: other.shape_name(),
            }),
        }
    }

    fn nodes_of_class(&self, class: &str) -> Vec<&Node> {
        let mut nodes: Vec<&Node> = self
            .slots
            .values()
            .filter_map(|slot| match slot {
                Slot::Live(node) if node.class == class => Some(node),
                _ => None,
            })
            .collect();
        nodes.sort_by(|left, right| {
            left.created_at
                .cmp(&right.created_at)
                .then_with(|| left.id.cmp(&right.id))
        });
        nodes
    }

    fn roots(&self) -> Vec<NodeId> {
        self.roots.clone()
    }

    fn delete(&mut self, node: NodeId) -> GraphResult<Vec<NodeId>> {
        let owner = self.live(node)?.owner.clone();
        let removed = self.post_order(node);
        let now = self.now_ms();

        match owner {
            Some(owner) => {
                if let Some(Slot::Live(parent)) = self.slots.get_mut(&owner.parent) {
                    match parent.properties.get_mut(&owner.property) {
                        Some(PropertyValue::OwnedAtom(slot)) => *slot = None,
                        Some(PropertyValue::OwnedSequence(children))
                        | Some(PropertyValue::OwnedCollection(children)) => {
                            children.retain(|child| *child != node)
                        }
                        _ => {}
                    }
                    parent.updated_at = now;
                }
            }
            None => self.roots.retain(|root| *root != node),
        }

        for id in &removed {
            self.slots.remove(id);
        }

        info!(
            "event=node_delete module=repo status=ok node={} removed={}",
            node,
            removed.len()
        );
        Ok(removed)
    }

    fn node_count(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, Slot::Live(_)))
            .count()
    }
}
