//! Node construction sequencing.
//!
//! # Responsibility
//! - Drive every new node through allocate, attach, populate.
//! - Expose property setters only on attached nodes.
//!
//! # Invariants
//! - `UnattachedNode` has no setters; `AttachedNode` is only produced by
//!   [`Sequencer::attach`].
//! - `create` returns only after the populate step has run.
//! - No rollback: a failed populate leaves the attached node in place.

use crate::model::node::{BasicValue, NodeId, PropertyValue};
use crate::model::text::{FormattedText, MultiText};
use crate::repo::graph_repo::{Destination, GraphResult, GraphStore, UnattachedNode};
use log::debug;

/// Construction gate over one graph store.
pub struct Sequencer<'g, S: GraphStore> {
    store: &'g mut S,
}

impl<'g, S: GraphStore> Sequencer<'g, S> {
    pub fn new(store: &'g mut S) -> Self {
        Self { store }
    }

    /// Read access to the underlying store.
    pub fn store(&self) -> &S {
        &*self.store
    }

    /// Reserves an identity for `class`.
    pub fn allocate(&mut self, class: &str) -> GraphResult<UnattachedNode> {
        self.store.allocate(class)
    }

    /// Reserves a caller-chosen identity for `class`.
    pub fn allocate_with_id(&mut self, class: &str, id: NodeId) -> GraphResult<UnattachedNode> {
        self.store.allocate_with_id(class, id)
    }

    /// Gives back a reserved identity that will not be attached.
    pub fn release(&mut self, handle: UnattachedNode) -> GraphResult<()> {
        self.store.release(handle)
    }

    /// Attaches a reserved identity and returns its setter handle.
    pub fn attach(
        &mut self,
        handle: UnattachedNode,
        destination: &Destination,
    ) -> GraphResult<AttachedNode<'_, S>> {
        let id = self.store.attach(handle, destination)?;
        Ok(AttachedNode {
            store: &mut *self.store,
            id,
        })
    }

    /// Runs allocate, attach and populate as one step.
    ///
    /// # Errors
    /// - Allocation and attach errors from the store.
    /// - Any error returned by `populate`; the node stays attached.
    pub fn create<F>(
        &mut self,
        class: &str,
        destination: &Destination,
        populate: F,
    ) -> GraphResult<NodeId>
    where
        F: FnOnce(&mut AttachedNode<'_, S>) -> GraphResult<()>,
    {
        let handle = self.allocate(class)?;
        let mut node = self.attach(handle, destination)?;
        populate(&mut node)?;
        debug!(
            "event=node_create module=lifecycle status=ok class={} node={}",
            class, node.id
        );
        Ok(node.id)
    }
}

/// Live node handle with property setters.
pub struct AttachedNode<'a, S: GraphStore> {
    store: &'a mut S,
    id: NodeId,
}

impl<S: GraphStore> AttachedNode<'_, S> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Writes a raw value after kind checks.
    pub fn set(&mut self, property: &str, value: PropertyValue) -> GraphResult<()> {
        self.store.set_property(self.id, property, value)
    }

    /// Mutable multi-text value, created empty when absent.
    pub fn multi_text_mut(&mut self, property: &str) -> GraphResult<&mut MultiText> {
        self.store.multi_text_mut(self.id, property)
    }

    /// Creates the multi-text value and copies every alternative of `source`.
    pub fn copy_alternatives_from(&mut self, property: &str, source: &MultiText) -> GraphResult<()> {
        self.multi_text_mut(property)?.copy_alternatives_from(source);
        Ok(())
    }

    pub fn set_text(&mut self, property: &str, value: FormattedText) -> GraphResult<()> {
        self.set(property, PropertyValue::Text(value))
    }

    pub fn set_basic(&mut self, property: &str, value: BasicValue) -> GraphResult<()> {
        self.set(property, PropertyValue::Basic(value))
    }

    /// Points a reference property at `targets`, in order.
    pub fn set_references(&mut self, property: &str, targets: Vec<NodeId>) -> GraphResult<()> {
        self.set(property, PropertyValue::Reference(targets))
    }
}
