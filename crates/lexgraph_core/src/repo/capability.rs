//! Lookup capabilities declared per store type.
//!
//! Validators and importers require these traits structurally instead of
//! probing stores at runtime.

use crate::model::node::{Node, NodeId};
use std::collections::{BTreeSet, HashSet};

/// Store can return a live node by identity.
pub trait Findable {
    fn find(&self, id: NodeId) -> Option<&Node>;
}

/// Store can answer whether an identity resolves to a live node.
///
/// Identity sets implement this so a target known only by its ids (for
/// example an export listing) can still be validated against.
pub trait ExistenceCheckable {
    fn exists(&self, id: NodeId) -> bool;
}

impl ExistenceCheckable for BTreeSet<NodeId> {
    fn exists(&self, id: NodeId) -> bool {
        self.contains(&id)
    }
}

impl ExistenceCheckable for HashSet<NodeId> {
    fn exists(&self, id: NodeId) -> bool {
        self.contains(&id)
    }
}
