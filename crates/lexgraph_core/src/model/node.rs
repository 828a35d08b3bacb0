//! Graph node read model and property values.
//!
//! # Responsibility
//! - Define the record shape stored by graph stores.
//! - Describe which value shapes are legal for each property kind.
//!
//! # Invariants
//! - `id` is stable and never reused for another node.
//! - `owner` is `None` only for graph roots.
//! - Owned child ids appear in exactly one owned property of exactly one node.

use crate::model::text::{FormattedText, MultiText};
use crate::schema::kind::{PropertyKind, ReferenceCardinality};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Stable opaque node identity.
pub type NodeId = Uuid;

/// Scalar property payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BasicValue {
    Integer(i64),
    Boolean(bool),
    String(String),
    /// Unix epoch milliseconds.
    Timestamp(i64),
}

/// Stored value of one property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    MultiText(MultiText),
    Text(FormattedText),
    OwnedAtom(Option<NodeId>),
    OwnedSequence(Vec<NodeId>),
    OwnedCollection(Vec<NodeId>),
    /// Reference targets in stored order. Atomic references hold at most one.
    Reference(Vec<NodeId>),
    Basic(BasicValue),
}

impl PropertyValue {
    /// Returns whether this value's shape is legal for `kind`.
    pub fn matches_kind(&self, kind: PropertyKind) -> bool {
        match (self, kind) {
            (Self::MultiText(_), PropertyKind::MultiText) => true,
            (Self::Text(_), PropertyKind::Text) => true,
            (Self::OwnedAtom(_), PropertyKind::OwnedAtom) => true,
            (Self::OwnedSequence(_), PropertyKind::OwnedSequence) => true,
            (Self::OwnedCollection(_), PropertyKind::OwnedCollection) => true,
            (Self::Reference(targets), PropertyKind::Reference(ReferenceCardinality::Atomic)) => {
                targets.len() <= 1
            }
            (Self::Reference(_), PropertyKind::Reference(_)) => true,
            (Self::Basic(_), PropertyKind::Basic) => true,
            _ => false,
        }
    }

    /// Owned child ids in stored order. Empty for non-owning values.
    pub fn owned_children(&self) -> &[NodeId] {
        match self {
            Self::OwnedAtom(Some(child)) => std::slice::from_ref(child),
            Self::OwnedSequence(children) | Self::OwnedCollection(children) => children,
            _ => &[],
        }
    }

    /// Reference targets in stored order. Empty for non-reference values.
    pub fn reference_targets(&self) -> &[NodeId] {
        match self {
            Self::Reference(targets) => targets,
            _ => &[],
        }
    }

    /// Short shape name used in diagnostics.
    pub fn shape_name(&self) -> &'static str {
        match self {
            Self::MultiText(_) => "multi_text",
            Self::Text(_) => "text",
            Self::OwnedAtom(_) => "owned_atom",
            Self::OwnedSequence(_) => "owned_sequence",
            Self::OwnedCollection(_) => "owned_collection",
            Self::Reference(_) => "reference",
            Self::Basic(_) => "basic",
        }
    }
}

/// Ownership edge of a non-root node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner {
    pub parent: NodeId,
    pub property: String,
}

/// Graph node read model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Stable node id.
    pub id: NodeId,
    /// Class (type) name declared in the schema.
    pub class: String,
    /// Owning parent and property. `None` means graph root.
    pub owner: Option<Owner>,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
    /// Property values keyed by property name.
    pub properties: BTreeMap<String, PropertyValue>,
}

impl Node {
    /// Creates an attached node with no properties.
    pub(crate) fn new(id: NodeId, class: String, owner: Option<Owner>, now_ms: i64) -> Self {
        Self {
            id,
            class,
            owner,
            created_at: now_ms,
            updated_at: now_ms,
            properties: BTreeMap::new(),
        }
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    pub fn multi_text(&self, name: &str) -> Option<&MultiText> {
        match self.properties.get(name) {
            Some(PropertyValue::MultiText(value)) => Some(value),
            _ => None,
        }
    }

    pub fn text(&self, name: &str) -> Option<&FormattedText> {
        match self.properties.get(name) {
            Some(PropertyValue::Text(value)) => Some(value),
            _ => None,
        }
    }

    pub fn basic(&self, name: &str) -> Option<&BasicValue> {
        match self.properties.get(name) {
            Some(PropertyValue::Basic(value)) => Some(value),
            _ => None,
        }
    }

    /// Owned children of one property, in stored order.
    pub fn owned(&self, name: &str) -> &[NodeId] {
        self.properties
            .get(name)
            .map_or(&[][..], PropertyValue::owned_children)
    }

    /// Reference targets of one property, in stored order.
    pub fn references(&self, name: &str) -> &[NodeId] {
        self.properties
            .get(name)
            .map_or(&[][..], PropertyValue::reference_targets)
    }

    /// All owned children, property name order then stored order.
    pub fn owned_children(&self) -> Vec<NodeId> {
        self.properties
            .values()
            .flat_map(|value| value.owned_children().iter().copied())
            .collect()
    }

    pub fn is_root(&self) -> bool {
        self.owner.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::{BasicValue, PropertyValue};
    use crate::schema::kind::{PropertyKind, ReferenceCardinality};
    use uuid::Uuid;

    #[test]
    fn atomic_reference_accepts_at_most_one_target() {
        let one = PropertyValue::Reference(vec![Uuid::new_v4()]);
        let two = PropertyValue::Reference(vec![Uuid::new_v4(), Uuid::new_v4()]);
        let atomic = PropertyKind::Reference(ReferenceCardinality::Atomic);

        assert!(one.matches_kind(atomic));
        assert!(!two.matches_kind(atomic));
        assert!(two.matches_kind(PropertyKind::Reference(ReferenceCardinality::Sequence)));
    }

    #[test]
    fn value_shapes_do_not_cross_kinds() {
        let basic = PropertyValue::Basic(BasicValue::Integer(3));
        assert!(basic.matches_kind(PropertyKind::Basic));
        assert!(!basic.matches_kind(PropertyKind::Text));
        assert!(!PropertyValue::OwnedSequence(vec![]).matches_kind(PropertyKind::OwnedCollection));
    }

    #[test]
    fn owned_children_are_empty_for_values() {
        let child = Uuid::new_v4();
        assert_eq!(PropertyValue::OwnedAtom(Some(child)).owned_children(), &[child]);
        assert!(PropertyValue::Reference(vec![child]).owned_children().is_empty());
    }
}
