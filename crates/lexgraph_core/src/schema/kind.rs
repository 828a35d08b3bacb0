//! Closed property kind taxonomy.

use std::fmt::{Display, Formatter};

/// Cardinality of a non-owning reference property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReferenceCardinality {
    /// Zero or one target.
    Atomic,
    /// Ordered targets; order is preserved on copy.
    Sequence,
    /// Unordered targets.
    Collection,
}

/// Ownership/cardinality kind of one declared property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PropertyKind {
    /// One text alternative per writing system.
    MultiText,
    /// One formatted value in one writing system.
    Text,
    /// Zero or one exclusively owned child.
    OwnedAtom,
    /// Ordered exclusively owned children.
    OwnedSequence,
    /// Unordered exclusively owned children.
    OwnedCollection,
    /// Shared pointer(s) to nodes owned elsewhere.
    Reference(ReferenceCardinality),
    /// Scalar value (integer, boolean, plain string, timestamp).
    Basic,
}

/// Manifest string for [`PropertyKind::MultiText`].
pub const KIND_MULTI_TEXT: &str = "multi_text";
/// Manifest string for [`PropertyKind::Text`].
pub const KIND_TEXT: &str = "text";
/// Manifest string for [`PropertyKind::OwnedAtom`].
pub const KIND_OWNED_ATOM: &str = "owned_atom";
/// Manifest string for [`PropertyKind::OwnedSequence`].
pub const KIND_OWNED_SEQUENCE: &str = "owned_sequence";
/// Manifest string for [`PropertyKind::OwnedCollection`].
pub const KIND_OWNED_COLLECTION: &str = "owned_collection";
/// Manifest string for an atomic reference.
pub const KIND_REFERENCE_ATOM: &str = "reference_atom";
/// Manifest string for a reference sequence.
pub const KIND_REFERENCE_SEQUENCE: &str = "reference_sequence";
/// Manifest string for a reference collection.
pub const KIND_REFERENCE_COLLECTION: &str = "reference_collection";
/// Manifest string for [`PropertyKind::Basic`].
pub const KIND_BASIC: &str = "basic";

impl PropertyKind {
    /// Stable manifest string for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MultiText => KIND_MULTI_TEXT,
            Self::Text => KIND_TEXT,
            Self::OwnedAtom => KIND_OWNED_ATOM,
            Self::OwnedSequence => KIND_OWNED_SEQUENCE,
            Self::OwnedCollection => KIND_OWNED_COLLECTION,
            Self::Reference(ReferenceCardinality::Atomic) => KIND_REFERENCE_ATOM,
            Self::Reference(ReferenceCardinality::Sequence) => KIND_REFERENCE_SEQUENCE,
            Self::Reference(ReferenceCardinality::Collection) => KIND_REFERENCE_COLLECTION,
            Self::Basic => KIND_BASIC,
        }
    }

    /// Parses one manifest kind string. Matching is exact.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            KIND_MULTI_TEXT => Some(Self::MultiText),
            KIND_TEXT => Some(Self::Text),
            KIND_OWNED_ATOM => Some(Self::OwnedAtom),
            KIND_OWNED_SEQUENCE => Some(Self::OwnedSequence),
            KIND_OWNED_COLLECTION => Some(Self::OwnedCollection),
            KIND_REFERENCE_ATOM => Some(Self::Reference(ReferenceCardinality::Atomic)),
            KIND_REFERENCE_SEQUENCE => Some(Self::Reference(ReferenceCardinality::Sequence)),
            KIND_REFERENCE_COLLECTION => Some(Self::Reference(ReferenceCardinality::Collection)),
            KIND_BASIC => Some(Self::Basic),
            _ => None,
        }
    }

    /// Returns whether the property exclusively owns child nodes.
    pub fn is_owning(self) -> bool {
        matches!(
            self,
            Self::OwnedAtom | Self::OwnedSequence | Self::OwnedCollection
        )
    }

    pub fn is_reference(self) -> bool {
        matches!(self, Self::Reference(_))
    }
}

impl Display for PropertyKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{PropertyKind, ReferenceCardinality};

    #[test]
    fn only_owned_kinds_are_owning() {
        assert!(PropertyKind::OwnedAtom.is_owning());
        assert!(PropertyKind::OwnedCollection.is_owning());
        assert!(!PropertyKind::Reference(ReferenceCardinality::Sequence).is_owning());
        assert!(!PropertyKind::MultiText.is_owning());
        assert!(PropertyKind::Reference(ReferenceCardinality::Atomic).is_reference());
    }

    #[test]
    fn reference_cardinality_maps_to_distinct_manifest_strings() {
        assert_eq!(
            PropertyKind::parse("reference_sequence"),
            Some(PropertyKind::Reference(ReferenceCardinality::Sequence))
        );
        assert_eq!(
            PropertyKind::Reference(ReferenceCardinality::Collection).as_str(),
            "reference_collection"
        );
    }

    #[test]
    fn rejects_non_canonical_kind_strings() {
        assert_eq!(PropertyKind::parse("MultiText"), None);
        assert_eq!(PropertyKind::parse(" text"), None);
    }
}
