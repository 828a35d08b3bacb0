//! Schema metadata and property classification.
//!
//! # Responsibility
//! - Load class/property declarations from manifests.
//! - Resolve every declared property to a closed `PropertyKind` once.
//!
//! # Invariants
//! - Classification never inspects stored values or property name patterns
//!   at call time.
//! - Undeclared properties fail with `UnknownProperty`; the failure is
//!   scoped to that single property.

pub mod classifier;
pub mod kind;
pub mod manifest;
