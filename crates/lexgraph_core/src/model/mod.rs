//! Graph domain model.
//!
//! # Responsibility
//! - Define node records, property values and localized text types.
//! - Keep value shapes independent from any storage backend.
//!
//! # Invariants
//! - Every node is identified by a stable `NodeId`.
//! - Ownership edges form a tree; references are shared, never owned.

pub mod node;
pub mod text;
pub mod writing_system;
