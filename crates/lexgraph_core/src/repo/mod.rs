//! Graph store abstractions and in-memory implementation.
//!
//! # Responsibility
//! - Define store contracts used by lifecycle and services.
//! - Keep ownership bookkeeping (owner edges, cascade delete) inside the store.
//!
//! # Invariants
//! - Store writes enforce schema kinds before storing a value.
//! - Store APIs return semantic errors (`NotFound`, `NotAttached`) rather than
//!   panicking.

pub mod capability;
pub mod graph_repo;
