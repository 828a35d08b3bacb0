//! Graph use-case services.
//!
//! # Responsibility
//! - Orchestrate store, schema and lifecycle calls into duplicate, validate
//!   and import operations.
//! - Keep callers decoupled from store internals.

pub mod duplicate_service;
pub mod import_service;
pub mod validation_service;
