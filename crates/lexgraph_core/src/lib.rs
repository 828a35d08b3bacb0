//! Duplication and selective import for ownership-structured lexicon graphs.
//!
//! Layers, leaves first: `schema` classifies properties, `lifecycle` gates
//! node construction, `service` duplicates, validates and imports.

pub mod lifecycle;
pub mod logging;
pub mod model;
pub mod repo;
pub mod schema;
pub mod service;

pub use lifecycle::{AttachedNode, Sequencer};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::node::{BasicValue, Node, NodeId, Owner, PropertyValue};
pub use model::text::{FormattedText, MultiText, TextRun};
pub use model::writing_system::{WritingSystem, WritingSystemError};
pub use repo::capability::{ExistenceCheckable, Findable};
pub use repo::graph_repo::{
    Destination, GraphError, GraphResult, GraphStore, MemoryGraph, UnattachedNode,
};
pub use schema::classifier::{Schema, SchemaBuilder, SchemaError, SchemaResult};
pub use schema::kind::{PropertyKind, ReferenceCardinality};
pub use schema::manifest::{ManifestError, SchemaManifest};
pub use service::duplicate_service::{
    CopyPolicy, DuplicateError, DuplicateReport, DuplicationEngine, PropertyFailure,
    PropertyFailureReason,
};
pub use service::import_service::{
    ImportCounts, ImportError, ImportFilter, ImportRequest, ImportResult, ImportService,
    ImportState, NodeImport, NodeImportOutcome,
};
pub use service::validation_service::{
    Finding, FindingKind, ReferenceValidator, Severity, ValidationRecord, ValidationReport,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
