#![deny(missing_docs)]
#![doc = "Importer turning AXF JSON reports into the read-only arena model of `axf-core`."]

/// Ingestion of raw documents into an [`axf_core::ApproxReport`].
pub mod ingest;
/// Serde mirror of the on-disk document.
pub mod schema;

pub use ingest::{import_file, import_file_with_hash, import_slice};
pub use schema::SCHEMA_VERSION;
