#![deny(missing_docs)]
#![doc = "Report model, structured errors and canonical hashing shared by the AXF certification crates."]

use std::fmt;

use ::serde::{Deserialize, Serialize};

pub mod errors;
pub mod hash;
pub mod model;
pub mod provenance;
pub mod serde;

pub use errors::{AxfError, ErrorInfo};
pub use model::{
    ApproxReport, ErrorBound, ErrorKind, FunctionDef, FunctionTable, Interval, Locator,
    NodeVisit, NormConvention, NormKind, Polynomial, ReportBuilder, SubApproximation,
    TopLevelApproximation, MAX_PRECISION_BITS,
};
pub use provenance::{SchemaVersion, ToolVersions};

/// Identifier for a sub-approximation stored in an [`ApproxReport`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    /// Creates a new identifier from its raw integer representation.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw integer representation of the identifier.
    pub fn as_raw(&self) -> u32 {
        self.0
    }

    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Identifier for a target function in the report's [`FunctionTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FunctionId(u32);

impl FunctionId {
    /// Creates a new identifier from its raw integer representation.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw integer representation of the identifier.
    pub fn as_raw(&self) -> u32 {
        self.0
    }

    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}
