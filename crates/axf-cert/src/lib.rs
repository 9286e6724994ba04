#![deny(missing_docs)]
#![doc = "Composition and soundness certification of AXF approximation reports."]

pub mod comparator;
pub mod driver;
pub mod histogram;
pub mod policy;
pub mod report;
pub mod soundness;
pub mod strategy;

pub use comparator::{check_composition, check_node};
pub use driver::{certify, CertificationOutcome, DriverState, ExitStatus, Tally};
pub use histogram::{render_histogram_svg, LogHistogram, SvgConfig, SvgHistogram, TextHistogram, Visualizer};
pub use policy::{Acceptance, CertifyConfig, CheckLevel};
pub use report::{Claim, CertificationReport, Violation, ViolationKind, CERTIFICATE_SCHEMA};
pub use soundness::{verify_soundness, Outcome};
pub use strategy::CheckStrategy;
