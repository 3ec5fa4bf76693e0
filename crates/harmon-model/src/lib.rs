//! Core data model for tabular schema harmonization.
//!
//! This crate defines the types shared by the matching engine, the
//! candidate cache, and the session orchestrator: in-memory tables,
//! mapping candidates with review status, value-level match tables,
//! matcher registry entries, mutation operations, and the target
//! ontology lookup used for node filtering and categorical treatment.

#![deny(unsafe_code)]

mod candidate;
mod error;
mod ontology;
mod operation;
mod profile;
mod table;
mod value_match;

pub use candidate::{Candidate, MatchStatus, MatcherEntry, QUADRANT_MATCHER};
pub use error::ModelError;
pub use ontology::{InMemoryOntology, TargetDescription, TargetOntology, reference_dictionary};
pub use operation::{Operation, OperationKind};
pub use profile::ColumnProfile;
pub use table::{Column, ColumnDtype, Table};
pub use value_match::{ValueMatchEntry, ValueMatchTable};
