//! cascade-node: cascading performance plans (RHK) over a staff hierarchy
//!
//! Plans are owned by staff members and cascade down the reporting line:
//! a plan may only be intervened into a direct subordinate of its owner.
//! Data lives either in a process-local store seeded with demo data or in a
//! remote PostgREST backend; either way readers see immutable snapshots that
//! are rebuilt after every write.

pub mod assist;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod demo;
pub mod error;
pub mod gateway;
pub mod goals;
pub mod import;
pub mod model;
pub mod org;
pub mod session;
pub mod store;
pub mod summary;
pub mod traversal;
pub mod workflow;

pub use error::{CascadeError, Result};
