//! Stub collaborators and fixtures for testing graph nodes and the pipeline.
//!
//! Every stub records the calls it receives so tests can assert on how a node
//! used its collaborators, not only on the update it returned.

pub mod fixtures;
pub mod stubs;

pub use fixtures::*;
pub use stubs::*;
