//! Stream operators.
//!
//! Methods live directly on [`Observable`](crate::Observable); the modules
//! here only group their implementations.

pub mod merge;
pub mod transform;
