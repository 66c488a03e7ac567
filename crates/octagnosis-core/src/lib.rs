//! octagnosis-core: attempt lifecycle, scoring, and collaborator traits.
//!
//! This crate defines the data model, the attempt session store, and the
//! personality scoring engine that the rest of octagnosis builds on.

pub mod engine;
pub mod error;
pub mod model;
pub mod parser;
pub mod registry;
pub mod results;
pub mod scoring;
pub mod session;
pub mod traits;
