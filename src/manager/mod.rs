//! Asynchronous analysis management.
//!
//! - [`AstManager`] - worker pool, single-flight builds, recent analyses
//! - [`AstConsumer`] - a query waiting for an analysis
//! - [`Responder`] - one-shot delivery of a query's outcome

mod ast_manager;
mod consumer;

pub use ast_manager::AstManager;
pub use consumer::{AstConsumer, QueryOutcome, Responder};
