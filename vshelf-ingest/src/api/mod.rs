//! HTTP API handlers for vshelf-ingest
//!
//! Thin layer over the orchestrator and librarian; the pipeline does not
//! depend on it.

pub mod collections;
pub mod health;
pub mod ingest;

pub use collections::collection_routes;
pub use health::health_routes;
pub use ingest::ingest_routes;
