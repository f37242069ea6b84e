//! Document Projection Module
//!
//! Turns schema-less documents into relational shapes: typed scalar values
//! on demand and column schemas inferred from samples.
//!
//! # Architecture
//!
//! - `converter.rs` - value coercion into scalar targets (`FromValue`)
//! - `schema_inference.rs` - strategy pattern for column discovery

pub mod converter;
pub mod schema_inference;

pub use converter::FromValue;
pub use schema_inference::{
    FirstDocumentStrategy, SampleSize, SampleUnionStrategy, SchemaInferenceEngine,
    SchemaInferenceStrategy,
};
