//! Schema Inference Module
//!
//! Projects a relational column set out of schema-less documents.
//! Two strategies:
//! - FirstDocumentStrategy: columns of the first document only (row cursors
//!   use it on their lookahead row)
//! - SampleUnionStrategy: union of every attribute across a sample (the
//!   metadata catalog uses it)
//!
//! Inference over a sample is an approximation: attributes that only occur
//! outside the sample are not reported.

use std::collections::HashMap;

use log::debug;

use crate::core::{ColumnDescriptor, Document, DriverError, Result, TypeTag};
use crate::store::DocumentStore;

/// Trait for schema inference strategies (Strategy Pattern)
pub trait SchemaInferenceStrategy: Send + Sync {
    /// Ordered columns for the given documents; empty input gives no columns.
    fn infer_columns(&self, documents: &[Document]) -> Vec<ColumnDescriptor>;
}

/// Columns of the first document, in its attribute order.
#[derive(Debug, Clone, Default)]
pub struct FirstDocumentStrategy;

impl SchemaInferenceStrategy for FirstDocumentStrategy {
    fn infer_columns(&self, documents: &[Document]) -> Vec<ColumnDescriptor> {
        documents
            .first()
            .map(columns_of_document)
            .unwrap_or_default()
    }
}

pub(crate) fn columns_of_document(document: &Document) -> Vec<ColumnDescriptor> {
    document
        .iter()
        .enumerate()
        .map(|(i, (name, value))| ColumnDescriptor::new(name.clone(), i + 1, value))
        .collect()
}

/// Union of attributes across all documents.
///
/// Ordinals follow first observation across the scan. The type is the one of
/// the last non-null value seen; attributes that were only ever null are
/// reported as strings.
#[derive(Debug, Clone, Default)]
pub struct SampleUnionStrategy;

impl SchemaInferenceStrategy for SampleUnionStrategy {
    fn infer_columns(&self, documents: &[Document]) -> Vec<ColumnDescriptor> {
        let mut columns: Vec<ColumnDescriptor> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for doc in documents {
            for (name, value) in doc {
                match positions.get(name) {
                    Some(&pos) => {
                        if !value.is_null() {
                            let ordinal = columns[pos].ordinal;
                            columns[pos] = ColumnDescriptor::new(name.clone(), ordinal, value);
                        }
                    }
                    None => {
                        positions.insert(name.clone(), columns.len());
                        let ordinal = columns.len() + 1;
                        columns.push(ColumnDescriptor::new(name.clone(), ordinal, value));
                    }
                }
            }
        }

        columns
            .into_iter()
            .map(|col| match col.type_tag {
                TypeTag::Null => col.with_type(TypeTag::String),
                _ => col,
            })
            .collect()
    }
}

/// How many documents to draw from a collection when inferring its schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleSize {
    Bounded(usize),
    Unbounded,
}

impl SampleSize {
    /// Zero or negative means no bound.
    pub fn from_setting(setting: i64) -> Self {
        if setting > 0 {
            Self::Bounded(setting as usize)
        } else {
            Self::Unbounded
        }
    }

    pub fn limit(&self) -> Option<usize> {
        match self {
            Self::Bounded(n) => Some(*n),
            Self::Unbounded => None,
        }
    }
}

impl Default for SampleSize {
    fn default() -> Self {
        Self::Bounded(1000)
    }
}

/// Samples collections through a store and runs a strategy over the sample.
pub struct SchemaInferenceEngine {
    strategy: Box<dyn SchemaInferenceStrategy>,
    sample_size: SampleSize,
}

impl SchemaInferenceEngine {
    /// Create engine with a specific strategy
    pub fn with_strategy(strategy: Box<dyn SchemaInferenceStrategy>, sample_size: SampleSize) -> Self {
        Self {
            strategy,
            sample_size,
        }
    }

    /// Union over up to `sample_size` documents.
    pub fn new(sample_size: SampleSize) -> Self {
        Self::with_strategy(Box::new(SampleUnionStrategy), sample_size)
    }

    pub fn sample_size(&self) -> SampleSize {
        self.sample_size
    }

    pub fn infer_columns(&self, documents: &[Document]) -> Vec<ColumnDescriptor> {
        self.strategy.infer_columns(documents)
    }

    /// Infer the column schema of `collection` in `database`.
    ///
    /// Any store failure comes back as a metadata retrieval error.
    pub fn infer_collection(
        &self,
        store: &dyn DocumentStore,
        database: &str,
        collection: &str,
    ) -> Result<Vec<ColumnDescriptor>> {
        let sample = store
            .sample_documents(database, collection, self.sample_size.limit())
            .map_err(|e| {
                DriverError::MetadataRetrievalError(format!(
                    "failed to sample collection '{}': {}",
                    collection, e
                ))
            })?;

        let columns = self.infer_columns(&sample);
        debug!(
            "inferred {} column(s) for '{}' from {} sampled document(s)",
            columns.len(),
            collection,
            sample.len()
        );
        Ok(columns)
    }
}

impl Default for SchemaInferenceEngine {
    fn default() -> Self {
        Self::new(SampleSize::default())
    }
}
