//! Schema inference from a sampled document.
//!
//! The remote API does not publish collection schemas, so the layout is
//! inferred from the first document of a collection. This is a heuristic:
//! - only top-level fields are described
//! - fields absent from the sample are not represented
//! - a field whose kind varies across documents is described by the
//!   sample's kind only

use crate::models::{FieldDescriptor, SchemaDescriptor, ValueKind};
use serde_json::Value;

/// Describes the top-level fields of `sample` in document order.
///
/// A non-object sample has no fields.
pub fn infer_fields(sample: &Value) -> Vec<FieldDescriptor> {
    match sample {
        Value::Object(map) => map
            .iter()
            .map(|(name, value)| FieldDescriptor {
                name: name.clone(),
                value_kind: ValueKind::of(value),
                has_value: !value.is_null(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Builds a descriptor from the first document of a one-document page.
pub fn describe_sample(
    collection: &str,
    total_docs: u64,
    sample: Option<Value>,
) -> SchemaDescriptor {
    let mut descriptor = SchemaDescriptor::empty(collection);
    descriptor.total_docs = total_docs;
    if let Some(doc) = sample {
        descriptor.fields = infer_fields(&doc);
        descriptor.sample_doc = Some(doc);
    }
    descriptor
}
