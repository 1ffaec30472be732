use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::document::JsonDocument;
use crate::model::reference::{InstanceReference, Space};

/// Pagination window, only ever applied at the outermost query scope.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pagination {
    pub start: Option<u64>,
    pub size: Option<u64>,
}

impl Pagination {
    pub fn new(start: Option<u64>, size: Option<u64>) -> Self {
        Self { start, size }
    }
}

/// Caller-side knobs of one query execution.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryRequest {
    /// Which graph projection to read from.
    pub space: Space,
    pub pagination: Pagination,
    /// Optional free-text term matched against the display name property.
    pub search_term: Option<String>,
    /// Optional organization restriction, intersected with the caller's
    /// readable organizations.
    pub organizations: Option<Vec<String>>,
    /// Restrict the query to a single instance.
    pub instance: Option<InstanceReference>,
    /// Values for parameterized field filters.
    pub parameters: HashMap<String, String>,
    /// Re-frame results under the specification's original context.
    pub use_original_context: bool,
}

/// Result envelope of one executed query. An empty result list is a valid
/// answer, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Number of matching rows before pagination.
    pub total: u64,
    /// Number of rows returned in this window.
    pub size: u64,
    pub start: u64,
    pub results: Vec<JsonDocument>,
}

