pub mod document;
pub mod graph;
pub mod handle;
pub mod message;
pub mod query;
pub mod reference;
pub mod specification;
pub mod todo;
pub mod vocab;

pub use document::{Alternative, JsonDocument};
pub use graph::{Edge, EdgeTarget, Property, Vertex};
pub use handle::{CollectionName, DocumentHandle};
pub use message::{IndexingMessage, QualifiedIndexingMessage};
pub use query::{Pagination, QueryRequest, QueryResult};
pub use reference::{InstanceReference, SchemaReference, Space, SubSpace};
pub use specification::{FieldFilter, FilterOp, SpecField, SpecTraverse, Specification};
pub use todo::{TodoItem, TodoList};
