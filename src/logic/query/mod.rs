pub mod aql;
pub mod compiler;
pub mod executor;

pub use compiler::{CompiledFilter, FieldSource, QueryField, TraversalQuery};
pub use executor::QueryProcessor;
