pub mod arango;
pub mod memory;
pub mod repository;
pub mod traits;

pub use arango::ArangoStore;
pub use memory::MemoryGraphStore;
pub use repository::{HttpDocumentRepository, MemoryDocumentRepository};
pub use traits::{
    Credential, DocumentKind, DocumentRepository, FootprintEntry, GraphStore, QueryRows,
};
