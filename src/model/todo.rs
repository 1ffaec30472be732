use crate::model::document::JsonDocument;
use crate::model::handle::DocumentHandle;
use crate::model::reference::Space;

/// One graph mutation of an execution plan.
#[derive(Debug, Clone, PartialEq)]
pub enum TodoItem {
    UpsertVertex {
        space: Space,
        handle: DocumentHandle,
        document: JsonDocument,
    },
    UpsertEdge {
        space: Space,
        handle: DocumentHandle,
        from: String,
        to: String,
        document: JsonDocument,
    },
    DeleteVertex {
        space: Space,
        handle: DocumentHandle,
    },
    DeleteEdge {
        space: Space,
        handle: DocumentHandle,
    },
}

impl TodoItem {
    pub fn space(&self) -> Space {
        match self {
            TodoItem::UpsertVertex { space, .. }
            | TodoItem::UpsertEdge { space, .. }
            | TodoItem::DeleteVertex { space, .. }
            | TodoItem::DeleteEdge { space, .. } => *space,
        }
    }

    pub fn handle(&self) -> &DocumentHandle {
        match self {
            TodoItem::UpsertVertex { handle, .. }
            | TodoItem::UpsertEdge { handle, .. }
            | TodoItem::DeleteVertex { handle, .. }
            | TodoItem::DeleteEdge { handle, .. } => handle,
        }
    }
}

/// Ordered execution plan accumulated by the indexing controllers and
/// committed as a single transaction. Replaying the items in order is
/// idempotent: a later operation on the same handle wins.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TodoList {
    items: Vec<TodoItem>,
}

impl TodoList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: TodoItem) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TodoItem> {
        self.items.iter()
    }
}
