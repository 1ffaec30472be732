use serde_json::Value;

/// One named value captured on a vertex or an edge during transformation.
/// Synthesized identifiers and inherited flags are recorded as properties as
/// well so the inheritance is visible in the stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub value: Value,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Where an edge points. Embedded targets live in the same transformation
/// arena and are addressed by their synthesized id; external targets carry
/// the explicit identifier of a document outside this instance.
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeTarget {
    Embedded { vertex_id: String },
    External { reference: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    /// Qualified name of the property the edge was built from.
    pub name: String,
    pub target: EdgeTarget,
    /// Position inside an ordered list, when the edge came out of one.
    pub order_number: Option<usize>,
    pub properties: Vec<Property>,
}

impl Edge {
    /// An edge is external when the source object carried an explicit
    /// identifier instead of being an inline nested object.
    pub fn is_external(&self) -> bool {
        matches!(self.target, EdgeTarget::External { .. })
    }

    /// The identifier the edge points at, embedded or external.
    pub fn reference(&self) -> &str {
        match &self.target {
            EdgeTarget::Embedded { vertex_id } => vertex_id,
            EdgeTarget::External { reference } => reference,
        }
    }
}

/// One vertex of the transformed property graph, holding its outgoing edges.
/// Vertices are collected into a flat arena in creation order; the first
/// entry is the instance's root vertex.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Vertex {
    /// Type label resolving the target collection.
    pub vertex_type: Option<String>,
    pub id: Option<String>,
    pub uuid: Option<String>,
    pub revision: Option<u64>,
    pub deprecated: Option<bool>,
    pub properties: Vec<Property>,
    pub edges: Vec<Edge>,
}

impl Vertex {
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }

    pub fn add_property(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.properties.push(Property::new(name, value));
    }
}
