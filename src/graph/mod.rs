//! Graph store contract.
//!
//! Users, notes and labels are stored as generic [`Node`]s carrying a JSON
//! attribute map, connected by typed edges that may carry attributes of
//! their own (the collaborator `access_type`, for instance). The rest of the
//! crate only talks to storage through [`GraphStore`], so the in-memory
//! graph used by tests and the Postgres graph used in production are
//! interchangeable.

use std::fmt;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub mod memory;
pub mod postgres;

pub use memory::MemoryGraph;
pub use postgres::PgGraph;

pub type Attrs = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    User,
    Note,
    Label,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::User => "user",
            NodeKind::Note => "note",
            NodeKind::Label => "label",
        }
    }

    /// Attributes whose values must be unique among nodes of this kind.
    pub fn unique_fields(&self) -> &'static [&'static str] {
        match self {
            NodeKind::User => &["username", "email"],
            NodeKind::Note | NodeKind::Label => &[],
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(NodeKind::User),
            "note" => Some(NodeKind::Note),
            "label" => Some(NodeKind::Label),
            _ => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// User -> Note or User -> Label.
    Created,
    /// Note -> User, attributed with `access_type`.
    CollaboratedTo,
    /// Note -> Label.
    HasLabel,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Created => "CREATED",
            EdgeKind::CollaboratedTo => "COLLABORATED_TO",
            EdgeKind::HasLabel => "HAS_LABEL",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub attrs: Attrs,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind, attrs: Attrs) -> Self {
        Node {
            id: id.into(),
            kind,
            attrs,
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("A {kind} with this {field} already exists")]
    Conflict { kind: NodeKind, field: String },
    #[error("{0} not found")]
    NotFound(String),
    #[error("Stored {kind} {id} is malformed: {reason}")]
    Corrupt {
        kind: NodeKind,
        id: String,
        reason: String,
    },
    #[error("Database error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

pub fn new_node_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Node and relationship operations the application needs.
///
/// Each call is atomic: concurrent readers never observe half of a node
/// write or a partially written edge.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Creates a node and returns its generated id. Fails with
    /// [`StoreError::Conflict`] when a unique attribute is already taken.
    async fn create_node(&self, kind: NodeKind, attrs: Attrs) -> Result<String, StoreError>;

    async fn get_by_id(&self, kind: NodeKind, id: &str) -> Result<Option<Node>, StoreError>;

    async fn get_by_unique_field(
        &self,
        kind: NodeKind,
        field: &str,
        value: &str,
    ) -> Result<Option<Node>, StoreError>;

    /// Merges `attrs` into the stored attributes and returns the result.
    async fn update_node(&self, kind: NodeKind, id: &str, attrs: Attrs)
        -> Result<Node, StoreError>;

    /// Deletes the node together with every edge touching it. Returns
    /// `false` when there was nothing to delete.
    async fn delete_node(&self, kind: NodeKind, id: &str) -> Result<bool, StoreError>;

    /// Creates the edge, or replaces its attributes if it already exists.
    async fn connect(
        &self,
        from: &str,
        to: &str,
        edge: EdgeKind,
        attrs: Attrs,
    ) -> Result<(), StoreError>;

    async fn disconnect(&self, from: &str, to: &str, edge: EdgeKind) -> Result<bool, StoreError>;

    async fn is_connected(&self, from: &str, to: &str, edge: EdgeKind) -> Result<bool, StoreError>;

    async fn edge_attrs(
        &self,
        from: &str,
        to: &str,
        edge: EdgeKind,
    ) -> Result<Option<Attrs>, StoreError>;

    /// Nodes of `kind` one `edge` hop away from `id`. When `filter` is given
    /// only edges whose attributes contain every filter entry are followed.
    async fn list_connected(
        &self,
        id: &str,
        edge: EdgeKind,
        direction: Direction,
        kind: NodeKind,
        filter: Option<&Attrs>,
    ) -> Result<Vec<Node>, StoreError>;
}

pub(crate) fn attrs_contain(attrs: &Attrs, filter: Option<&Attrs>) -> bool {
    filter.map_or(true, |filter| {
        filter
            .iter()
            .all(|(key, value)| attrs.get(key) == Some(value))
    })
}
