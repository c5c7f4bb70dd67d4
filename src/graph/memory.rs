use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    attrs_contain, new_node_id, Attrs, Direction, EdgeKind, GraphStore, Node, NodeKind,
    StoreError,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EdgeKey {
    from: String,
    to: String,
    kind: EdgeKind,
}

impl EdgeKey {
    fn new(from: &str, to: &str, kind: EdgeKind) -> Self {
        EdgeKey {
            from: from.to_owned(),
            to: to.to_owned(),
            kind,
        }
    }
}

#[derive(Default)]
struct Graph {
    nodes: HashMap<String, Node>,
    edges: HashMap<EdgeKey, Attrs>,
}

impl Graph {
    fn check_unique(&self, kind: NodeKind, id: &str, attrs: &Attrs) -> Result<(), StoreError> {
        for field in kind.unique_fields() {
            let Some(value) = attrs.get(*field) else {
                continue;
            };
            let taken = self
                .nodes
                .values()
                .any(|n| n.kind == kind && n.id != id && n.attrs.get(*field) == Some(value));
            if taken {
                return Err(StoreError::Conflict {
                    kind,
                    field: field.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Graph kept entirely in process memory behind one lock, so every call
/// is atomic with respect to every other.
#[derive(Default)]
pub struct MemoryGraph {
    inner: RwLock<Graph>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn edge_count(&self) -> usize {
        self.inner.read().await.edges.len()
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn create_node(&self, kind: NodeKind, attrs: Attrs) -> Result<String, StoreError> {
        let mut graph = self.inner.write().await;
        let id = new_node_id();
        graph.check_unique(kind, &id, &attrs)?;
        graph.nodes.insert(id.clone(), Node::new(id.clone(), kind, attrs));
        Ok(id)
    }

    async fn get_by_id(&self, kind: NodeKind, id: &str) -> Result<Option<Node>, StoreError> {
        let graph = self.inner.read().await;
        Ok(graph.nodes.get(id).filter(|n| n.kind == kind).cloned())
    }

    async fn get_by_unique_field(
        &self,
        kind: NodeKind,
        field: &str,
        value: &str,
    ) -> Result<Option<Node>, StoreError> {
        let graph = self.inner.read().await;
        Ok(graph
            .nodes
            .values()
            .find(|n| n.kind == kind && n.attrs.get(field).and_then(|v| v.as_str()) == Some(value))
            .cloned())
    }

    async fn update_node(
        &self,
        kind: NodeKind,
        id: &str,
        attrs: Attrs,
    ) -> Result<Node, StoreError> {
        let mut graph = self.inner.write().await;
        let mut merged = match graph.nodes.get(id) {
            Some(node) if node.kind == kind => node.attrs.clone(),
            _ => return Err(StoreError::NotFound(format!("{kind} {id}"))),
        };
        merged.extend(attrs);
        graph.check_unique(kind, id, &merged)?;
        let node = Node::new(id, kind, merged);
        graph.nodes.insert(id.to_owned(), node.clone());
        Ok(node)
    }

    async fn delete_node(&self, kind: NodeKind, id: &str) -> Result<bool, StoreError> {
        let mut graph = self.inner.write().await;
        if !graph.nodes.get(id).is_some_and(|n| n.kind == kind) {
            return Ok(false);
        }
        graph.nodes.remove(id);
        graph.edges.retain(|key, _| key.from != id && key.to != id);
        Ok(true)
    }

    async fn connect(
        &self,
        from: &str,
        to: &str,
        edge: EdgeKind,
        attrs: Attrs,
    ) -> Result<(), StoreError> {
        let mut graph = self.inner.write().await;
        for id in [from, to] {
            if !graph.nodes.contains_key(id) {
                return Err(StoreError::NotFound(format!("node {id}")));
            }
        }
        graph.edges.insert(EdgeKey::new(from, to, edge), attrs);
        Ok(())
    }

    async fn disconnect(&self, from: &str, to: &str, edge: EdgeKind) -> Result<bool, StoreError> {
        let mut graph = self.inner.write().await;
        Ok(graph.edges.remove(&EdgeKey::new(from, to, edge)).is_some())
    }

    async fn is_connected(&self, from: &str, to: &str, edge: EdgeKind) -> Result<bool, StoreError> {
        let graph = self.inner.read().await;
        Ok(graph.edges.contains_key(&EdgeKey::new(from, to, edge)))
    }

    async fn edge_attrs(
        &self,
        from: &str,
        to: &str,
        edge: EdgeKind,
    ) -> Result<Option<Attrs>, StoreError> {
        let graph = self.inner.read().await;
        Ok(graph.edges.get(&EdgeKey::new(from, to, edge)).cloned())
    }

    async fn list_connected(
        &self,
        id: &str,
        edge: EdgeKind,
        direction: Direction,
        kind: NodeKind,
        filter: Option<&Attrs>,
    ) -> Result<Vec<Node>, StoreError> {
        let graph = self.inner.read().await;
        let nodes = graph
            .edges
            .iter()
            .filter(|(key, attrs)| key.kind == edge && attrs_contain(attrs, filter))
            .filter_map(|(key, _)| match direction {
                Direction::Outgoing if key.from == id => Some(&key.to),
                Direction::Incoming if key.to == id => Some(&key.from),
                _ => None,
            })
            .filter_map(|other| graph.nodes.get(other))
            .filter(|n| n.kind == kind)
            .cloned()
            .collect();
        Ok(nodes)
    }
}
