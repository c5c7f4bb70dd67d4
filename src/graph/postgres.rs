use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, types::Json, FromRow, PgPool};
use tracing::info;

use super::{
    new_node_id, Attrs, Direction, EdgeKind, GraphStore, Node, NodeKind, StoreError,
};

/// Graph stored in two Postgres tables: `graph_nodes` holds every entity as
/// a JSONB attribute bag and `graph_edges` holds typed, attributed edges
/// keyed by `(from_id, to_id, kind)`. Deleting a node cascades its edges
/// through the foreign keys.
#[derive(Clone)]
pub struct PgGraph {
    pool: PgPool,
}

#[derive(FromRow)]
struct NodeRow {
    id: String,
    kind: String,
    attrs: Json<Attrs>,
}

impl TryFrom<NodeRow> for Node {
    type Error = StoreError;

    fn try_from(row: NodeRow) -> Result<Self, Self::Error> {
        let kind = NodeKind::parse(&row.kind).ok_or_else(|| StoreError::Backend(format!(
            "node {} has unknown kind {}",
            row.id, row.kind
        )))?;
        Ok(Node::new(row.id, kind, row.attrs.0))
    }
}

impl PgGraph {
    pub fn new(pool: PgPool) -> Self {
        PgGraph { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(format!("migration failed: {e}")))?;
        info!("graph schema is up to date");
        Ok(())
    }
}

fn conflict_or_backend(err: sqlx::Error, kind: NodeKind) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let constraint = db_err.constraint().unwrap_or_default();
            let field = kind
                .unique_fields()
                .iter()
                .find(|field| constraint.contains(**field))
                .copied()
                .unwrap_or("id");
            return StoreError::Conflict {
                kind,
                field: field.to_string(),
            };
        }
    }
    err.into()
}

#[async_trait]
impl GraphStore for PgGraph {
    async fn create_node(&self, kind: NodeKind, attrs: Attrs) -> Result<String, StoreError> {
        let id = new_node_id();
        sqlx::query("INSERT INTO graph_nodes (id, kind, attrs) VALUES ($1, $2, $3)")
            .bind(&id)
            .bind(kind.as_str())
            .bind(Json(&attrs))
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_or_backend(e, kind))?;
        Ok(id)
    }

    async fn get_by_id(&self, kind: NodeKind, id: &str) -> Result<Option<Node>, StoreError> {
        let row = sqlx::query_as::<_, NodeRow>(
            "SELECT id, kind, attrs FROM graph_nodes WHERE kind = $1 AND id = $2",
        )
        .bind(kind.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Node::try_from).transpose()
    }

    async fn get_by_unique_field(
        &self,
        kind: NodeKind,
        field: &str,
        value: &str,
    ) -> Result<Option<Node>, StoreError> {
        let row = sqlx::query_as::<_, NodeRow>(
            "SELECT id, kind, attrs FROM graph_nodes WHERE kind = $1 AND attrs ->> $2 = $3 LIMIT 1",
        )
        .bind(kind.as_str())
        .bind(field)
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Node::try_from).transpose()
    }

    async fn update_node(
        &self,
        kind: NodeKind,
        id: &str,
        attrs: Attrs,
    ) -> Result<Node, StoreError> {
        let row = sqlx::query_as::<_, NodeRow>(
            "UPDATE graph_nodes SET attrs = attrs || $3 WHERE kind = $1 AND id = $2 \
             RETURNING id, kind, attrs",
        )
        .bind(kind.as_str())
        .bind(id)
        .bind(Json(&attrs))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| conflict_or_backend(e, kind))?;
        match row {
            Some(row) => Node::try_from(row),
            None => Err(StoreError::NotFound(format!("{kind} {id}"))),
        }
    }

    async fn delete_node(&self, kind: NodeKind, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM graph_nodes WHERE kind = $1 AND id = $2")
            .bind(kind.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn connect(
        &self,
        from: &str,
        to: &str,
        edge: EdgeKind,
        attrs: Attrs,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO graph_edges (from_id, to_id, kind, attrs) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (from_id, to_id, kind) DO UPDATE SET attrs = EXCLUDED.attrs",
        )
        .bind(from)
        .bind(to)
        .bind(edge.as_str())
        .bind(Json(&attrs))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_foreign_key_violation() {
                    return StoreError::NotFound(format!("node {from} or {to}"));
                }
            }
            StoreError::from(e)
        })?;
        Ok(())
    }

    async fn disconnect(&self, from: &str, to: &str, edge: EdgeKind) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "DELETE FROM graph_edges WHERE from_id = $1 AND to_id = $2 AND kind = $3",
        )
        .bind(from)
        .bind(to)
        .bind(edge.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn is_connected(&self, from: &str, to: &str, edge: EdgeKind) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM graph_edges WHERE from_id = $1 AND to_id = $2 AND kind = $3)",
        )
        .bind(from)
        .bind(to)
        .bind(edge.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn edge_attrs(
        &self,
        from: &str,
        to: &str,
        edge: EdgeKind,
    ) -> Result<Option<Attrs>, StoreError> {
        let attrs: Option<Json<Attrs>> = sqlx::query_scalar(
            "SELECT attrs FROM graph_edges WHERE from_id = $1 AND to_id = $2 AND kind = $3",
        )
        .bind(from)
        .bind(to)
        .bind(edge.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(attrs.map(|json| json.0))
    }

    async fn list_connected(
        &self,
        id: &str,
        edge: EdgeKind,
        direction: Direction,
        kind: NodeKind,
        filter: Option<&Attrs>,
    ) -> Result<Vec<Node>, StoreError> {
        let sql = match direction {
            Direction::Outgoing => {
                "SELECT n.id, n.kind, n.attrs FROM graph_edges e \
                 JOIN graph_nodes n ON n.id = e.to_id \
                 WHERE e.from_id = $1 AND e.kind = $2 AND n.kind = $3 AND e.attrs @> $4"
            }
            Direction::Incoming => {
                "SELECT n.id, n.kind, n.attrs FROM graph_edges e \
                 JOIN graph_nodes n ON n.id = e.from_id \
                 WHERE e.to_id = $1 AND e.kind = $2 AND n.kind = $3 AND e.attrs @> $4"
            }
        };
        let empty = Attrs::new();
        let rows = sqlx::query_as::<_, NodeRow>(sql)
            .bind(id)
            .bind(edge.as_str())
            .bind(kind.as_str())
            .bind(Json(filter.unwrap_or(&empty)))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Node::try_from).collect()
    }
}
