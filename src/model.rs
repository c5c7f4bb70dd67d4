//! Typed entities and their mapping to and from graph nodes.
//!
//! A node's id lives outside its attribute map, so [`Entity::from_node`]
//! folds it back in before deserializing, and [`to_attrs`] strips it when
//! writing.

use chrono::prelude::*;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

use crate::graph::{Attrs, Node, NodeKind, StoreError};

pub trait Entity: DeserializeOwned {
    const KIND: NodeKind;

    fn from_node(node: Node) -> Result<Self, StoreError> {
        let Node { id, kind, mut attrs } = node;
        if kind != Self::KIND {
            return Err(StoreError::Corrupt {
                kind: Self::KIND,
                id,
                reason: format!("expected a {} node, found {kind}", Self::KIND),
            });
        }
        attrs.insert("id".to_owned(), Value::String(id.clone()));
        serde_json::from_value(Value::Object(attrs)).map_err(|e| StoreError::Corrupt {
            kind,
            id,
            reason: e.to_string(),
        })
    }
}

/// Serializes `value` into a node attribute map, dropping any `id` field.
pub fn to_attrs<T: Serialize>(value: &T) -> Result<Attrs, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(mut attrs)) => {
            attrs.remove("id");
            Ok(attrs)
        }
        Ok(other) => Err(StoreError::Backend(format!(
            "expected an attribute map, got {other}"
        ))),
        Err(e) => Err(StoreError::Backend(e.to_string())),
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(rename = "password")]
    pub password_hash: String,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<i64>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl Entity for User {
    const KIND: NodeKind = NodeKind::User;
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Note {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub reminder: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: String,
}

impl Entity for Note {
    const KIND: NodeKind = NodeKind::Note;
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Label {
    pub id: String,
    pub name: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl Entity for Label {
    const KIND: NodeKind = NodeKind::Label;
}

/// Access granted by a collaborator edge.
#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AccessType {
    #[default]
    ReadOnly,
    ReadWrite,
}

impl AccessType {
    pub const EDGE_ATTR: &'static str = "access_type";

    pub fn edge_attrs(self) -> Attrs {
        let mut attrs = Attrs::new();
        attrs.insert(Self::EDGE_ATTR.to_owned(), json!(self));
        attrs
    }

    /// Reads the access type off a collaborator edge. Edges without a
    /// recognised value grant read-only access.
    pub fn from_edge(attrs: &Attrs) -> Self {
        attrs
            .get(Self::EDGE_ATTR)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default()
    }
}
