//! Who may do what with a note or a label.
//!
//! Note access is resolved from the graph: the `CREATED` edge from a user
//! makes them the owner, otherwise a `COLLABORATED_TO` edge from the note
//! grants the level stored in its `access_type`. Labels have no sharing;
//! only their creator can see them.
//!
//! A caller lacking the required access gets the same `NotFound` as a
//! caller asking for an id that does not exist.

use crate::{
    error::AppError,
    graph::{EdgeKind, GraphStore},
    model::{AccessType, Entity, Label, Note, User},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    Owner,
    CollaboratorReadWrite,
    CollaboratorReadOnly,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Fetch and list.
    Read,
    /// Change title, description, image or reminder.
    Edit,
    /// Delete the note or change who it is shared with.
    Manage,
}

impl AccessLevel {
    pub fn allows(self, permission: Permission) -> bool {
        match permission {
            Permission::Read => self != AccessLevel::None,
            Permission::Edit => matches!(
                self,
                AccessLevel::Owner | AccessLevel::CollaboratorReadWrite
            ),
            Permission::Manage => self == AccessLevel::Owner,
        }
    }
}

impl From<AccessType> for AccessLevel {
    fn from(access: AccessType) -> Self {
        match access {
            AccessType::ReadOnly => AccessLevel::CollaboratorReadOnly,
            AccessType::ReadWrite => AccessLevel::CollaboratorReadWrite,
        }
    }
}

pub async fn note_access(
    store: &dyn GraphStore,
    user_id: &str,
    note_id: &str,
) -> Result<AccessLevel, AppError> {
    if store.is_connected(user_id, note_id, EdgeKind::Created).await? {
        return Ok(AccessLevel::Owner);
    }
    let level = store
        .edge_attrs(note_id, user_id, EdgeKind::CollaboratedTo)
        .await?
        .map_or(AccessLevel::None, |attrs| AccessType::from_edge(&attrs).into());
    Ok(level)
}

fn note_not_found() -> AppError {
    AppError::NotFound("Note not found".to_string())
}

/// Loads a note the user holds `permission` on, along with their level.
pub async fn fetch_note(
    store: &dyn GraphStore,
    user: &User,
    note_id: &str,
    permission: Permission,
) -> Result<(Note, AccessLevel), AppError> {
    let node = store
        .get_by_id(Note::KIND, note_id)
        .await?
        .ok_or_else(note_not_found)?;
    let level = note_access(store, &user.id, note_id).await?;
    if !level.allows(permission) {
        return Err(note_not_found());
    }
    Ok((Note::from_node(node)?, level))
}

/// Loads a label created by the user.
pub async fn fetch_label(
    store: &dyn GraphStore,
    user: &User,
    label_id: &str,
) -> Result<Label, AppError> {
    let not_found = || AppError::NotFound("Label not found".to_string());
    let node = store
        .get_by_id(Label::KIND, label_id)
        .await?
        .ok_or_else(not_found)?;
    if !store.is_connected(&user.id, label_id, EdgeKind::Created).await? {
        return Err(not_found());
    }
    Ok(Label::from_node(node)?)
}
