use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, info};

use crate::{
    access::{self, Permission},
    error::AppError,
    graph::{Attrs, Direction, EdgeKind, GraphStore},
    model::{to_attrs, Entity, Note, User},
    request::{AddCollaborators, CreateNote, RemoveCollaborators, UpdateNote},
};

pub async fn create_note(
    store: &dyn GraphStore,
    user: &User,
    body: CreateNote,
) -> Result<Note, AppError> {
    body.validate()?;
    let now = Utc::now();
    let mut note = Note {
        id: String::new(),
        title: body.title,
        description: body.description,
        image: body.image,
        reminder: body.reminder,
        created_at: now,
        updated_at: now,
        user_id: user.id.clone(),
    };
    note.id = store.create_node(Note::KIND, to_attrs(&note)?).await?;

    // A note without its creator edge would be unreachable; drop it.
    if let Err(e) = store
        .connect(&user.id, &note.id, EdgeKind::Created, Attrs::new())
        .await
    {
        store.delete_node(Note::KIND, &note.id).await?;
        return Err(e.into());
    }
    debug!(note_id = %note.id, user_id = %user.id, "note created");
    Ok(note)
}

/// Notes the user created plus notes shared with them, oldest first.
pub async fn list_notes(store: &dyn GraphStore, user: &User) -> Result<Vec<Note>, AppError> {
    let owned = store
        .list_connected(&user.id, EdgeKind::Created, Direction::Outgoing, Note::KIND, None)
        .await?;
    let shared = store
        .list_connected(
            &user.id,
            EdgeKind::CollaboratedTo,
            Direction::Incoming,
            Note::KIND,
            None,
        )
        .await?;

    let mut by_id = HashMap::new();
    for node in owned.into_iter().chain(shared) {
        by_id.entry(node.id.clone()).or_insert(node);
    }
    let mut notes = by_id
        .into_values()
        .map(Note::from_node)
        .collect::<Result<Vec<_>, _>>()?;
    notes.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    Ok(notes)
}

pub async fn fetch_note(
    store: &dyn GraphStore,
    user: &User,
    note_id: &str,
) -> Result<Note, AppError> {
    let (note, _) = access::fetch_note(store, user, note_id, Permission::Read).await?;
    Ok(note)
}

/// Overwrites the fields present in `patch`. Owners and read-write
/// collaborators only; the creator reference never changes.
pub async fn update_note(
    store: &dyn GraphStore,
    user: &User,
    note_id: &str,
    patch: UpdateNote,
) -> Result<Note, AppError> {
    patch.validate()?;
    let (mut note, _) = access::fetch_note(store, user, note_id, Permission::Edit).await?;

    if let Some(title) = patch.title {
        note.title = title;
    }
    if let Some(description) = patch.description {
        note.description = description;
    }
    if let Some(image) = patch.image {
        note.image = image;
    }
    if let Some(reminder) = patch.reminder {
        note.reminder = reminder;
    }
    note.updated_at = Utc::now();

    let node = store
        .update_node(Note::KIND, &note.id, to_attrs(&note)?)
        .await?;
    Ok(Note::from_node(node)?)
}

pub async fn delete_note(store: &dyn GraphStore, user: &User, note_id: &str) -> Result<(), AppError> {
    let (note, _) = access::fetch_note(store, user, note_id, Permission::Manage).await?;
    store.delete_node(Note::KIND, &note.id).await?;
    info!(note_id = %note.id, user_id = %user.id, "note deleted");
    Ok(())
}

/// Shares the note with every listed user.
///
/// Targets are processed in order and the first unknown user aborts the
/// request; collaborators connected before it stay connected. Listing an
/// existing collaborator again only updates their access type.
pub async fn add_collaborators(
    store: &dyn GraphStore,
    user: &User,
    body: AddCollaborators,
) -> Result<(), AppError> {
    let (note, _) = access::fetch_note(store, user, &body.note_id, Permission::Manage).await?;

    for target in &body.user_id {
        if store.get_by_id(User::KIND, target).await?.is_none() {
            return Err(AppError::NotFound(format!("User {target} not found")));
        }
        if *target == user.id {
            debug!(note_id = %note.id, "owner listed as collaborator, skipped");
            continue;
        }
        store
            .connect(
                &note.id,
                target,
                EdgeKind::CollaboratedTo,
                body.access_type.edge_attrs(),
            )
            .await?;
    }
    info!(note_id = %note.id, count = body.user_id.len(), "collaborators added");
    Ok(())
}

/// Unshares the note. Users who were not collaborators are ignored.
pub async fn remove_collaborators(
    store: &dyn GraphStore,
    user: &User,
    body: RemoveCollaborators,
) -> Result<(), AppError> {
    let (note, _) = access::fetch_note(store, user, &body.note_id, Permission::Manage).await?;
    for target in &body.user_id {
        store
            .disconnect(&note.id, target, EdgeKind::CollaboratedTo)
            .await?;
    }
    Ok(())
}
