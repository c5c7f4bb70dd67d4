use chrono::Utc;
use tracing::info;

use crate::{
    access::{self, Permission},
    error::AppError,
    graph::{Attrs, Direction, EdgeKind, GraphStore},
    model::{to_attrs, Entity, Label, User},
    request::{LabelBody, LabelLink},
};

pub async fn create_label(
    store: &dyn GraphStore,
    user: &User,
    body: LabelBody,
) -> Result<Label, AppError> {
    body.validate()?;
    let mut label = Label {
        id: String::new(),
        name: body.name,
        user_id: user.id.clone(),
        created_at: Utc::now(),
    };
    label.id = store.create_node(Label::KIND, to_attrs(&label)?).await?;

    if let Err(e) = store
        .connect(&user.id, &label.id, EdgeKind::Created, Attrs::new())
        .await
    {
        store.delete_node(Label::KIND, &label.id).await?;
        return Err(e.into());
    }
    Ok(label)
}

pub async fn list_labels(store: &dyn GraphStore, user: &User) -> Result<Vec<Label>, AppError> {
    let mut labels = store
        .list_connected(&user.id, EdgeKind::Created, Direction::Outgoing, Label::KIND, None)
        .await?
        .into_iter()
        .map(Label::from_node)
        .collect::<Result<Vec<_>, _>>()?;
    labels.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    Ok(labels)
}

pub async fn fetch_label(
    store: &dyn GraphStore,
    user: &User,
    label_id: &str,
) -> Result<Label, AppError> {
    access::fetch_label(store, user, label_id).await
}

pub async fn update_label(
    store: &dyn GraphStore,
    user: &User,
    label_id: &str,
    body: LabelBody,
) -> Result<Label, AppError> {
    body.validate()?;
    let mut label = access::fetch_label(store, user, label_id).await?;
    label.name = body.name;
    let node = store
        .update_node(Label::KIND, &label.id, to_attrs(&label)?)
        .await?;
    Ok(Label::from_node(node)?)
}

/// Deletes the label and detaches it from every note.
pub async fn delete_label(
    store: &dyn GraphStore,
    user: &User,
    label_id: &str,
) -> Result<(), AppError> {
    let label = access::fetch_label(store, user, label_id).await?;
    store.delete_node(Label::KIND, &label.id).await?;
    info!(label_id = %label.id, user_id = %user.id, "label deleted");
    Ok(())
}

/// Tags a note the user can read with one of their own labels.
pub async fn associate(
    store: &dyn GraphStore,
    user: &User,
    link: LabelLink,
) -> Result<(), AppError> {
    let (note, _) = access::fetch_note(store, user, &link.note_id, Permission::Read).await?;
    let label = access::fetch_label(store, user, &link.label_id).await?;
    store
        .connect(&note.id, &label.id, EdgeKind::HasLabel, Attrs::new())
        .await?;
    Ok(())
}

pub async fn disassociate(
    store: &dyn GraphStore,
    user: &User,
    link: LabelLink,
) -> Result<(), AppError> {
    let (note, _) = access::fetch_note(store, user, &link.note_id, Permission::Read).await?;
    let label = access::fetch_label(store, user, &link.label_id).await?;
    store
        .disconnect(&note.id, &label.id, EdgeKind::HasLabel)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{graph::MemoryGraph, request::CreateNote, service::note};

    async fn user(store: &MemoryGraph, username: &str) -> User {
        let mut user = User {
            id: String::new(),
            username: username.to_owned(),
            password_hash: "x".to_owned(),
            email: format!("{username}@x.com"),
            first_name: None,
            last_name: None,
            phone: None,
            location: None,
            is_superuser: false,
            is_verified: true,
            created_at: Utc::now(),
        };
        user.id = store
            .create_node(User::KIND, to_attrs(&user).unwrap())
            .await
            .unwrap();
        user
    }

    fn named(name: &str) -> LabelBody {
        LabelBody {
            name: name.to_owned(),
        }
    }

    #[tokio::test]
    async fn labels_are_private_to_their_creator() {
        let store = MemoryGraph::new();
        let alice = user(&store, "alice").await;
        let bob = user(&store, "bob").await;
        let label = create_label(&store, &alice, named("work")).await.unwrap();

        assert_eq!(fetch_label(&store, &alice, &label.id).await.unwrap().name, "work");
        assert!(matches!(
            fetch_label(&store, &bob, &label.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(update_label(&store, &bob, &label.id, named("mine")).await.is_err());
        assert!(delete_label(&store, &bob, &label.id).await.is_err());
        assert!(list_labels(&store, &bob).await.unwrap().is_empty());
        assert_eq!(list_labels(&store, &alice).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn association_is_idempotent_both_ways() {
        let store = MemoryGraph::new();
        let alice = user(&store, "alice").await;
        let label = create_label(&store, &alice, named("work")).await.unwrap();
        let note = note::create_note(
            &store,
            &alice,
            CreateNote {
                title: "T".into(),
                description: "D".into(),
                image: None,
                reminder: None,
            },
        )
        .await
        .unwrap();
        let link = || LabelLink {
            note_id: note.id.clone(),
            label_id: label.id.clone(),
        };

        associate(&store, &alice, link()).await.unwrap();
        associate(&store, &alice, link()).await.unwrap();
        assert!(store
            .is_connected(&note.id, &label.id, EdgeKind::HasLabel)
            .await
            .unwrap());
        // two creator edges + one label edge
        assert_eq!(store.edge_count().await, 3);

        disassociate(&store, &alice, link()).await.unwrap();
        disassociate(&store, &alice, link()).await.unwrap();
        assert_eq!(store.edge_count().await, 2);
    }

    #[tokio::test]
    async fn deleting_a_label_detaches_it_from_notes() {
        let store = MemoryGraph::new();
        let alice = user(&store, "alice").await;
        let label = create_label(&store, &alice, named("work")).await.unwrap();
        let note = note::create_note(
            &store,
            &alice,
            CreateNote {
                title: "T".into(),
                description: "D".into(),
                image: None,
                reminder: None,
            },
        )
        .await
        .unwrap();
        associate(
            &store,
            &alice,
            LabelLink {
                note_id: note.id.clone(),
                label_id: label.id.clone(),
            },
        )
        .await
        .unwrap();

        delete_label(&store, &alice, &label.id).await.unwrap();
        assert!(!store
            .is_connected(&note.id, &label.id, EdgeKind::HasLabel)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn cannot_label_a_note_without_access() {
        let store = MemoryGraph::new();
        let alice = user(&store, "alice").await;
        let bob = user(&store, "bob").await;
        let label = create_label(&store, &bob, named("spy")).await.unwrap();
        let note = note::create_note(
            &store,
            &alice,
            CreateNote {
                title: "T".into(),
                description: "D".into(),
                image: None,
                reminder: None,
            },
        )
        .await
        .unwrap();

        let err = associate(
            &store,
            &bob,
            LabelLink {
                note_id: note.id.clone(),
                label_id: label.id.clone(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "Note not found"));
    }
}
