use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::prelude::*;
use serde::Serialize;

use crate::model::{Label, Note, User};

/// Success envelope: `{message, status, data?}`.
#[derive(Serialize, Debug)]
pub struct ApiResponse<T: Serialize> {
    pub message: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status: StatusCode, message: &str, data: T) -> Self {
        ApiResponse {
            message: message.to_owned(),
            status: status.as_u16(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(status: StatusCode, message: &str) -> Self {
        ApiResponse {
            message: message.to_owned(),
            status: status.as_u16(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

/// Public view of a user; never carries the password hash.
#[derive(Serialize, Debug)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<i64>,
    pub location: Option<String>,
    pub is_superuser: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        UserResponse {
            id: user.id.to_owned(),
            username: user.username.to_owned(),
            email: user.email.to_owned(),
            first_name: user.first_name.to_owned(),
            last_name: user.last_name.to_owned(),
            phone: user.phone,
            location: user.location.to_owned(),
            is_superuser: user.is_superuser,
            is_verified: user.is_verified,
            created_at: user.created_at,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct LoginResponse {
    pub access: String,
}

#[derive(Serialize, Debug)]
pub struct NoteResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub reminder: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: String,
}

impl From<&Note> for NoteResponse {
    fn from(note: &Note) -> Self {
        NoteResponse {
            id: note.id.to_owned(),
            title: note.title.to_owned(),
            description: note.description.to_owned(),
            image: note.image.to_owned(),
            reminder: note.reminder,
            created_at: note.created_at,
            updated_at: note.updated_at,
            user_id: note.user_id.to_owned(),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct LabelResponse {
    pub id: String,
    pub name: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Label> for LabelResponse {
    fn from(label: &Label) -> Self {
        LabelResponse {
            id: label.id.to_owned(),
            name: label.name.to_owned(),
            user_id: label.user_id.to_owned(),
            created_at: label.created_at,
        }
    }
}
