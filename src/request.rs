use axum::{
    extract::{FromRequest, FromRequestParts},
    Json,
};
use chrono::prelude::*;
use serde::{Deserialize, Deserializer};

use crate::{error::AppError, model::AccessType};

/// `Json` whose rejections come back as `{message, status}` like every other error.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// `Query` with the same rejection shape as [`AppJson`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

const MAX_NAME_LEN: usize = 100;
const MAX_PASSWORD_LEN: usize = 255;
const MIN_RESET_PASSWORD_LEN: usize = 8;

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::BadRequest(message.into())
}

fn require_text(field: &str, value: &str, max: usize) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(bad_request(format!("{field} is required")));
    }
    if value.chars().count() > max {
        return Err(bad_request(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

/// A timestamp with a UTC offset, or a bare one that is read as UTC.
#[derive(Deserialize)]
#[serde(untagged)]
enum Timestamp {
    Zoned(DateTime<Utc>),
    Naive(NaiveDateTime),
}

impl Timestamp {
    fn into_utc(self) -> DateTime<Utc> {
        match self {
            Timestamp::Zoned(at) => at,
            Timestamp::Naive(at) => Utc.from_utc_datetime(&at),
        }
    }
}

fn reminder<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Timestamp>::deserialize(deserializer)?.map(Timestamp::into_utc))
}

/// `None` when the field is absent, `Some(None)` for an explicit `null`.
/// Missing fields fall back through `#[serde(default)]`.
fn provided<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::<T>::deserialize(deserializer)?))
}

fn provided_reminder<'de, D>(deserializer: D) -> Result<Option<Option<DateTime<Utc>>>, D::Error>
where
    D: Deserializer<'de>,
{
    reminder(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct RegisterUser {
    pub username: String,
    pub password: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<i64>,
    pub location: Option<String>,
    pub admin_key: Option<String>,
}

impl RegisterUser {
    pub fn validate(&self) -> Result<(), AppError> {
        let username_ok = self.username.len() >= 4
            && self.username.len() <= MAX_NAME_LEN
            && self.username.chars().all(|c| c.is_ascii_alphanumeric());
        if !username_ok {
            return Err(bad_request(
                "username must be at least 4 letters or digits and at most 100",
            ));
        }
        if self.password.is_empty() || self.password.len() > MAX_PASSWORD_LEN {
            return Err(bad_request("password must be between 1 and 255 characters"));
        }
        let email_ok = self
            .email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
        if !email_ok {
            return Err(bad_request("email is not a valid address"));
        }
        for (field, value) in [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("location", &self.location),
        ] {
            if value.as_ref().is_some_and(|v| v.chars().count() > MAX_NAME_LEN) {
                return Err(bad_request(format!(
                    "{field} must be at most {MAX_NAME_LEN} characters"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginUser {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

impl TokenQuery {
    pub fn require(self) -> Result<String, AppError> {
        self.token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| bad_request("Token not found"))
    }
}

#[derive(Debug, Deserialize)]
pub struct ForgotPassword {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPassword {
    pub new_password: String,
    pub confirm_password: String,
}

impl ResetPassword {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.new_password.len() < MIN_RESET_PASSWORD_LEN
            || self.confirm_password.len() < MIN_RESET_PASSWORD_LEN
        {
            return Err(bad_request(format!(
                "password must be at least {MIN_RESET_PASSWORD_LEN} characters"
            )));
        }
        if self.new_password.len() > MAX_PASSWORD_LEN {
            return Err(bad_request("password must be at most 255 characters"));
        }
        if self.new_password != self.confirm_password {
            return Err(bad_request("password mismatch"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateNote {
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    #[serde(default, deserialize_with = "reminder")]
    pub reminder: Option<DateTime<Utc>>,
}

impl CreateNote {
    pub fn validate(&self) -> Result<(), AppError> {
        require_text("title", &self.title, MAX_NAME_LEN)?;
        if self.description.trim().is_empty() {
            return Err(bad_request("description is required"));
        }
        Ok(())
    }
}

/// Only the fields present in the body are overwritten. `image` and
/// `reminder` can be cleared with an explicit `null`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateNote {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "provided")]
    pub image: Option<Option<String>>,
    #[serde(default, deserialize_with = "provided_reminder")]
    pub reminder: Option<Option<DateTime<Utc>>>,
}

impl UpdateNote {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(title) = &self.title {
            require_text("title", title, MAX_NAME_LEN)?;
        }
        if self.description.as_ref().is_some_and(|d| d.trim().is_empty()) {
            return Err(bad_request("description cannot be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct NoteQuery {
    pub note_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NoteIdQuery {
    pub note_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AddCollaborators {
    pub note_id: String,
    pub user_id: Vec<String>,
    #[serde(default)]
    pub access_type: AccessType,
}

#[derive(Debug, Deserialize)]
pub struct RemoveCollaborators {
    pub note_id: String,
    pub user_id: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct LabelBody {
    pub name: String,
}

impl LabelBody {
    pub fn validate(&self) -> Result<(), AppError> {
        require_text("name", &self.name, MAX_NAME_LEN)
    }
}

#[derive(Debug, Deserialize)]
pub struct LabelQuery {
    pub label_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LabelIdQuery {
    pub label_id: String,
}

#[derive(Debug, Deserialize)]
pub struct LabelLink {
    pub note_id: String,
    pub label_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(username: &str, email: &str) -> RegisterUser {
        RegisterUser {
            username: username.into(),
            password: "pass1234".into(),
            email: email.into(),
            first_name: None,
            last_name: None,
            phone: None,
            location: None,
            admin_key: None,
        }
    }

    #[test]
    fn username_must_be_alphanumeric_and_long_enough() {
        assert!(register("alice", "a@x.com").validate().is_ok());
        assert!(register("al", "a@x.com").validate().is_err());
        assert!(register("alice_b", "a@x.com").validate().is_err());
    }

    #[test]
    fn email_needs_both_parts() {
        assert!(register("alice", "a@").validate().is_err());
        assert!(register("alice", "ax.com").validate().is_err());
    }

    #[test]
    fn reset_requires_matching_passwords() {
        let body = ResetPassword {
            new_password: "newpass123".into(),
            confirm_password: "newpass124".into(),
        };
        let err = body.validate().unwrap_err();
        assert_eq!(err.to_string(), "password mismatch");
    }

    #[test]
    fn collaborator_access_defaults_to_read_only() {
        let body: AddCollaborators =
            serde_json::from_str(r#"{"note_id": "n1", "user_id": ["u1"]}"#).unwrap();
        assert_eq!(body.access_type, AccessType::ReadOnly);

        let rejected = serde_json::from_str::<AddCollaborators>(
            r#"{"note_id": "n1", "user_id": ["u1"], "access_type": "owner"}"#,
        );
        assert!(rejected.is_err());
    }

    #[test]
    fn note_title_is_bounded() {
        let body = CreateNote {
            title: "x".repeat(101),
            description: "D".into(),
            image: None,
            reminder: None,
        };
        assert!(body.validate().is_err());
    }

    #[test]
    fn reminder_without_offset_is_read_as_utc() {
        let body: CreateNote = serde_json::from_str(
            r#"{"title": "T", "description": "D", "reminder": "2030-01-01T10:00:00"}"#,
        )
        .unwrap();
        let expected = Utc.with_ymd_and_hms(2030, 1, 1, 10, 0, 0).unwrap();
        assert_eq!(body.reminder, Some(expected));

        let body: CreateNote = serde_json::from_str(
            r#"{"title": "T", "description": "D", "reminder": "2030-01-01T12:00:00+02:00"}"#,
        )
        .unwrap();
        assert_eq!(body.reminder, Some(expected));

        let rejected = serde_json::from_str::<CreateNote>(
            r#"{"title": "T", "description": "D", "reminder": "next tuesday"}"#,
        );
        assert!(rejected.is_err());
    }

    #[test]
    fn update_tells_null_apart_from_missing() {
        let patch: UpdateNote = serde_json::from_str(r#"{"title": "T"}"#).unwrap();
        assert_eq!(patch.image, None);
        assert_eq!(patch.reminder, None);

        let patch: UpdateNote =
            serde_json::from_str(r#"{"image": null, "reminder": null}"#).unwrap();
        assert_eq!(patch.image, Some(None));
        assert_eq!(patch.reminder, Some(None));

        let patch: UpdateNote = serde_json::from_str(
            r#"{"image": "cat.png", "reminder": "2030-01-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(patch.image, Some(Some("cat.png".to_string())));
        assert!(matches!(patch.reminder, Some(Some(_))));
    }
}
