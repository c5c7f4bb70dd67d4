use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use crate::{
    error::AppError,
    graph::Attrs,
    jwt_auth::Audience,
    mail::MailMessage,
    model::{to_attrs, Entity, User},
    password::{hash_password_blocking, verify_dummy_blocking, verify_password_blocking},
    request::{RegisterUser, ResetPassword},
    AppState,
};

async fn load_user(state: &AppState, user_id: &str) -> Result<User, AppError> {
    let node = state
        .store
        .get_by_id(User::KIND, user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;
    Ok(User::from_node(node)?)
}

async fn set_user_attr(
    state: &AppState,
    user_id: &str,
    field: &str,
    value: Value,
) -> Result<User, AppError> {
    let mut attrs = Attrs::new();
    attrs.insert(field.to_owned(), value);
    let node = state.store.update_node(User::KIND, user_id, attrs).await?;
    Ok(User::from_node(node)?)
}

/// Creates an unverified user and mails them a verification link.
pub async fn register(state: &AppState, body: RegisterUser) -> Result<User, AppError> {
    body.validate()?;

    let is_superuser = matches!(
        (&state.config.admin_key, &body.admin_key),
        (Some(expected), Some(given)) if expected == given
    );
    let password_hash = hash_password_blocking(body.password).await?;

    let mut user = User {
        id: String::new(),
        username: body.username,
        password_hash,
        email: body.email.to_ascii_lowercase(),
        first_name: body.first_name,
        last_name: body.last_name,
        phone: body.phone,
        location: body.location,
        is_superuser,
        is_verified: false,
        created_at: Utc::now(),
    };
    user.id = state
        .store
        .create_node(User::KIND, to_attrs(&user)?)
        .await?;
    info!(user_id = %user.id, username = %user.username, "user registered");

    let token = state.tokens.issue(&user.id, Audience::Register)?;
    state.mailer.enqueue(MailMessage {
        recipient: user.email.clone(),
        subject: "Fundoo Notes registration".to_string(),
        body: format!("{}/verify?token={}", state.config.public_url(), token),
    });
    Ok(user)
}

/// Returns a session token for a verified user.
pub async fn login(state: &AppState, username: &str, password: &str) -> Result<String, AppError> {
    let invalid = || AppError::Unauthorized("Invalid username or password".to_string());

    let Some(node) = state
        .store
        .get_by_unique_field(User::KIND, "username", username)
        .await?
    else {
        verify_dummy_blocking(password.to_owned()).await?;
        return Err(invalid());
    };
    let user = User::from_node(node)?;

    if !verify_password_blocking(password.to_owned(), user.password_hash.clone()).await? {
        return Err(invalid());
    }
    if !user.is_verified {
        return Err(AppError::BadRequest("User not verified".to_string()));
    }
    state.tokens.issue(&user.id, Audience::Login)
}

pub async fn verify_email(state: &AppState, token: &str) -> Result<User, AppError> {
    let claims = state.tokens.verify(token, Audience::Register)?;
    let user = load_user(state, &claims.user).await?;
    if user.is_verified {
        return Ok(user);
    }
    let user = set_user_attr(state, &user.id, "is_verified", json!(true)).await?;
    info!(user_id = %user.id, "user verified");
    Ok(user)
}

/// Mails a password reset link to the owner of `email`.
pub async fn forgot_password(state: &AppState, email: &str) -> Result<(), AppError> {
    let node = state
        .store
        .get_by_unique_field(User::KIND, "email", &email.to_ascii_lowercase())
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid email id".to_string()))?;
    let user = User::from_node(node)?;

    let token = state.tokens.issue(&user.id, Audience::Reset)?;
    state.mailer.enqueue(MailMessage {
        recipient: user.email,
        subject: "Fundoo Notes password reset".to_string(),
        body: format!("{}/resetPassword?token={}", state.config.public_url(), token),
    });
    Ok(())
}

pub async fn reset_password(
    state: &AppState,
    token: &str,
    body: ResetPassword,
) -> Result<(), AppError> {
    let claims = state.tokens.verify(token, Audience::Reset)?;
    body.validate()?;
    let user = load_user(state, &claims.user).await?;

    let password_hash = hash_password_blocking(body.confirm_password).await?;
    set_user_attr(state, &user.id, "password", Value::String(password_hash)).await?;
    info!(user_id = %user.id, "password reset");
    Ok(())
}

/// Maps a session token back to its user. Runs on every protected request.
pub async fn resolve_session(state: &AppState, token: &str) -> Result<User, AppError> {
    let claims = state.tokens.verify(token, Audience::Login)?;
    load_user(state, &claims.user).await
}
