use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use axum_extra::extract::cookie::{Cookie, SameSite};

use crate::{
    error::AppError,
    model::User,
    request::*,
    response::*,
    service::{label, note, user},
    AppState,
};

pub async fn register_user_handler(
    State(data): State<Arc<AppState>>,
    AppJson(body): AppJson<RegisterUser>,
) -> Result<impl IntoResponse, AppError> {
    let user = user::register(&data, body).await?;
    Ok(ApiResponse::new(
        StatusCode::CREATED,
        "User created",
        UserResponse::from(&user),
    ))
}

pub async fn login_user_handler(
    State(data): State<Arc<AppState>>,
    AppJson(body): AppJson<LoginUser>,
) -> Result<Response, AppError> {
    let token = user::login(&data, &body.username, &body.password).await?;

    let max_age = time::Duration::seconds(data.tokens.ttl().num_seconds());
    let cookie = Cookie::build(("token", token.to_owned()))
        .path("/")
        .max_age(max_age)
        .same_site(SameSite::Lax)
        .http_only(true)
        .build();

    let mut response = ApiResponse::new(
        StatusCode::OK,
        "Login successful",
        LoginResponse { access: token },
    )
    .into_response();
    let cookie = HeaderValue::from_str(&cookie.to_string())
        .map_err(|e| AppError::Internal(format!("invalid cookie header: {e}")))?;
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}

pub async fn verify_user_handler(
    State(data): State<Arc<AppState>>,
    AppQuery(query): AppQuery<TokenQuery>,
) -> Result<impl IntoResponse, AppError> {
    user::verify_email(&data, &query.require()?).await?;
    Ok(ApiResponse::message(
        StatusCode::OK,
        "User verified successfully",
    ))
}

pub async fn forgot_password_handler(
    State(data): State<Arc<AppState>>,
    AppJson(body): AppJson<ForgotPassword>,
) -> Result<impl IntoResponse, AppError> {
    user::forgot_password(&data, &body.email).await?;
    Ok(ApiResponse::message(StatusCode::OK, "Email sent successfully"))
}

pub async fn reset_password_handler(
    State(data): State<Arc<AppState>>,
    AppQuery(query): AppQuery<TokenQuery>,
    AppJson(body): AppJson<ResetPassword>,
) -> Result<impl IntoResponse, AppError> {
    user::reset_password(&data, &query.require()?, body).await?;
    Ok(ApiResponse::message(StatusCode::OK, "Password reset successful"))
}

pub async fn post_note_handler(
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AppJson(body): AppJson<CreateNote>,
) -> Result<impl IntoResponse, AppError> {
    let note = note::create_note(data.store.as_ref(), &user, body).await?;
    Ok(ApiResponse::new(
        StatusCode::CREATED,
        "Note created",
        NoteResponse::from(&note),
    ))
}

/// Lists every visible note, or fetches one when `note_id` is given.
pub async fn get_notes_handler(
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AppQuery(query): AppQuery<NoteQuery>,
) -> Result<Response, AppError> {
    let store = data.store.as_ref();
    let response = match query.note_id {
        Some(note_id) => {
            let note = note::fetch_note(store, &user, &note_id).await?;
            ApiResponse::new(StatusCode::OK, "Note retrieved", NoteResponse::from(&note))
                .into_response()
        }
        None => {
            let notes = note::list_notes(store, &user).await?;
            let notes: Vec<NoteResponse> = notes.iter().map(NoteResponse::from).collect();
            ApiResponse::new(StatusCode::OK, "Notes retrieved", notes).into_response()
        }
    };
    Ok(response)
}

pub async fn put_note_handler(
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AppQuery(query): AppQuery<NoteIdQuery>,
    AppJson(body): AppJson<UpdateNote>,
) -> Result<impl IntoResponse, AppError> {
    let note = note::update_note(data.store.as_ref(), &user, &query.note_id, body).await?;
    Ok(ApiResponse::new(
        StatusCode::OK,
        "Note updated",
        NoteResponse::from(&note),
    ))
}

pub async fn delete_note_handler(
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AppQuery(query): AppQuery<NoteIdQuery>,
) -> Result<impl IntoResponse, AppError> {
    note::delete_note(data.store.as_ref(), &user, &query.note_id).await?;
    Ok(ApiResponse::message(StatusCode::OK, "Note deleted"))
}

pub async fn add_collaborator_handler(
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AppJson(body): AppJson<AddCollaborators>,
) -> Result<impl IntoResponse, AppError> {
    note::add_collaborators(data.store.as_ref(), &user, body).await?;
    Ok(ApiResponse::message(StatusCode::OK, "Collaborator added"))
}

pub async fn remove_collaborator_handler(
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AppJson(body): AppJson<RemoveCollaborators>,
) -> Result<impl IntoResponse, AppError> {
    note::remove_collaborators(data.store.as_ref(), &user, body).await?;
    Ok(ApiResponse::message(StatusCode::OK, "Collaborator removed"))
}

pub async fn post_label_handler(
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AppJson(body): AppJson<LabelBody>,
) -> Result<impl IntoResponse, AppError> {
    let label = label::create_label(data.store.as_ref(), &user, body).await?;
    Ok(ApiResponse::new(
        StatusCode::CREATED,
        "Label created",
        LabelResponse::from(&label),
    ))
}

pub async fn get_labels_handler(
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AppQuery(query): AppQuery<LabelQuery>,
) -> Result<Response, AppError> {
    let store = data.store.as_ref();
    let response = match query.label_id {
        Some(label_id) => {
            let label = label::fetch_label(store, &user, &label_id).await?;
            ApiResponse::new(StatusCode::OK, "Label retrieved", LabelResponse::from(&label))
                .into_response()
        }
        None => {
            let labels = label::list_labels(store, &user).await?;
            let labels: Vec<LabelResponse> = labels.iter().map(LabelResponse::from).collect();
            ApiResponse::new(StatusCode::OK, "Labels retrieved", labels).into_response()
        }
    };
    Ok(response)
}

pub async fn put_label_handler(
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AppQuery(query): AppQuery<LabelIdQuery>,
    AppJson(body): AppJson<LabelBody>,
) -> Result<impl IntoResponse, AppError> {
    let label = label::update_label(data.store.as_ref(), &user, &query.label_id, body).await?;
    Ok(ApiResponse::new(
        StatusCode::OK,
        "Label updated",
        LabelResponse::from(&label),
    ))
}

pub async fn delete_label_handler(
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AppQuery(query): AppQuery<LabelIdQuery>,
) -> Result<impl IntoResponse, AppError> {
    label::delete_label(data.store.as_ref(), &user, &query.label_id).await?;
    Ok(ApiResponse::message(StatusCode::OK, "Label deleted"))
}

pub async fn associate_label_handler(
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AppJson(body): AppJson<LabelLink>,
) -> Result<impl IntoResponse, AppError> {
    label::associate(data.store.as_ref(), &user, body).await?;
    Ok(ApiResponse::message(StatusCode::OK, "Label associated"))
}

pub async fn disassociate_label_handler(
    State(data): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    AppJson(body): AppJson<LabelLink>,
) -> Result<impl IntoResponse, AppError> {
    label::disassociate(data.store.as_ref(), &user, body).await?;
    Ok(ApiResponse::message(StatusCode::OK, "Label removed"))
}
