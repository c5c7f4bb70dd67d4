use std::sync::Arc;

use axum::{
    http::Method,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{handler::*, jwt_auth::auth, AppState};

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route(
            "/note",
            get(get_notes_handler)
                .post(post_note_handler)
                .put(put_note_handler)
                .delete(delete_note_handler),
        )
        .route(
            "/note/collaborate",
            post(add_collaborator_handler).delete(remove_collaborator_handler),
        )
        .route(
            "/label",
            get(get_labels_handler)
                .post(post_label_handler)
                .put(put_label_handler)
                .delete(delete_label_handler),
        )
        .route(
            "/labelM2M",
            post(associate_label_handler).delete(disassociate_label_handler),
        )
        .route_layer(middleware::from_fn_with_state(app_state.clone(), auth));

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
        .allow_origin(Any);

    Router::new()
        .route("/signUp", post(register_user_handler))
        .route("/signIn", post(login_user_handler))
        .route("/verify", get(verify_user_handler))
        .route("/forgotPassword", post(forgot_password_handler))
        .route("/resetPassword", post(reset_password_handler))
        .merge(protected)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
