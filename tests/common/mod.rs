#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use fundoo_notes::{
    config::{Config, MailConfig},
    graph::MemoryGraph,
    mail::{MailError, MailMessage, MailSender, Mailer},
    route::create_router,
    AppState,
};
use jsonwebtoken::Algorithm;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tower::ServiceExt;

struct RecordingMailer(mpsc::UnboundedSender<MailMessage>);

#[async_trait]
impl MailSender for RecordingMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        self.0
            .send(message.clone())
            .map_err(|e| MailError::Transport(e.to_string()))
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    outbox: Mutex<mpsc::UnboundedReceiver<MailMessage>>,
}

pub fn test_config() -> Config {
    Config {
        database_url: "memory://".to_string(),
        base_url: "http://localhost".to_string(),
        port: 8000,
        jwt_secret: "integration-secret".to_string(),
        jwt_exp_hours: 1,
        jwt_algorithm: Algorithm::HS256,
        admin_key: Some("let-me-in".to_string()),
        mail: MailConfig {
            host_user: "noreply@example.com".to_string(),
            smtp: "smtp.example.com".to_string(),
            smtp_port: 465,
        },
    }
}

impl TestApp {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (mailer, _worker) = Mailer::spawn(Arc::new(RecordingMailer(tx)));
        let state = Arc::new(AppState::new(
            Arc::new(MemoryGraph::new()),
            mailer,
            Arc::new(test_config()),
        ));
        TestApp {
            router: create_router(state.clone()),
            state,
            outbox: Mutex::new(rx),
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("response");

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    /// Next mail handed to the sender by the worker.
    pub async fn next_mail(&self) -> MailMessage {
        let mut outbox = self.outbox.lock().await;
        tokio::time::timeout(Duration::from_secs(5), outbox.recv())
            .await
            .expect("mail dispatched in time")
            .expect("mail worker alive")
    }

    pub async fn register(&self, username: &str, email: &str) -> (StatusCode, Value) {
        self.request(
            Method::POST,
            "/signUp",
            None,
            Some(json!({
                "username": username,
                "password": "pass1234",
                "email": email,
            })),
        )
        .await
    }

    pub async fn login(&self, username: &str, password: &str) -> (StatusCode, Value) {
        self.request(
            Method::POST,
            "/signIn",
            None,
            Some(json!({ "username": username, "password": password })),
        )
        .await
    }

    /// Registers, verifies and logs in a user; returns `(user_id, session_token)`.
    pub async fn signed_in_user(&self, username: &str) -> (String, String) {
        let (status, body) = self
            .register(username, &format!("{username}@example.com"))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let user_id = body["data"]["id"].as_str().expect("user id").to_string();

        let token = token_from_link(&self.next_mail().await.body);
        let (status, _) = self
            .request(Method::GET, &format!("/verify?token={token}"), None, None)
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = self.login(username, "pass1234").await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let access = body["data"]["access"].as_str().expect("access").to_string();
        (user_id, access)
    }
}

pub fn token_from_link(link: &str) -> String {
    link.split("token=")
        .nth(1)
        .expect("link carries a token")
        .to_string()
}
