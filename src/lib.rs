use std::sync::Arc;

pub mod access;
pub mod config;
pub mod error;
pub mod graph;
pub mod handler;
pub mod jwt_auth;
pub mod mail;
pub mod model;
pub mod password;
pub mod request;
pub mod response;
pub mod route;
pub mod service;

use config::Config;
use graph::GraphStore;
use jwt_auth::TokenService;
use mail::Mailer;

pub struct AppState {
    pub store: Arc<dyn GraphStore>,
    pub tokens: TokenService,
    pub mailer: Mailer,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn GraphStore>, mailer: Mailer, config: Arc<Config>) -> Self {
        AppState {
            store,
            tokens: TokenService::from_config(&config),
            mailer,
            config,
        }
    }
}
