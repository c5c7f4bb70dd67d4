use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{config::Config, error::AppError, service::user, AppState};

/// The workflow a token was issued for. A token is only accepted by the
/// workflow named in its `aud` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Register,
    Login,
    Reset,
}

impl Audience {
    pub fn as_str(&self) -> &'static str {
        match self {
            Audience::Register => "register",
            Audience::Login => "login",
            Audience::Reset => "reset password",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TokenClaims {
    pub user: String,
    pub aud: String,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithm: Algorithm,
    ttl: chrono::Duration,
}

impl TokenService {
    pub fn new(secret: &str, algorithm: Algorithm, ttl: chrono::Duration) -> Self {
        TokenService {
            encoding: EncodingKey::from_secret(secret.as_ref()),
            decoding: DecodingKey::from_secret(secret.as_ref()),
            algorithm,
            ttl,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.jwt_secret,
            config.jwt_algorithm,
            chrono::Duration::hours(config.jwt_exp_hours),
        )
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    pub fn issue(&self, subject: &str, audience: Audience) -> Result<String, AppError> {
        self.issue_with_ttl(subject, audience, self.ttl)
    }

    pub fn issue_with_ttl(
        &self,
        subject: &str,
        audience: Audience,
        ttl: chrono::Duration,
    ) -> Result<String, AppError> {
        let now = chrono::Utc::now();
        let claims = TokenClaims {
            user: subject.to_owned(),
            aud: audience.as_str().to_owned(),
            iat: now.timestamp() as usize,
            exp: (now + ttl).timestamp().max(0) as usize,
        };
        encode(&Header::new(self.algorithm), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Token creation error: {e}")))
    }

    pub fn verify(&self, token: &str, audience: Audience) -> Result<TokenClaims, AppError> {
        let mut validation = Validation::new(self.algorithm);
        validation.set_audience(&[audience.as_str()]);
        decode::<TokenClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                warn!(error = ?e, audience = audience.as_str(), "rejected token");
                AppError::Unauthorized("Invalid token".to_string())
            })
    }
}

/// Resolves the session token to a user and stores it in the request
/// extensions for the handler.
pub async fn auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .or_else(|| jar.get("token").map(|c| c.value().to_string()))
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Auth token not found".to_string()))?;

    let current_user = user::resolve_session(&state, &token).await?;
    req.extensions_mut().insert(current_user);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("test-secret", Algorithm::HS256, chrono::Duration::hours(1))
    }

    #[test]
    fn token_round_trips_for_its_audience() {
        let tokens = service();
        let token = tokens.issue("user-1", Audience::Login).unwrap();
        let claims = tokens.verify(&token, Audience::Login).unwrap();
        assert_eq!(claims.user, "user-1");
        assert_eq!(claims.aud, "login");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn register_and_login_tokens_are_not_interchangeable() {
        let tokens = service();
        let register = tokens.issue("user-1", Audience::Register).unwrap();
        let login = tokens.issue("user-1", Audience::Login).unwrap();

        assert!(tokens.verify(&register, Audience::Login).is_err());
        assert!(tokens.verify(&login, Audience::Register).is_err());
    }

    #[test]
    fn reset_token_cannot_open_a_session() {
        let tokens = service();
        let reset = tokens.issue("user-1", Audience::Reset).unwrap();
        let err = tokens.verify(&reset, Audience::Login).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = service();
        let token = tokens
            .issue_with_ttl("user-1", Audience::Login, chrono::Duration::hours(-2))
            .unwrap();
        assert!(tokens.verify(&token, Audience::Login).is_err());
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let other = TokenService::new("other-secret", Algorithm::HS256, chrono::Duration::hours(1));
        let token = other.issue("user-1", Audience::Login).unwrap();
        assert!(service().verify(&token, Audience::Login).is_err());
    }
}
