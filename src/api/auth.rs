use super::AppState;
use crate::identity::{self, AuthError, IssuedToken, UserId};
use crate::tables::User;
use crate::validation::{RegisterRequest, Validate};
use crate::AUTH_API;
use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::error;

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status_code = match self {
            AuthError::MissingToken | AuthError::InvalidToken | AuthError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::Conflict => StatusCode::CONFLICT,
            AuthError::InvalidCode | AuthError::UnknownUser => StatusCode::BAD_REQUEST,
            AuthError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::Hash(_)
            | AuthError::Token(_)
            | AuthError::DatabaseError(_)
            | AuthError::PoolError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status_code == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Auth request failed: {}", self);
            return (status_code, "Internal server error").into_response();
        }

        (status_code, self.to_string()).into_response()
    }
}

/// The caller, as identified by the `Authorization: Bearer <jwt>` header.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub UserId);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("");

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .unwrap_or("")
            .trim();

        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        identity::current_user(token, &state.auth).map(AuthUser)
    }
}

#[derive(Deserialize, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Serialize)]
pub struct StartVerificationRequest {
    pub email: String,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct VerificationStarted {
    pub email: String,
    pub code: String,
}

#[derive(Deserialize, Serialize)]
pub struct VerifyRequest {
    pub code: String,
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route(format!("/{AUTH_API}/register").as_str(), post(register))
        .route(format!("/{AUTH_API}/login").as_str(), post(login))
        .route(
            format!("/{AUTH_API}/verify/start").as_str(),
            post(start_verification),
        )
        .route(format!("/{AUTH_API}/verify").as_str(), post(verify))
}

async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), AuthError> {
    let registration = payload.validate()?;
    let mut conn = state.pool.get()?;
    let user = identity::register(&mut conn, registration, &state.auth)?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<IssuedToken>, AuthError> {
    let mut conn = state.pool.get()?;
    let token = identity::authenticate(&mut conn, &payload.email, &payload.password, &state.auth)?;
    Ok(Json(token))
}

async fn start_verification(
    State(state): State<AppState>,
    Json(payload): Json<StartVerificationRequest>,
) -> Result<Json<VerificationStarted>, AuthError> {
    let mut conn = state.pool.get()?;
    let code = identity::start_verification(&mut conn, &payload.email)?;
    Ok(Json(VerificationStarted {
        email: payload.email.trim().to_lowercase(),
        code,
    }))
}

async fn verify(
    State(state): State<AppState>,
    Json(payload): Json<VerifyRequest>,
) -> Result<Json<User>, AuthError> {
    let mut conn = state.pool.get()?;
    let user = identity::verify(&mut conn, &payload.code)?;
    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::setup_test_state;

    #[tokio::test]
    #[ignore = "requires DATABASE_URL with migrations applied"]
    async fn test_register_then_login() {
        let state = setup_test_state();
        let suffix = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let email = format!("handler{}@example.com", suffix);

        let (status, Json(user)) = register(
            State(state.clone()),
            Json(RegisterRequest {
                username: format!("handler{}", suffix),
                email: email.clone(),
                password: "secret1".to_string(),
            }),
        )
        .await
        .expect("Failed to register");
        assert_eq!(status, StatusCode::CREATED);

        let Json(issued) = login(
            State(state.clone()),
            Json(LoginRequest {
                email,
                password: "secret1".to_string(),
            }),
        )
        .await
        .expect("Failed to log in");

        assert_eq!(
            identity::current_user(&issued.token, &state.auth).unwrap(),
            UserId(user.id)
        );

        let mut conn = state.pool.get().unwrap();
        use crate::schema::users;
        use diesel::prelude::*;
        diesel::delete(users::table.find(user.id))
            .execute(&mut conn)
            .unwrap();
    }
}
