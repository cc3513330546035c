use super::{
    IssuedToken, LoginRequest, RegisterRequest, StartVerificationRequest, User,
    VerificationStarted, VerifyRequest,
};
use crate::AUTH_API;
use reqwest::{self, Response, StatusCode};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: StatusCode, message: String },
}

async fn post_json<T: Serialize>(base_url: &str, path: &str, body: &T) -> Result<Response, AuthError> {
    let client = reqwest::Client::new();
    let url = format!("{}/{AUTH_API}/{}", base_url, path);
    let response = client.post(url).json(body).send().await?;

    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        let message = response.text().await.unwrap_or_default();
        return Err(AuthError::Rejected { status, message });
    }
    Ok(response)
}

pub async fn register(base_url: &str, request: RegisterRequest) -> Result<User, AuthError> {
    let response = post_json(base_url, "register", &request).await?;
    Ok(response.json::<User>().await?)
}

pub async fn login(base_url: &str, email: &str, password: &str) -> Result<IssuedToken, AuthError> {
    let request = LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
    };
    let response = post_json(base_url, "login", &request).await?;
    Ok(response.json::<IssuedToken>().await?)
}

pub async fn start_verification(
    base_url: &str,
    email: &str,
) -> Result<VerificationStarted, AuthError> {
    let request = StartVerificationRequest {
        email: email.to_string(),
    };
    let response = post_json(base_url, "verify/start", &request).await?;
    Ok(response.json::<VerificationStarted>().await?)
}

pub async fn verify(base_url: &str, code: &str) -> Result<User, AuthError> {
    let request = VerifyRequest {
        code: code.to_string(),
    };
    let response = post_json(base_url, "verify", &request).await?;
    Ok(response.json::<User>().await?)
}
