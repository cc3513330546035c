//! User registration, password checks, bearer tokens and email verification.
//!
//! Tokens are HS256 JWTs whose subject is the user id. Verification codes are
//! short numeric one-time codes; delivering them by mail is out of scope, so
//! they are logged and handed back to the caller.

use crate::config::AuthConfig;
use crate::schema::{email_verifications, users};
use crate::tables::{NewEmailVerification, NewUser, User};
use crate::validation::{Registration, ValidationError};
use chrono::{Duration, Utc};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub const VERIFICATION_CODE_LEN: usize = 4;

/// The authenticated principal every task operation is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i32);

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("A user with that username or email already exists")]
    Conflict,

    #[error("Invalid email verification code")]
    InvalidCode,

    #[error("User does not exist")]
    UnknownUser,

    #[error("Password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DieselError),

    #[error("Connection pool error: {0}")]
    PoolError(#[from] diesel::r2d2::PoolError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// User id
    sub: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    pub token: String,
    /// Expiry, unix seconds.
    pub exp: i64,
}

pub fn issue_token(user: UserId, auth: &AuthConfig) -> Result<IssuedToken, AuthError> {
    let now = Utc::now();
    let exp = now + Duration::hours(auth.jwt_ttl_hours.max(1));
    let claims = Claims {
        sub: user.0.to_string(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };
    let token = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth.jwt_secret.as_bytes()),
    )?;
    Ok(IssuedToken {
        token,
        exp: claims.exp,
    })
}

/// Resolves a bearer token to the user it was issued for.
pub fn current_user(token: &str, auth: &AuthConfig) -> Result<UserId, AuthError> {
    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(auth.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        warn!("Rejected token: {}", e);
        AuthError::InvalidToken
    })?;

    data.claims
        .sub
        .parse::<i32>()
        .map(UserId)
        .map_err(|_| AuthError::InvalidToken)
}

pub fn register(
    conn: &mut PgConnection,
    registration: Registration,
    auth: &AuthConfig,
) -> Result<User, AuthError> {
    let password_hash = bcrypt::hash(&registration.password, auth.bcrypt_cost)?;

    // Savepoint, so a unique violation leaves an enclosing transaction usable.
    let user = conn
        .transaction::<_, DieselError, _>(|conn| {
            diesel::insert_into(users::table)
                .values(&NewUser {
                    username: &registration.username,
                    email: &registration.email,
                    password: &password_hash,
                })
                .returning(User::as_returning())
                .get_result(conn)
        })
        .map_err(|err| match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => AuthError::Conflict,
            _ => AuthError::DatabaseError(err),
        })?;

    info!("Registered user {} ({})", user.id, user.username);
    Ok(user)
}

pub fn authenticate(
    conn: &mut PgConnection,
    email: &str,
    password: &str,
    auth: &AuthConfig,
) -> Result<IssuedToken, AuthError> {
    let user = users::table
        .filter(users::email.eq(email.trim().to_lowercase()))
        .select(User::as_select())
        .first(conn)
        .optional()?;

    let Some(user) = user else {
        warn!("Login attempt for unknown email");
        return Err(AuthError::InvalidCredentials);
    };

    if !bcrypt::verify(password, &user.password)? {
        warn!("Invalid password for user {}", user.id);
        return Err(AuthError::InvalidCredentials);
    }

    issue_token(UserId(user.id), auth)
}

/// Zero-padded numeric code of `len` digits.
pub fn generate_code(len: usize) -> String {
    let upper = 10u64.pow(len as u32);
    let n = rand::thread_rng().gen_range(0..upper);
    format!("{:0width$}", n, width = len)
}

/// Issues a verification code for `email`. A code collision replaces the
/// older pending verification.
pub fn start_verification(conn: &mut PgConnection, email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    let code = generate_code(VERIFICATION_CODE_LEN);

    diesel::insert_into(email_verifications::table)
        .values(&NewEmailVerification {
            code: &code,
            email: &email,
        })
        .on_conflict(email_verifications::code)
        .do_update()
        .set((
            email_verifications::email.eq(&email),
            email_verifications::created_at.eq(Utc::now()),
        ))
        .execute(conn)?;

    info!("Sending verification code {} to {}", code, email);
    Ok(code)
}

/// Consumes `code` and marks the matching user as verified.
pub fn verify(conn: &mut PgConnection, code: &str) -> Result<User, AuthError> {
    conn.transaction::<_, AuthError, _>(|conn| {
        let email = email_verifications::table
            .find(code.trim())
            .select(email_verifications::email)
            .first::<String>(conn)
            .optional()?
            .ok_or(AuthError::InvalidCode)?;

        let user = diesel::update(users::table.filter(users::email.eq(&email)))
            .set((users::is_verified.eq(true), users::updated_at.eq(Utc::now())))
            .returning(User::as_returning())
            .get_result(conn)
            .optional()?
            .ok_or(AuthError::UnknownUser)?;

        diesel::delete(email_verifications::table.find(code.trim())).execute(conn)?;

        info!("Verified email for user {}", user.id);
        Ok(user)
    })
}
