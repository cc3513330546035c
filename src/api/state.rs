use crate::config::AuthConfig;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use std::sync::Arc;

pub type Pool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Shared by every handler: the connection pool and the token settings the
/// [`AuthUser`](super::AuthUser) extractor verifies against.
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<Pool>,
    pub auth: Arc<AuthConfig>,
}
