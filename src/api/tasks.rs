use super::{AppState, AuthUser};
use crate::filter::TaskFilter;
use crate::service::{self, TaskError};
use crate::tables::TaskWithSubtasks;
use crate::validation::{CreateTaskRequest, UpdateTaskRequest, Validate};
use crate::TASKS_API;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tracing::error;

impl IntoResponse for TaskError {
    fn into_response(self) -> Response {
        let status_code = match self {
            TaskError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TaskError::PoolError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TaskError::NotFound => StatusCode::NOT_FOUND,
            TaskError::SubtaskNotFound(_) => StatusCode::NOT_FOUND,
            TaskError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };

        if status_code == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Task request failed: {}", self);
            return (status_code, "Internal server error").into_response();
        }

        (status_code, self.to_string()).into_response()
    }
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route(
            format!("/{TASKS_API}").as_str(),
            get(list_tasks).post(create_task),
        )
        .route(
            format!("/{TASKS_API}/:id").as_str(),
            get(get_task)
                .put(update_task)
                .patch(update_task)
                .delete(delete_task),
        )
}

async fn list_tasks(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<TaskWithSubtasks>>, TaskError> {
    let filter = TaskFilter::from_query_pairs(&params)?;

    let mut conn = state.pool.get()?;
    let tasks = service::list_tasks(&mut conn, owner, &filter)?;

    Ok(Json(tasks))
}

async fn get_task(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Path(task_id): Path<i32>,
) -> Result<Json<TaskWithSubtasks>, TaskError> {
    let mut conn = state.pool.get()?;
    let task = service::get_task(&mut conn, owner, task_id)?;

    Ok(Json(task))
}

async fn create_task(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskWithSubtasks>), TaskError> {
    let draft = payload.validate()?;

    let mut conn = state.pool.get()?;
    let task = service::create_task(&mut conn, owner, draft)?;

    Ok((StatusCode::CREATED, Json(task)))
}

async fn update_task(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Path(task_id): Path<i32>,
    Json(payload): Json<UpdateTaskRequest>,
) -> Result<Json<TaskWithSubtasks>, TaskError> {
    let patch = payload.validate()?;

    let mut conn = state.pool.get()?;
    let task = service::update_task(&mut conn, owner, task_id, patch)?;

    Ok(Json(task))
}

/// Always answers 204: deleting a task that is missing or owned by someone
/// else is a no-op, not an error.
async fn delete_task(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Path(task_id): Path<i32>,
) -> Result<StatusCode, TaskError> {
    let mut conn = state.pool.get()?;
    service::delete_task(&mut conn, owner, task_id)?;

    Ok(StatusCode::NO_CONTENT)
}
