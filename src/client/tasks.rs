use super::{CreateTaskRequest, TaskFilter, TaskWithSubtasks, UpdateTaskRequest};
use crate::TASKS_API;
use reqwest::{self, RequestBuilder, Response, StatusCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Task not found")]
    NotFound(i32),

    #[error("Not authenticated: {0}")]
    Unauthorized(String),

    #[error("Invalid request: {0}")]
    Invalid(String),

    #[error("Unexpected server error: {0}")]
    ServerError(String),
}

// * Client ...................................................................

fn authorized(request: RequestBuilder, token: &str) -> RequestBuilder {
    request.bearer_auth(token)
}

async fn check(response: Response, id: i32) -> Result<Response, TaskError> {
    match response.status() {
        StatusCode::NOT_FOUND => Err(TaskError::NotFound(id)),
        StatusCode::UNAUTHORIZED => Err(TaskError::Unauthorized(
            response.text().await.unwrap_or_default(),
        )),
        StatusCode::UNPROCESSABLE_ENTITY | StatusCode::BAD_REQUEST => Err(TaskError::Invalid(
            response.text().await.unwrap_or_default(),
        )),
        status if status.is_server_error() => Err(TaskError::ServerError(
            response.text().await.unwrap_or_default(),
        )),
        _ => Ok(response.error_for_status()?),
    }
}

pub async fn create_task(
    base_url: &str,
    token: &str,
    task: CreateTaskRequest,
) -> Result<TaskWithSubtasks, TaskError> {
    let client = reqwest::Client::new();
    let url = format!("{}/{TASKS_API}", base_url);
    let response = authorized(client.post(url), token).json(&task).send().await?;

    let created_task = check(response, -1).await?.json::<TaskWithSubtasks>().await?;
    Ok(created_task)
}

pub async fn fetch_task(base_url: &str, token: &str, id: i32) -> Result<TaskWithSubtasks, TaskError> {
    let client = reqwest::Client::new();
    let url = format!("{}/{TASKS_API}/{}", base_url, id);
    let response = authorized(client.get(url), token).send().await?;

    let task = check(response, id).await?.json::<TaskWithSubtasks>().await?;
    Ok(task)
}

pub async fn fetch_tasks(
    base_url: &str,
    token: &str,
    filter: &TaskFilter,
) -> Result<Vec<TaskWithSubtasks>, TaskError> {
    let client = reqwest::Client::new();
    let url = format!("{}/{TASKS_API}", base_url);
    let response = authorized(client.get(url), token)
        .query(&filter.to_query_pairs())
        .send()
        .await?;

    let tasks = check(response, -1).await?.json::<Vec<TaskWithSubtasks>>().await?;
    Ok(tasks)
}

pub async fn update_task(
    base_url: &str,
    token: &str,
    id: i32,
    task: UpdateTaskRequest,
) -> Result<TaskWithSubtasks, TaskError> {
    let client = reqwest::Client::new();
    let url = format!("{}/{TASKS_API}/{}", base_url, id);
    let response = authorized(client.patch(url), token).json(&task).send().await?;

    let updated_task = check(response, id).await?.json::<TaskWithSubtasks>().await?;
    Ok(updated_task)
}

pub async fn delete_task(base_url: &str, token: &str, id: i32) -> Result<(), TaskError> {
    let client = reqwest::Client::new();
    let url = format!("{}/{TASKS_API}/{}", base_url, id);
    let response = authorized(client.delete(url), token).send().await?;

    check(response, id).await?;
    Ok(())
}
