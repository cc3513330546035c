//! Turns raw request payloads into typed, constraint-checked values.
//!
//! Everything past this module assumes its input already passed these checks.

use crate::reconcile::{SubtaskDraft, SubtaskPatch};
use crate::service::{NewTaskDraft, TaskPatch};
use crate::tables::Tag;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_TASK_NAME_LEN: usize = 3;
pub const MIN_PASSWORD_LEN: usize = 6;
/// One week, in minutes.
pub const MAX_SUBTASK_DURATION: i32 = 7 * 24 * 60;

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub trait Validate {
    type Output;

    fn validate(self) -> Result<Self::Output, ValidationError>;
}

fn min_length(field: &'static str, value: &str, min: usize) -> Result<(), ValidationError> {
    if value.trim().chars().count() < min {
        return Err(ValidationError::new(
            field,
            format!("must be at least {} characters", min),
        ));
    }
    Ok(())
}

fn tag(value: &str) -> Result<Tag, ValidationError> {
    value
        .parse::<Tag>()
        .map_err(|_| ValidationError::new("tag", "must be one of study, classes, others"))
}

fn duration(value: i32) -> Result<i32, ValidationError> {
    if !(0..=MAX_SUBTASK_DURATION).contains(&value) {
        return Err(ValidationError::new(
            "duration",
            format!("must be between 0 and {}", MAX_SUBTASK_DURATION),
        ));
    }
    Ok(value)
}

fn subtask_name(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("subtasks.name", "must not be empty"));
    }
    Ok(())
}

fn time_range(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<(), ValidationError> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => Err(ValidationError::new(
            "end_time",
            "must not be earlier than start_time",
        )),
        _ => Ok(()),
    }
}

/// Subtask payload as sent by clients. With an `id` it edits an existing
/// subtask; without one it describes a new subtask.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SubtaskRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i32>,
    #[serde(
        default,
        alias = "isCompleted",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_completed: Option<bool>,
}

impl SubtaskRequest {
    fn into_draft(self) -> Result<SubtaskDraft, ValidationError> {
        let name = self
            .name
            .ok_or_else(|| ValidationError::new("subtasks.name", "is required for new subtasks"))?;
        subtask_name(&name)?;
        Ok(SubtaskDraft {
            name: name.trim().to_string(),
            duration: duration(self.duration.unwrap_or(0))?,
            is_completed: self.is_completed.unwrap_or(false),
        })
    }
}

impl Validate for SubtaskRequest {
    type Output = SubtaskPatch;

    fn validate(self) -> Result<SubtaskPatch, ValidationError> {
        let Some(id) = self.id else {
            return self.into_draft().map(SubtaskPatch::New);
        };

        if let Some(name) = &self.name {
            subtask_name(name)?;
        }
        Ok(SubtaskPatch::Existing {
            id,
            name: self.name.map(|name| name.trim().to_string()),
            duration: self.duration.map(duration).transpose()?,
            is_completed: self.is_completed,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateTaskRequest {
    pub name: String,
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<bool>,
    #[serde(default, alias = "startTime", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, alias = "endTime", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, alias = "subTasks", skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<SubtaskRequest>,
}

impl Validate for CreateTaskRequest {
    type Output = NewTaskDraft;

    fn validate(self) -> Result<NewTaskDraft, ValidationError> {
        min_length("name", &self.name, MIN_TASK_NAME_LEN)?;
        time_range(self.start_time, self.end_time)?;

        let subtasks = self
            .subtasks
            .into_iter()
            .map(SubtaskRequest::into_draft)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(NewTaskDraft {
            name: self.name.trim().to_string(),
            tag: tag(&self.tag)?,
            description: self.description.unwrap_or_default(),
            priority: self.priority.unwrap_or(false),
            start_time: self.start_time,
            end_time: self.end_time,
            subtasks,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UpdateTaskRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<bool>,
    #[serde(default, alias = "startTime", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, alias = "endTime", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(
        default,
        alias = "isCompleted",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_completed: Option<bool>,
    #[serde(default, alias = "subTasks", skip_serializing_if = "Option::is_none")]
    pub subtasks: Option<Vec<SubtaskRequest>>,
}

impl Validate for UpdateTaskRequest {
    type Output = TaskPatch;

    fn validate(self) -> Result<TaskPatch, ValidationError> {
        if let Some(name) = &self.name {
            min_length("name", name, MIN_TASK_NAME_LEN)?;
        }
        time_range(self.start_time, self.end_time)?;

        let subtasks = self
            .subtasks
            .map(|subtasks| {
                subtasks
                    .into_iter()
                    .map(Validate::validate)
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        Ok(TaskPatch {
            name: self.name.map(|name| name.trim().to_string()),
            tag: self.tag.as_deref().map(tag).transpose()?,
            description: self.description,
            priority: self.priority,
            start_time: self.start_time,
            end_time: self.end_time,
            is_completed: self.is_completed,
            subtasks,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// A registration that passed validation; the password is still plain text.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl Validate for RegisterRequest {
    type Output = Registration;

    fn validate(self) -> Result<Registration, ValidationError> {
        let username = self.username.trim();
        if username.is_empty() || !username.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ValidationError::new(
                "username",
                "must be non-empty and alphanumeric",
            ));
        }

        let email = self.email.trim();
        let well_formed = email
            .split_once('@')
            .map(|(local, domain)| {
                !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
            })
            .unwrap_or(false);
        if !well_formed || email.contains(char::is_whitespace) {
            return Err(ValidationError::new("email", "must be a valid email address"));
        }

        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::new(
                "password",
                format!("must be at least {} characters", MIN_PASSWORD_LEN),
            ));
        }

        Ok(Registration {
            username: username.to_string(),
            email: email.to_lowercase(),
            password: self.password,
        })
    }
}
