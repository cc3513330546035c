use crate::schema::*;
use chrono::{DateTime, Utc};
use diesel::deserialize::{FromSql, Result};
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::serialize::{IsNull, Output, ToSql};
use diesel::{AsExpression, FromSqlRow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::str::FromStr;

/// Category of a task, stored as the native `tag_enum` type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsExpression, FromSqlRow, Serialize, Deserialize)]
#[diesel(sql_type = crate::schema::sql_types::TagEnum)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tag {
    Study,
    Classes,
    Others,
}

impl Tag {
    pub const ALL: [Tag; 3] = [Tag::Study, Tag::Classes, Tag::Others];

    /// Canonical (uppercase) form, as persisted.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Study => "STUDY",
            Tag::Classes => "CLASSES",
            Tag::Others => "OTHERS",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tag {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Tag::ALL
            .into_iter()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown tag '{}'", s))
    }
}

impl ToSql<crate::schema::sql_types::TagEnum, Pg> for Tag {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> diesel::serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<crate::schema::sql_types::TagEnum, Pg> for Tag {
    fn from_sql(bytes: PgValue) -> Result<Self> {
        let raw = std::str::from_utf8(bytes.as_bytes())?;
        raw.parse::<Tag>().map_err(Into::into)
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Associations, Serialize, Deserialize)]
#[diesel(table_name = tasks)]
#[diesel(belongs_to(User))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Task {
    pub id: i32,
    pub name: String,
    pub tag: Tag,
    pub priority: bool,
    pub is_completed: bool,
    pub description: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
    pub percentage_complete: i32,
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = tasks)]
pub struct NewTask<'a> {
    pub name: &'a str,
    pub tag: Tag,
    pub priority: bool,
    pub description: &'a str,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub percentage_complete: i32,
    pub user_id: i32,
}

/// Column-level changes to a task row. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, AsChangeset)]
#[diesel(table_name = tasks)]
pub struct TaskChangeset {
    pub name: Option<String>,
    pub tag: Option<Tag>,
    pub priority: Option<bool>,
    pub is_completed: Option<bool>,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
    pub percentage_complete: Option<i32>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Associations, Serialize, Deserialize)]
#[diesel(table_name = subtasks)]
#[diesel(belongs_to(Task))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Subtask {
    pub id: i32,
    pub name: String,
    pub is_completed: bool,
    pub duration: i32,
    pub task_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = subtasks)]
pub struct NewSubtask<'a> {
    pub name: &'a str,
    pub is_completed: bool,
    pub duration: i32,
    pub task_id: i32,
}

#[derive(AsChangeset)]
#[diesel(table_name = subtasks)]
pub struct SubtaskChanges<'a> {
    pub name: &'a str,
    pub is_completed: bool,
    pub duration: i32,
    pub updated_at: DateTime<Utc>,
}

impl<'a> From<&'a Subtask> for SubtaskChanges<'a> {
    fn from(subtask: &'a Subtask) -> Self {
        Self {
            name: &subtask.name,
            is_completed: subtask.is_completed,
            duration: subtask.duration,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = email_verifications)]
pub struct EmailVerification {
    pub code: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = email_verifications)]
pub struct NewEmailVerification<'a> {
    pub code: &'a str,
    pub email: &'a str,
}

/// A task together with its subtasks, ordered by subtask id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskWithSubtasks {
    #[serde(flatten)]
    pub task: Task,
    pub subtasks: Vec<Subtask>,
}
