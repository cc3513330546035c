//! Task use cases, scoped to an explicit owner.
//!
//! Create and Update each run in a single transaction so a task's
//! `percentage_complete` never disagrees with its persisted subtasks. Update
//! locks the task row first, so concurrent updates of one task serialize.

use crate::filter::TaskFilter;
use crate::identity::UserId;
use crate::reconcile::{self, ReconcileError, SubtaskDraft, SubtaskPatch};
use crate::repository;
use crate::tables::{NewTask, Tag, Task, TaskChangeset, TaskWithSubtasks};
use crate::validation::ValidationError;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::Connection;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),

    #[error("Connection pool error: {0}")]
    PoolError(#[from] diesel::r2d2::PoolError),

    #[error("Task not found")]
    NotFound,

    #[error("Subtask {0} not found")]
    SubtaskNotFound(i32),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl From<ReconcileError> for TaskError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::UnknownSubtask(id) => TaskError::SubtaskNotFound(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTaskDraft {
    pub name: String,
    pub tag: Tag,
    pub description: String,
    pub priority: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub subtasks: Vec<SubtaskDraft>,
}

/// Partial update of a task. `None` means "leave as is".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub tag: Option<Tag>,
    pub description: Option<String>,
    pub priority: Option<bool>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_completed: Option<bool>,
    pub subtasks: Option<Vec<SubtaskPatch>>,
}

impl TaskPatch {
    /// Splits the patch into the task's own column changes and the subtask
    /// patches. Completion only moves forward: `is_completed: false` is
    /// ignored, and `finish_time` is stamped once, the first time the task is
    /// seen completed.
    pub fn into_changeset(
        self,
        current: &Task,
        now: DateTime<Utc>,
    ) -> (TaskChangeset, Option<Vec<SubtaskPatch>>) {
        let completing = self.is_completed == Some(true);

        let changes = TaskChangeset {
            name: self.name,
            tag: self.tag,
            priority: self.priority,
            is_completed: (completing && !current.is_completed).then_some(true),
            description: self.description,
            start_time: self.start_time,
            end_time: self.end_time,
            finish_time: (completing && current.finish_time.is_none()).then_some(now),
            percentage_complete: None,
            updated_at: now,
        };

        (changes, self.subtasks)
    }
}

pub fn create_task(
    conn: &mut PgConnection,
    owner: UserId,
    draft: NewTaskDraft,
) -> Result<TaskWithSubtasks, TaskError> {
    conn.transaction::<_, TaskError, _>(|conn| {
        let completed = draft.subtasks.iter().filter(|s| s.is_completed).count();
        let percentage =
            reconcile::percentage_complete(completed, draft.subtasks.len()).unwrap_or(0);

        let task = repository::insert_task(
            conn,
            &NewTask {
                name: &draft.name,
                tag: draft.tag,
                priority: draft.priority,
                description: &draft.description,
                start_time: draft.start_time,
                end_time: draft.end_time,
                percentage_complete: percentage,
                user_id: owner.0,
            },
        )?;
        let subtasks = repository::insert_subtasks(conn, task.id, &draft.subtasks)?;

        info!(
            "Created task {} with {} subtasks for user {}",
            task.id,
            subtasks.len(),
            owner.0
        );
        Ok(TaskWithSubtasks { task, subtasks })
    })
}

pub fn list_tasks(
    conn: &mut PgConnection,
    owner: UserId,
    filter: &TaskFilter,
) -> Result<Vec<TaskWithSubtasks>, TaskError> {
    let tasks = repository::load_owned_tasks(conn, owner)?;
    let matching = filter.apply(tasks);
    Ok(repository::attach_subtasks(conn, matching)?)
}

pub fn get_task(
    conn: &mut PgConnection,
    owner: UserId,
    task_id: i32,
) -> Result<TaskWithSubtasks, TaskError> {
    let task = repository::find_owned_task(conn, owner, task_id)?.ok_or(TaskError::NotFound)?;
    let subtasks = repository::load_subtasks(conn, &task)?;
    Ok(TaskWithSubtasks { task, subtasks })
}

pub fn update_task(
    conn: &mut PgConnection,
    owner: UserId,
    task_id: i32,
    patch: TaskPatch,
) -> Result<TaskWithSubtasks, TaskError> {
    conn.transaction::<_, TaskError, _>(|conn| {
        let task = repository::find_owned_task_for_update(conn, owner, task_id)?
            .ok_or(TaskError::NotFound)?;

        let (mut changes, subtask_patches) = patch.into_changeset(&task, Utc::now());

        if let Some(patches) = subtask_patches {
            let existing = repository::load_subtasks(conn, &task)?;
            let plan = reconcile::plan(existing, patches)?;
            repository::apply_plan(conn, task.id, &plan)?;
            changes.percentage_complete = plan.percentage_complete;
        }

        let task = repository::update_task(conn, task.id, &changes)?;
        let subtasks = repository::load_subtasks(conn, &task)?;
        Ok(TaskWithSubtasks { task, subtasks })
    })
}

/// Deletes the task if `owner` owns it. A missing or foreign task is not an
/// error; the return value tells whether anything was removed.
pub fn delete_task(conn: &mut PgConnection, owner: UserId, task_id: i32) -> Result<bool, TaskError> {
    let deleted = repository::delete_owned_task(conn, owner, task_id)?;
    if deleted == 0 {
        debug!("Delete of task {} by user {} matched nothing", task_id, owner.0);
    } else {
        info!("Deleted task {} for user {}", task_id, owner.0);
    }
    Ok(deleted > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn open_task() -> Task {
        let now = Utc::now();
        Task {
            id: 1,
            name: "Essay".to_string(),
            tag: Tag::Classes,
            priority: false,
            is_completed: false,
            description: String::new(),
            start_time: None,
            end_time: None,
            finish_time: None,
            percentage_complete: 0,
            user_id: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_completing_stamps_finish_time() {
        let now = Utc::now();
        let patch = TaskPatch {
            is_completed: Some(true),
            ..Default::default()
        };
        let (changes, subtasks) = patch.into_changeset(&open_task(), now);

        assert_eq!(changes.is_completed, Some(true));
        assert_eq!(changes.finish_time, Some(now));
        assert_eq!(changes.percentage_complete, None);
        assert!(subtasks.is_none());
    }

    #[test]
    fn test_completing_again_keeps_first_finish_time() {
        let first = Utc::now() - Duration::days(1);
        let task = Task {
            is_completed: true,
            finish_time: Some(first),
            ..open_task()
        };
        let patch = TaskPatch {
            is_completed: Some(true),
            ..Default::default()
        };
        let (changes, _) = patch.into_changeset(&task, Utc::now());

        assert_eq!(changes.is_completed, None);
        assert_eq!(changes.finish_time, None);
    }

    #[test]
    fn test_completed_task_without_finish_time_gets_one() {
        let now = Utc::now();
        let task = Task {
            is_completed: true,
            ..open_task()
        };
        let patch = TaskPatch {
            is_completed: Some(true),
            ..Default::default()
        };
        let (changes, _) = patch.into_changeset(&task, now);
        assert_eq!(changes.finish_time, Some(now));
    }

    #[test]
    fn test_reopening_is_ignored() {
        let task = Task {
            is_completed: true,
            finish_time: Some(Utc::now()),
            ..open_task()
        };
        let patch = TaskPatch {
            is_completed: Some(false),
            ..Default::default()
        };
        let (changes, _) = patch.into_changeset(&task, Utc::now());

        assert_eq!(changes.is_completed, None);
        assert_eq!(changes.finish_time, None);
    }

    #[test]
    fn test_scalar_fields_pass_through_and_subtasks_split_off() {
        let patch = TaskPatch {
            name: Some("Essay draft".to_string()),
            tag: Some(Tag::Study),
            priority: Some(true),
            subtasks: Some(vec![SubtaskPatch::New(SubtaskDraft {
                name: "Outline".to_string(),
                duration: 20,
                is_completed: false,
            })]),
            ..Default::default()
        };
        let (changes, subtasks) = patch.into_changeset(&open_task(), Utc::now());

        assert_eq!(changes.name.as_deref(), Some("Essay draft"));
        assert_eq!(changes.tag, Some(Tag::Study));
        assert_eq!(changes.priority, Some(true));
        assert_eq!(changes.is_completed, None);
        assert_eq!(subtasks.map(|s| s.len()), Some(1));
    }

    #[test]
    fn test_reconcile_error_maps_to_subtask_not_found() {
        let err: TaskError = ReconcileError::UnknownSubtask(9).into();
        assert!(matches!(err, TaskError::SubtaskNotFound(9)));
    }

    mod database {
        use super::*;
        use crate::tables::tests::{establish_connection, insert_user};

        fn draft(subtasks: &[(&str, bool)]) -> NewTaskDraft {
            NewTaskDraft {
                name: "Thesis chapter".to_string(),
                tag: Tag::Study,
                description: String::new(),
                priority: false,
                start_time: None,
                end_time: None,
                subtasks: subtasks
                    .iter()
                    .map(|(name, is_completed)| SubtaskDraft {
                        name: name.to_string(),
                        duration: 10,
                        is_completed: *is_completed,
                    })
                    .collect(),
            }
        }

        fn complete(id: i32) -> SubtaskPatch {
            SubtaskPatch::Existing {
                id,
                name: None,
                duration: None,
                is_completed: Some(true),
            }
        }

        #[test]
        #[ignore = "requires DATABASE_URL with migrations applied"]
        fn test_three_of_four_subtasks_complete_is_75() {
            let conn = &mut establish_connection();
            conn.test_transaction::<_, TaskError, _>(|conn| {
                let owner = UserId(insert_user(conn, "svcpercent").id);
                let created = create_task(
                    conn,
                    owner,
                    draft(&[("a", true), ("b", false), ("c", false), ("d", true)]),
                )?;
                assert_eq!(created.task.percentage_complete, 50);

                let patch = TaskPatch {
                    subtasks: Some(vec![complete(created.subtasks[1].id)]),
                    ..Default::default()
                };
                let updated = update_task(conn, owner, created.task.id, patch)?;
                assert_eq!(updated.task.percentage_complete, 75);
                assert_eq!(updated.subtasks.len(), 4);
                Ok(())
            });
        }

        #[test]
        #[ignore = "requires DATABASE_URL with migrations applied"]
        fn test_completion_without_subtasks_keeps_percentage() {
            let conn = &mut establish_connection();
            conn.test_transaction::<_, TaskError, _>(|conn| {
                let owner = UserId(insert_user(conn, "svcnosubs").id);
                let created = create_task(conn, owner, draft(&[]))?;

                let patch = TaskPatch {
                    is_completed: Some(true),
                    subtasks: Some(vec![]),
                    ..Default::default()
                };
                let updated = update_task(conn, owner, created.task.id, patch)?;
                assert!(updated.task.is_completed);
                assert!(updated.task.finish_time.is_some());
                assert_eq!(updated.task.percentage_complete, 0);
                Ok(())
            });
        }

        #[test]
        #[ignore = "requires DATABASE_URL with migrations applied"]
        fn test_unknown_subtask_rolls_back_the_whole_update() {
            let conn = &mut establish_connection();
            conn.test_transaction::<_, TaskError, _>(|conn| {
                let owner = UserId(insert_user(conn, "svcrollback").id);
                let created = create_task(conn, owner, draft(&[("a", false)]))?;

                let patch = TaskPatch {
                    name: Some("Renamed".to_string()),
                    subtasks: Some(vec![complete(created.subtasks[0].id), complete(-1)]),
                    ..Default::default()
                };
                let result = update_task(conn, owner, created.task.id, patch);
                assert!(matches!(result, Err(TaskError::SubtaskNotFound(-1))));

                let reloaded = get_task(conn, owner, created.task.id)?;
                assert_eq!(reloaded.task.name, "Thesis chapter");
                assert!(!reloaded.subtasks[0].is_completed);
                Ok(())
            });
        }

        #[test]
        #[ignore = "requires DATABASE_URL with migrations applied"]
        fn test_foreign_tasks_are_invisible_and_undeletable() {
            let conn = &mut establish_connection();
            conn.test_transaction::<_, TaskError, _>(|conn| {
                let owner = UserId(insert_user(conn, "svcowner").id);
                let intruder = UserId(insert_user(conn, "svcintruder").id);
                let created = create_task(conn, owner, draft(&[("a", false)]))?;

                assert!(matches!(
                    get_task(conn, intruder, created.task.id),
                    Err(TaskError::NotFound)
                ));
                assert!(matches!(
                    update_task(conn, intruder, created.task.id, TaskPatch::default()),
                    Err(TaskError::NotFound)
                ));
                assert!(list_tasks(conn, intruder, &TaskFilter::default())?.is_empty());

                assert!(!delete_task(conn, intruder, created.task.id)?);
                assert_eq!(get_task(conn, owner, created.task.id)?.subtasks.len(), 1);

                assert!(delete_task(conn, owner, created.task.id)?);
                assert!(matches!(
                    get_task(conn, owner, created.task.id),
                    Err(TaskError::NotFound)
                ));
                Ok(())
            });
        }

        // Needs committed rows, so it cleans up after itself instead of
        // running inside a test transaction.
        #[test]
        #[ignore = "requires DATABASE_URL with migrations applied"]
        fn test_concurrent_subtask_updates_keep_percentage_in_sync() {
            use crate::config::Config;
            use diesel::prelude::*;
            use std::sync::Barrier;

            const WRITERS: usize = 12;

            let mut config = Config::from_env().expect("DATABASE_URL and JWT_SECRET must be set");
            config.pool.max_size = WRITERS as u32 + 1;
            let pool = config.build_pool().expect("Failed to create pool");

            let (owner, created) = {
                let mut conn = pool.get().unwrap();
                let name = format!("svcconcurrent{}", Utc::now().timestamp_micros());
                let owner = UserId(insert_user(&mut conn, &name).id);
                let names: Vec<String> = (0..WRITERS).map(|i| format!("step {}", i)).collect();
                let subtasks: Vec<(&str, bool)> =
                    names.iter().map(|name| (name.as_str(), false)).collect();
                let created = create_task(&mut conn, owner, draft(&subtasks)).unwrap();
                (owner, created)
            };
            let task_id = created.task.id;

            // Each writer completes a different subtask, all starting together
            let barrier = Barrier::new(WRITERS);
            std::thread::scope(|scope| {
                for subtask in &created.subtasks {
                    let subtask_id = subtask.id;
                    let (pool, barrier) = (&pool, &barrier);
                    scope.spawn(move || {
                        let mut conn = pool.get().unwrap();
                        barrier.wait();
                        let patch = TaskPatch {
                            subtasks: Some(vec![complete(subtask_id)]),
                            ..Default::default()
                        };
                        update_task(&mut conn, owner, task_id, patch).unwrap();
                    });
                }
            });

            let mut conn = pool.get().unwrap();
            let reloaded = get_task(&mut conn, owner, task_id).unwrap();
            let completed = reloaded.subtasks.iter().filter(|s| s.is_completed).count();
            let percentage = reloaded.task.percentage_complete;

            diesel::delete(crate::schema::users::table.find(owner.0))
                .execute(&mut conn)
                .unwrap();

            assert_eq!(completed, WRITERS);
            assert_eq!(percentage, 100);
        }
    }
}
