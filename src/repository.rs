use crate::identity::UserId;
use crate::reconcile::{ReconcilePlan, SubtaskDraft};
use crate::schema::{subtasks, tasks};
use crate::tables::{
    NewSubtask, NewTask, Subtask, SubtaskChanges, Task, TaskChangeset, TaskWithSubtasks,
};
use diesel::prelude::*;

/// All tasks owned by `owner`, ascending by id.
pub fn load_owned_tasks(conn: &mut PgConnection, owner: UserId) -> QueryResult<Vec<Task>> {
    tasks::table
        .filter(tasks::user_id.eq(owner.0))
        .order_by(tasks::id.asc())
        .select(Task::as_select())
        .load(conn)
}

/// The task with `task_id` if, and only if, `owner` owns it.
pub fn find_owned_task(
    conn: &mut PgConnection,
    owner: UserId,
    task_id: i32,
) -> QueryResult<Option<Task>> {
    tasks::table
        .filter(tasks::id.eq(task_id))
        .filter(tasks::user_id.eq(owner.0))
        .select(Task::as_select())
        .first(conn)
        .optional()
}

/// Like [`find_owned_task`], but takes a row lock held until the enclosing
/// transaction ends. Concurrent updates of the same task queue up behind it
/// and then read the subtasks the previous one committed.
pub fn find_owned_task_for_update(
    conn: &mut PgConnection,
    owner: UserId,
    task_id: i32,
) -> QueryResult<Option<Task>> {
    tasks::table
        .filter(tasks::id.eq(task_id))
        .filter(tasks::user_id.eq(owner.0))
        .select(Task::as_select())
        .for_update()
        .get_result(conn)
        .optional()
}

pub fn load_subtasks(conn: &mut PgConnection, task: &Task) -> QueryResult<Vec<Subtask>> {
    Subtask::belonging_to(task)
        .order_by(subtasks::id.asc())
        .select(Subtask::as_select())
        .load(conn)
}

/// Loads the subtasks of every task in one query and pairs them up.
pub fn attach_subtasks(
    conn: &mut PgConnection,
    tasks: Vec<Task>,
) -> QueryResult<Vec<TaskWithSubtasks>> {
    let children = Subtask::belonging_to(&tasks)
        .order_by(subtasks::id.asc())
        .select(Subtask::as_select())
        .load(conn)?;

    Ok(children
        .grouped_by(&tasks)
        .into_iter()
        .zip(tasks)
        .map(|(subtasks, task)| TaskWithSubtasks { task, subtasks })
        .collect())
}

pub fn insert_task(conn: &mut PgConnection, new_task: &NewTask) -> QueryResult<Task> {
    diesel::insert_into(tasks::table)
        .values(new_task)
        .returning(Task::as_returning())
        .get_result(conn)
}

pub fn insert_subtasks(
    conn: &mut PgConnection,
    task_id: i32,
    drafts: &[SubtaskDraft],
) -> QueryResult<Vec<Subtask>> {
    if drafts.is_empty() {
        return Ok(Vec::new());
    }

    let rows: Vec<NewSubtask> = drafts
        .iter()
        .map(|draft| NewSubtask {
            name: &draft.name,
            is_completed: draft.is_completed,
            duration: draft.duration,
            task_id,
        })
        .collect();

    let mut inserted = diesel::insert_into(subtasks::table)
        .values(&rows)
        .returning(Subtask::as_returning())
        .get_results(conn)?;
    inserted.sort_by_key(|subtask: &Subtask| subtask.id);
    Ok(inserted)
}

/// Writes merged subtasks back and inserts the new ones.
pub fn apply_plan(conn: &mut PgConnection, task_id: i32, plan: &ReconcilePlan) -> QueryResult<()> {
    for subtask in &plan.updated {
        diesel::update(
            subtasks::table
                .filter(subtasks::id.eq(subtask.id))
                .filter(subtasks::task_id.eq(task_id)),
        )
        .set(SubtaskChanges::from(subtask))
        .execute(conn)?;
    }
    insert_subtasks(conn, task_id, &plan.created)?;
    Ok(())
}

pub fn update_task(
    conn: &mut PgConnection,
    task_id: i32,
    changes: &TaskChangeset,
) -> QueryResult<Task> {
    diesel::update(tasks::table.find(task_id))
        .set(changes)
        .returning(Task::as_returning())
        .get_result(conn)
}

/// Deletes the task (its subtasks go with it through the foreign key) when
/// `owner` owns it. Returns the number of tasks removed.
pub fn delete_owned_task(
    conn: &mut PgConnection,
    owner: UserId,
    task_id: i32,
) -> QueryResult<usize> {
    diesel::delete(
        tasks::table
            .filter(tasks::id.eq(task_id))
            .filter(tasks::user_id.eq(owner.0)),
    )
    .execute(conn)
}
