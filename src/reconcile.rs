//! Merging subtask edits into a task's subtask collection.
//!
//! [`plan`] works purely on in-memory rows: it applies each patch to the
//! matching subtask (looked up by id), queues new subtasks for insertion and
//! derives the task's completion percentage from the reconciled collection.
//! Writing the plan back is left to the repository so that it can happen in the
//! same transaction as the task update.

use crate::tables::Subtask;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("subtask {0} does not belong to this task")]
    UnknownSubtask(i32),
}

/// A subtask that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtaskDraft {
    pub name: String,
    pub duration: i32,
    pub is_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubtaskPatch {
    Existing {
        id: i32,
        name: Option<String>,
        duration: Option<i32>,
        is_completed: Option<bool>,
    },
    New(SubtaskDraft),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    /// Existing subtasks with their patches applied, ascending by id.
    pub updated: Vec<Subtask>,
    /// Subtasks to insert, in request order.
    pub created: Vec<SubtaskDraft>,
    /// `None` when the task ends up without subtasks.
    pub percentage_complete: Option<i32>,
}

/// `round(100 * completed / total)`, or `None` for an empty collection.
pub fn percentage_complete(completed: usize, total: usize) -> Option<i32> {
    if total == 0 {
        return None;
    }
    let completed = completed.min(total);
    // Integer round-half-up of 100 * completed / total.
    Some(((200 * completed + total) / (2 * total)) as i32)
}

pub fn plan(
    mut existing: Vec<Subtask>,
    patches: Vec<SubtaskPatch>,
) -> Result<ReconcilePlan, ReconcileError> {
    existing.sort_by_key(|subtask| subtask.id);

    let index: HashMap<i32, usize> = existing
        .iter()
        .enumerate()
        .map(|(position, subtask)| (subtask.id, position))
        .collect();

    let mut touched = BTreeSet::new();
    let mut created = Vec::new();

    for patch in patches {
        match patch {
            SubtaskPatch::Existing {
                id,
                name,
                duration,
                is_completed,
            } => {
                let position = *index.get(&id).ok_or(ReconcileError::UnknownSubtask(id))?;
                let subtask = &mut existing[position];
                if let Some(name) = name {
                    subtask.name = name;
                }
                if let Some(duration) = duration {
                    subtask.duration = duration;
                }
                if let Some(is_completed) = is_completed {
                    subtask.is_completed = is_completed;
                }
                touched.insert(position);
            }
            SubtaskPatch::New(draft) => created.push(draft),
        }
    }

    let completed = existing.iter().filter(|s| s.is_completed).count()
        + created.iter().filter(|d| d.is_completed).count();
    let total = existing.len() + created.len();

    Ok(ReconcilePlan {
        updated: touched
            .into_iter()
            .map(|position| existing[position].clone())
            .collect(),
        created,
        percentage_complete: percentage_complete(completed, total),
    })
}
