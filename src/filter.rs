//! Query-parameter filtering over a user's tasks.
//!
//! A [`TaskFilter`] is built from the raw `(key, value)` pairs of a query string.
//! Repeated keys are allowed: for `id`, `is_completed` and `priority` only the
//! first occurrence counts, while every `tag` occurrence is added to the set of
//! accepted tags. Predicates combine with AND; tags combine with OR.

use crate::tables::Task;
use crate::validation::ValidationError;
use std::collections::BTreeSet;

pub const ID_PARAM: &str = "id";
pub const IS_COMPLETED_PARAM: &str = "is_completed";
pub const IS_COMPLETED_PARAM_CAMEL: &str = "isCompleted";
pub const PRIORITY_PARAM: &str = "priority";
pub const TAG_PARAM: &str = "tag";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub id: Option<i32>,
    pub is_completed: Option<bool>,
    pub priority: Option<bool>,
    /// Lowercased tag names; `None` means "any tag".
    pub tags: Option<BTreeSet<String>>,
}

impl TaskFilter {
    pub fn from_query_pairs<K, V>(pairs: &[(K, V)]) -> Result<Self, ValidationError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut filter = TaskFilter::default();
        let mut id_seen = false;

        for (key, value) in pairs {
            let value = value.as_ref();
            match key.as_ref() {
                ID_PARAM if !id_seen => {
                    id_seen = true;
                    let parsed = value.trim().parse::<i32>().map_err(|_| {
                        ValidationError::new(ID_PARAM, format!("'{}' is not a task id", value))
                    })?;
                    filter.id = Some(parsed);
                }
                IS_COMPLETED_PARAM | IS_COMPLETED_PARAM_CAMEL if filter.is_completed.is_none() => {
                    filter.is_completed = Some(parse_flag(value));
                }
                PRIORITY_PARAM if filter.priority.is_none() => {
                    filter.priority = Some(parse_flag(value));
                }
                TAG_PARAM => {
                    filter
                        .tags
                        .get_or_insert_with(BTreeSet::new)
                        .insert(value.trim().to_lowercase());
                }
                _ => {}
            }
        }

        Ok(filter)
    }

    /// Inverse of [`TaskFilter::from_query_pairs`], used by the HTTP client.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(id) = self.id {
            pairs.push((ID_PARAM, id.to_string()));
        }
        if let Some(done) = self.is_completed {
            pairs.push((IS_COMPLETED_PARAM, done.to_string()));
        }
        if let Some(priority) = self.priority {
            pairs.push((PRIORITY_PARAM, priority.to_string()));
        }
        if let Some(tags) = &self.tags {
            pairs.extend(tags.iter().map(|tag| (TAG_PARAM, tag.clone())));
        }
        pairs
    }

    pub fn is_empty(&self) -> bool {
        self == &TaskFilter::default()
    }

    pub fn matches(&self, task: &Task) -> bool {
        let id_match = self.id.map_or(true, |id| task.id == id);
        let done_match = self
            .is_completed
            .map_or(true, |done| task.is_completed == done);
        let priority_match = self
            .priority
            .map_or(true, |priority| task.priority == priority);
        let tag_match = self.tags.as_ref().map_or(true, |tags| {
            tags.contains(&task.tag.as_str().to_lowercase())
        });

        id_match && done_match && priority_match && tag_match
    }

    /// Keeps the tasks matching every supplied predicate, in their original order.
    pub fn apply(&self, tasks: Vec<Task>) -> Vec<Task> {
        tasks.into_iter().filter(|task| self.matches(task)).collect()
    }
}

// Anything but "true" reads as false.
fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::Tag;
    use chrono::Utc;

    fn task(id: i32, tag: Tag, priority: bool, is_completed: bool) -> Task {
        let now = Utc::now();
        Task {
            id,
            name: format!("task {}", id),
            tag,
            priority,
            is_completed,
            description: String::new(),
            start_time: None,
            end_time: None,
            finish_time: is_completed.then_some(now),
            percentage_complete: 0,
            user_id: 1,
            created_at: now,
            updated_at: now,
        }
    }

    fn sample() -> Vec<Task> {
        vec![
            task(1, Tag::Study, true, false),
            task(2, Tag::Classes, false, true),
            task(3, Tag::Others, true, true),
            task(4, Tag::Study, false, false),
            task(5, Tag::Classes, true, false),
        ]
    }

    fn ids(tasks: &[Task]) -> Vec<i32> {
        tasks.iter().map(|t| t.id).collect()
    }

    fn parse(pairs: &[(&str, &str)]) -> TaskFilter {
        TaskFilter::from_query_pairs(pairs).unwrap()
    }

    #[test]
    fn test_empty_filter_keeps_everything_in_order() {
        let filter = parse(&[]);
        assert!(filter.is_empty());
        assert_eq!(ids(&filter.apply(sample())), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_unknown_params_are_ignored() {
        let filter = parse(&[("page", "2"), ("sort", "name")]);
        assert!(filter.is_empty());
    }

    #[test]
    fn test_filter_by_id() {
        let filter = parse(&[("id", "3")]);
        assert_eq!(ids(&filter.apply(sample())), vec![3]);
    }

    #[test]
    fn test_only_first_id_is_significant() {
        let filter = parse(&[("id", "2"), ("id", "4")]);
        assert_eq!(filter.id, Some(2));
        assert_eq!(ids(&filter.apply(sample())), vec![2]);
    }

    #[test]
    fn test_non_numeric_id_is_rejected() {
        let err = TaskFilter::from_query_pairs(&[("id", "abc")]).unwrap_err();
        assert_eq!(err.field, "id");
    }

    #[test]
    fn test_filter_by_completion_accepts_both_spellings() {
        let snake = parse(&[("is_completed", "true")]);
        let camel = parse(&[("isCompleted", "true")]);
        assert_eq!(snake, camel);
        assert_eq!(ids(&snake.apply(sample())), vec![2, 3]);

        let open = parse(&[("is_completed", "false")]);
        assert_eq!(ids(&open.apply(sample())), vec![1, 4, 5]);
    }

    #[test]
    fn test_non_true_flag_reads_as_false() {
        let filter = parse(&[("priority", "yes")]);
        assert_eq!(filter.priority, Some(false));
        assert_eq!(ids(&filter.apply(sample())), vec![2, 4]);
    }

    #[test]
    fn test_only_first_priority_is_significant() {
        let filter = parse(&[("priority", "true"), ("priority", "false")]);
        assert_eq!(ids(&filter.apply(sample())), vec![1, 3, 5]);
    }

    #[test]
    fn test_tags_combine_with_or_and_ignore_case() {
        let filter = parse(&[("tag", "STUDY"), ("tag", "others")]);
        assert_eq!(ids(&filter.apply(sample())), vec![1, 3, 4]);
    }

    #[test]
    fn test_unknown_tag_matches_nothing() {
        let filter = parse(&[("tag", "work")]);
        assert!(filter.apply(sample()).is_empty());
    }

    #[test]
    fn test_predicates_combine_with_and() {
        let filter = parse(&[("tag", "classes"), ("priority", "true"), ("is_completed", "false")]);
        assert_eq!(ids(&filter.apply(sample())), vec![5]);
    }

    #[test]
    fn test_result_is_ordered_subset_satisfying_every_predicate() {
        let tasks = sample();
        let combos: Vec<Vec<(&str, &str)>> = vec![
            vec![("priority", "true")],
            vec![("is_completed", "true"), ("tag", "classes")],
            vec![("tag", "study"), ("tag", "classes"), ("priority", "false")],
            vec![("id", "1"), ("priority", "false")],
        ];

        for pairs in combos {
            let filter = parse(&pairs);
            let kept = filter.apply(tasks.clone());

            let expected: Vec<i32> = tasks
                .iter()
                .filter(|t| filter.matches(t))
                .map(|t| t.id)
                .collect();
            assert_eq!(ids(&kept), expected);
            assert!(ids(&kept).windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_query_pairs_round_trip() {
        let filter = parse(&[("id", "7"), ("isCompleted", "true"), ("tag", "Study")]);
        let pairs = filter.to_query_pairs();
        assert_eq!(TaskFilter::from_query_pairs(&pairs).unwrap(), filter);
    }
}
