//! Variant/dedup policy applied in front of every insert.
//!
//! ControlWork and Test tasks with a task index recur as parallel variants and
//! get `max + 1` numbering. Every other category rejects a second task in the
//! same classification slot. The source link is a global natural key for all
//! categories.
//!
//! The policy is written against [`CatalogLookup`] so the store can run it
//! inside its insert transaction and tests can run it against a fake.

use crate::domain::{Category, NewTask, TaskLink};
use crate::error::StoreResult;

/// The reads the resolver needs from the catalog. All of them consider
/// moderated and pending tasks alike.
pub trait CatalogLookup {
    /// Any task with this source link.
    fn link_exists(&self, link: &TaskLink) -> StoreResult<bool>;

    /// Any task with the same grade/subject/tier/category and the same value
    /// of each key column in `key`.
    fn slot_taken(&self, task: &NewTask, key: SlotKey) -> StoreResult<bool>;

    /// Highest variant among tasks sharing the full positional key.
    fn max_variant(&self, task: &NewTask) -> StoreResult<Option<i32>>;

    fn variant_taken(&self, task: &NewTask, variant: i32) -> StoreResult<bool>;
}

/// Which positional columns make up a category's uniqueness key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotKey {
    SemesterAndTask,
    LessonAndTask,
    LessonOnly,
}

impl SlotKey {
    /// `None` for categories that number variants instead of rejecting.
    pub fn for_task(task: &NewTask) -> Option<SlotKey> {
        match task.category {
            Category::ControlWork | Category::Test if task.task_order.is_some() => None,
            Category::Demo => Some(SlotKey::SemesterAndTask),
            Category::Homework | Category::Theory => Some(SlotKey::LessonAndTask),
            _ => Some(SlotKey::LessonOnly),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DuplicateReason {
    /// The source link is already catalogued.
    Link,
    /// Same classification and position.
    Slot,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    Accept { variant: Option<i32> },
    Reject(DuplicateReason),
}

/// Decide whether `task` may be inserted and with which variant.
/// `task` must already be canonical (tier redirected).
pub fn resolve(task: &NewTask, lookup: &impl CatalogLookup) -> StoreResult<Resolution> {
    if lookup.link_exists(&task.link)? {
        return Ok(Resolution::Reject(DuplicateReason::Link));
    }

    match SlotKey::for_task(task) {
        Some(key) => {
            if lookup.slot_taken(task, key)? {
                return Ok(Resolution::Reject(DuplicateReason::Slot));
            }
            Ok(Resolution::Accept { variant: None })
        }
        None => {
            // An imported variant survives if nobody took it meanwhile.
            if let Some(wanted) = task.variant.filter(|v| *v > 0) {
                if !lookup.variant_taken(task, wanted)? {
                    return Ok(Resolution::Accept { variant: Some(wanted) });
                }
            }
            let next = lookup.max_variant(task)?.unwrap_or(0) + 1;
            Ok(Resolution::Accept { variant: Some(next) })
        }
    }
}

/// Preview used by the submission flow before media is collected:
/// only the duplicate decision matters there.
pub fn is_duplicate(task: &NewTask, lookup: &impl CatalogLookup) -> StoreResult<Option<DuplicateReason>> {
    Ok(match resolve(task, lookup)? {
        Resolution::Reject(reason) => Some(reason),
        Resolution::Accept { .. } => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Tier;

    #[derive(Default)]
    struct Fake {
        links: Vec<TaskLink>,
        taken_slot: bool,
        variants: Vec<i32>,
    }

    impl CatalogLookup for Fake {
        fn link_exists(&self, link: &TaskLink) -> StoreResult<bool> {
            Ok(self.links.contains(link))
        }
        fn slot_taken(&self, _task: &NewTask, _key: SlotKey) -> StoreResult<bool> {
            Ok(self.taken_slot)
        }
        fn max_variant(&self, _task: &NewTask) -> StoreResult<Option<i32>> {
            Ok(self.variants.iter().copied().max())
        }
        fn variant_taken(&self, _task: &NewTask, variant: i32) -> StoreResult<bool> {
            Ok(self.variants.contains(&variant))
        }
    }

    fn task(category: Category, task_order: Option<i32>) -> NewTask {
        NewTask {
            link: TaskLink { lesson_number: "100".into(), task_number: "200".into() },
            grade: 9,
            subject: "Алгебра".into(),
            tier: Tier::Regular,
            category,
            position: Some(1),
            task_order,
            variant: None,
            media: vec!["m.jpg".into()],
            is_moderated: true,
            submitted_by: 1,
            created_at: None,
        }
    }

    #[test]
    fn slot_keys_per_category() {
        assert_eq!(SlotKey::for_task(&task(Category::Demo, Some(1))), Some(SlotKey::SemesterAndTask));
        assert_eq!(SlotKey::for_task(&task(Category::Homework, Some(1))), Some(SlotKey::LessonAndTask));
        assert_eq!(SlotKey::for_task(&task(Category::Theory, Some(1))), Some(SlotKey::LessonAndTask));
        assert_eq!(SlotKey::for_task(&task(Category::ControlWork, Some(1))), None);
        assert_eq!(SlotKey::for_task(&task(Category::Test, Some(1))), None);
        assert_eq!(SlotKey::for_task(&task(Category::Test, None)), Some(SlotKey::LessonOnly));
    }

    #[test]
    fn link_rejects_every_category() {
        for c in Category::ALL {
            let t = task(c, Some(2));
            let fake = Fake { links: vec![t.link.clone()], ..Default::default() };
            assert_eq!(resolve(&t, &fake).unwrap(), Resolution::Reject(DuplicateReason::Link));
        }
    }

    #[test]
    fn taken_slot_rejects_non_variant_categories() {
        let fake = Fake { taken_slot: true, ..Default::default() };
        for c in [Category::Homework, Category::Theory, Category::Demo] {
            assert_eq!(
                resolve(&task(c, Some(2)), &fake).unwrap(),
                Resolution::Reject(DuplicateReason::Slot)
            );
        }
        // Slot occupancy never blocks a new variant.
        assert_eq!(
            resolve(&task(Category::ControlWork, Some(2)), &fake).unwrap(),
            Resolution::Accept { variant: Some(1) }
        );
    }

    #[test]
    fn variants_count_up_from_one() {
        let fake = Fake { variants: vec![1, 2], ..Default::default() };
        assert_eq!(
            resolve(&task(Category::Test, Some(4)), &fake).unwrap(),
            Resolution::Accept { variant: Some(3) }
        );
        assert_eq!(
            resolve(&task(Category::Test, Some(4)), &Fake::default()).unwrap(),
            Resolution::Accept { variant: Some(1) }
        );
    }

    #[test]
    fn requested_variant_kept_only_when_free() {
        let fake = Fake { variants: vec![1, 2], ..Default::default() };
        let mut t = task(Category::ControlWork, Some(4));
        t.variant = Some(5);
        assert_eq!(resolve(&t, &fake).unwrap(), Resolution::Accept { variant: Some(5) });
        t.variant = Some(2);
        assert_eq!(resolve(&t, &fake).unwrap(), Resolution::Accept { variant: Some(3) });
    }

    #[test]
    fn fresh_slot_accepts_without_variant() {
        assert_eq!(
            is_duplicate(&task(Category::Homework, Some(1)), &Fake::default()).unwrap(),
            None
        );
        assert_eq!(
            resolve(&task(Category::Demo, Some(1)), &Fake::default()).unwrap(),
            Resolution::Accept { variant: None }
        );
    }
}
