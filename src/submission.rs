//! Submission protocol: builds one catalog task across many turns.
//!
//! One [`SubmissionDraft`] per conversation, driven by [`advance`]. The draft
//! moves through named steps:
//!
//! ```text
//! AwaitLink -> AwaitGrade -> AwaitSubject -> AwaitTier -> AwaitCategory
//!           -> AwaitPosition -> AwaitTaskOrder -> AwaitMedia -> commit
//! ```
//!
//! Curator drafts commit moderated; contributor drafts commit pending and
//! queue a notification for the curator. A curator batch pins
//! grade/subject/tier/category/position once and then loops link -> task
//! index -> media for as many tasks as needed.
//!
//! The engine never touches media files itself: discarded references are
//! handed back in the outcome and the caller removes them.

use tracing::{debug, info, instrument, warn};

use crate::domain::{Category, ConversationId, NewTask, Task, TaskLink, Tier, MAX_GRADE, MIN_GRADE};
use crate::error::StoreResult;
use crate::notify::{NotifyEvent, Notifier};
use crate::resolver::DuplicateReason;
use crate::store::{Catalog, InsertOutcome};
use crate::util::{parse_positive, parse_task_link};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Curator,
    Contributor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DraftStep {
    AwaitLink,
    AwaitGrade,
    AwaitSubject,
    AwaitTier,
    AwaitCategory,
    AwaitPosition,
    AwaitTaskOrder,
    AwaitMedia,
}

/// Facets fixed for a whole curator batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchPins {
    pub grade: i32,
    pub subject: String,
    pub tier: Tier,
    pub category: Category,
    pub position: i32,
}

#[derive(Clone, Debug)]
pub struct SubmissionDraft {
    pub role: Role,
    pub step: DraftStep,
    pub batch: bool,
    pub pins: Option<BatchPins>,
    pub link: Option<TaskLink>,
    pub grade: Option<i32>,
    pub subject: Option<String>,
    pub tier: Option<Tier>,
    pub category: Option<Category>,
    pub position: Option<i32>,
    pub task_order: Option<i32>,
    pub media: Vec<String>,
}

/// One turn's worth of input for the draft.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DraftInput {
    Text(String),
    Grade(i32),
    Subject(String),
    Tier(Tier),
    Category(Category),
    /// Reference of an already stored media item.
    Media(String),
    RemoveLast,
    Finish,
    Save,
    Cancel,
    ExitBatch,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Invalid {
    Link,
    Grade,
    Subject,
    CategoryForTier,
    NotPositive,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DraftOutcome {
    /// Show the prompt for the draft's current step.
    Prompt,
    /// Batch facets pinned; the draft now waits for a link.
    Pinned,
    /// Bad input; the current step is prompted again.
    Invalid(Invalid),
    /// The input does not belong to the current step.
    Unexpected,
    Duplicate { reason: DuplicateReason, discarded: Vec<String>, batch_continues: bool },
    MediaAccepted { count: usize },
    MediaRemoved { removed: String, count: usize },
    NothingToRemove,
    ConfirmFinish { count: usize },
    NeedMedia,
    Committed { task: Task, batch_continues: bool },
    Cancelled { discarded: Vec<String> },
    /// A required field went missing; the draft is dropped.
    Expired { discarded: Vec<String> },
}

/// Collaborators a draft needs to run.
pub struct SubmitContext<'a> {
    pub catalog: &'a Catalog,
    pub notifier: &'a Notifier,
    pub subjects: &'a [String],
    pub curator: Option<ConversationId>,
    pub submitter: ConversationId,
}

impl SubmissionDraft {
    fn empty(role: Role, step: DraftStep, batch: bool) -> Self {
        SubmissionDraft {
            role,
            step,
            batch,
            pins: None,
            link: None,
            grade: None,
            subject: None,
            tier: None,
            category: None,
            position: None,
            task_order: None,
            media: vec![],
        }
    }

    pub fn contributor() -> Self {
        Self::empty(Role::Contributor, DraftStep::AwaitLink, false)
    }

    pub fn curator_single() -> Self {
        Self::empty(Role::Curator, DraftStep::AwaitLink, false)
    }

    pub fn curator_batch() -> Self {
        Self::empty(Role::Curator, DraftStep::AwaitGrade, true)
    }

    pub fn accepts_media(&self) -> bool {
        self.step == DraftStep::AwaitMedia
    }

    /// Fresh single-task draft inside the same batch.
    fn next_in_batch(&self) -> Self {
        let mut next = Self::empty(self.role, DraftStep::AwaitLink, true);
        next.pins = self.pins.clone();
        next
    }

    fn apply_pins(&mut self) {
        if let Some(p) = &self.pins {
            self.grade = Some(p.grade);
            self.subject = Some(p.subject.clone());
            self.tier = Some(p.tier);
            self.category = Some(p.category);
            self.position = Some(p.position);
        }
    }

    fn candidate(&self, submitter: ConversationId) -> Option<NewTask> {
        Some(NewTask {
            link: self.link.clone()?,
            grade: self.grade?,
            subject: self.subject.clone()?,
            tier: self.tier?,
            category: self.category?,
            position: Some(self.position?),
            task_order: self.task_order,
            variant: None,
            media: self.media.clone(),
            is_moderated: self.role == Role::Curator,
            submitted_by: submitter,
            created_at: None,
        })
    }
}

fn grade_from_text(text: &str) -> Option<i32> {
    text.trim().parse::<i32>().ok()
}

/// Drive the draft in `slot` with one input. The slot is emptied whenever the
/// draft ends (commit outside a batch, cancel, duplicate outside a batch).
#[instrument(level = "info", skip(slot, ctx), fields(submitter = ctx.submitter, step = ?slot.as_ref().map(|d| d.step)))]
pub fn advance(slot: &mut Option<SubmissionDraft>, input: DraftInput, ctx: &SubmitContext<'_>) -> StoreResult<DraftOutcome> {
    let Some(draft) = slot.as_mut() else {
        return Ok(DraftOutcome::Expired { discarded: vec![] });
    };

    match input {
        DraftInput::Cancel => {
            let discarded = std::mem::take(&mut draft.media);
            info!(target: "submission", submitter = ctx.submitter, media = discarded.len(), "Draft cancelled");
            *slot = None;
            return Ok(DraftOutcome::Cancelled { discarded });
        }
        DraftInput::ExitBatch if draft.batch => {
            let discarded = std::mem::take(&mut draft.media);
            info!(target: "submission", submitter = ctx.submitter, "Batch closed");
            *slot = None;
            return Ok(DraftOutcome::Cancelled { discarded });
        }
        _ => {}
    }

    match (draft.step, input) {
        (DraftStep::AwaitLink, DraftInput::Text(text)) => {
            let Some(link) = parse_task_link(&text) else {
                return Ok(DraftOutcome::Invalid(Invalid::Link));
            };
            draft.link = Some(link);
            if draft.pins.is_some() {
                draft.apply_pins();
                return after_position(slot, ctx);
            }
            draft.step = DraftStep::AwaitGrade;
            Ok(DraftOutcome::Prompt)
        }

        (DraftStep::AwaitGrade, DraftInput::Grade(g)) => set_grade(draft, Some(g)),
        (DraftStep::AwaitGrade, DraftInput::Text(t)) => set_grade(draft, grade_from_text(&t)),

        (DraftStep::AwaitSubject, DraftInput::Subject(s) | DraftInput::Text(s)) => {
            let s = s.trim().to_string();
            if !ctx.subjects.iter().any(|known| *known == s) {
                return Ok(DraftOutcome::Invalid(Invalid::Subject));
            }
            draft.subject = Some(s);
            draft.step = DraftStep::AwaitTier;
            Ok(DraftOutcome::Prompt)
        }

        (DraftStep::AwaitTier, DraftInput::Tier(t)) => {
            draft.tier = Some(t);
            draft.step = DraftStep::AwaitCategory;
            Ok(DraftOutcome::Prompt)
        }

        (DraftStep::AwaitCategory, DraftInput::Category(c)) => {
            let Some(tier) = draft.tier else {
                return Ok(expire(slot));
            };
            if !tier.admits(c) {
                return Ok(DraftOutcome::Invalid(Invalid::CategoryForTier));
            }
            draft.category = Some(c);
            draft.step = DraftStep::AwaitPosition;
            Ok(DraftOutcome::Prompt)
        }

        (DraftStep::AwaitPosition, DraftInput::Text(t)) => {
            let Some(n) = parse_positive(&t) else {
                return Ok(DraftOutcome::Invalid(Invalid::NotPositive));
            };
            draft.position = Some(n);
            if draft.batch && draft.pins.is_none() {
                let pins = match (draft.grade, draft.subject.clone(), draft.tier, draft.category) {
                    (Some(grade), Some(subject), Some(tier), Some(category)) => {
                        BatchPins { grade, subject, tier, category, position: n }
                    }
                    _ => return Ok(expire(slot)),
                };
                info!(target: "submission", submitter = ctx.submitter, ?pins, "Batch facets pinned");
                draft.pins = Some(pins);
                draft.step = DraftStep::AwaitLink;
                return Ok(DraftOutcome::Pinned);
            }
            after_position(slot, ctx)
        }

        (DraftStep::AwaitTaskOrder, DraftInput::Text(t)) => {
            let Some(n) = parse_positive(&t) else {
                return Ok(DraftOutcome::Invalid(Invalid::NotPositive));
            };
            draft.task_order = Some(n);
            enter_media_after_check(slot, ctx)
        }

        (DraftStep::AwaitMedia, DraftInput::Media(r)) => {
            draft.media.push(r);
            Ok(DraftOutcome::MediaAccepted { count: draft.media.len() })
        }
        (DraftStep::AwaitMedia, DraftInput::RemoveLast) => match draft.media.pop() {
            Some(removed) => Ok(DraftOutcome::MediaRemoved { removed, count: draft.media.len() }),
            None => Ok(DraftOutcome::NothingToRemove),
        },
        (DraftStep::AwaitMedia, DraftInput::Finish) => {
            if draft.media.is_empty() {
                return Ok(DraftOutcome::NeedMedia);
            }
            Ok(DraftOutcome::ConfirmFinish { count: draft.media.len() })
        }
        (DraftStep::AwaitMedia, DraftInput::Save) => commit(slot, ctx),

        (step, input) => {
            debug!(target: "submission", ?step, ?input, "Input does not fit the current step");
            Ok(DraftOutcome::Unexpected)
        }
    }
}

fn set_grade(draft: &mut SubmissionDraft, grade: Option<i32>) -> StoreResult<DraftOutcome> {
    match grade.filter(|g| (MIN_GRADE..=MAX_GRADE).contains(g)) {
        Some(g) => {
            draft.grade = Some(g);
            draft.step = DraftStep::AwaitSubject;
            Ok(DraftOutcome::Prompt)
        }
        None => Ok(DraftOutcome::Invalid(Invalid::Grade)),
    }
}

/// Position known: go to the task index, or straight to media.
fn after_position(slot: &mut Option<SubmissionDraft>, ctx: &SubmitContext<'_>) -> StoreResult<DraftOutcome> {
    let Some(draft) = slot.as_mut() else {
        return Ok(DraftOutcome::Expired { discarded: vec![] });
    };
    let Some(category) = draft.category else {
        return Ok(expire(slot));
    };
    if category.needs_task_order() {
        draft.step = DraftStep::AwaitTaskOrder;
        return Ok(DraftOutcome::Prompt);
    }
    if draft.role == Role::Contributor {
        return enter_media_after_check(slot, ctx);
    }
    draft.step = DraftStep::AwaitMedia;
    Ok(DraftOutcome::Prompt)
}

/// Duplicate preview before any media is collected.
fn enter_media_after_check(slot: &mut Option<SubmissionDraft>, ctx: &SubmitContext<'_>) -> StoreResult<DraftOutcome> {
    let Some(draft) = slot.as_mut() else {
        return Ok(DraftOutcome::Expired { discarded: vec![] });
    };
    let Some(candidate) = draft.candidate(ctx.submitter) else {
        return Ok(expire(slot));
    };
    if let Some(reason) = ctx.catalog.check_duplicate(&candidate)? {
        return Ok(end_with_duplicate(slot, reason, ctx.submitter));
    }
    draft.step = DraftStep::AwaitMedia;
    Ok(DraftOutcome::Prompt)
}

fn commit(slot: &mut Option<SubmissionDraft>, ctx: &SubmitContext<'_>) -> StoreResult<DraftOutcome> {
    let Some(draft) = slot.as_mut() else {
        return Ok(DraftOutcome::Expired { discarded: vec![] });
    };
    if draft.media.is_empty() {
        return Ok(DraftOutcome::NeedMedia);
    }
    let Some(candidate) = draft.candidate(ctx.submitter) else {
        return Ok(expire(slot));
    };

    match ctx.catalog.insert(candidate)? {
        InsertOutcome::Duplicate(reason) => Ok(end_with_duplicate(slot, reason, ctx.submitter)),
        InsertOutcome::Inserted(task) => {
            let batch_continues = draft.batch;
            if draft.role == Role::Contributor {
                match ctx.curator {
                    Some(curator) => ctx.notifier.notify(NotifyEvent::queued(curator, &task)),
                    None => warn!(target: "submission", task_id = task.id, "No curator configured; submission waits unannounced"),
                }
            }
            info!(target: "submission", task_id = task.id, role = ?draft.role, variant = ?task.variant, "Draft committed");
            *slot = if batch_continues { Some(draft.next_in_batch()) } else { None };
            Ok(DraftOutcome::Committed { task, batch_continues })
        }
    }
}

fn end_with_duplicate(slot: &mut Option<SubmissionDraft>, reason: DuplicateReason, submitter: ConversationId) -> DraftOutcome {
    let Some(draft) = slot.take() else {
        return DraftOutcome::Expired { discarded: vec![] };
    };
    info!(target: "submission", submitter, ?reason, "Draft discarded as duplicate");
    let batch_continues = draft.batch && draft.pins.is_some();
    if batch_continues {
        *slot = Some(draft.next_in_batch());
    }
    DraftOutcome::Duplicate { reason, discarded: draft.media, batch_continues }
}

fn expire(slot: &mut Option<SubmissionDraft>) -> DraftOutcome {
    let discarded = slot.take().map(|d| d.media).unwrap_or_default();
    warn!(target: "submission", "Draft lost a required field; dropped");
    DraftOutcome::Expired { discarded }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotifyQueue;

    const CURATOR: ConversationId = 1;
    const CONTRIBUTOR: ConversationId = 77;

    struct Fixture {
        catalog: Catalog,
        notifier: Notifier,
        queue: NotifyQueue,
        subjects: Vec<String>,
    }

    impl Fixture {
        fn new() -> Self {
            let (notifier, queue) = Notifier::channel();
            Fixture {
                catalog: Catalog::open_in_memory().unwrap(),
                notifier,
                queue,
                subjects: vec!["Алгебра".into(), "Физика".into()],
            }
        }

        fn ctx(&self, submitter: ConversationId) -> SubmitContext<'_> {
            SubmitContext {
                catalog: &self.catalog,
                notifier: &self.notifier,
                subjects: &self.subjects,
                curator: Some(CURATOR),
                submitter,
            }
        }
    }

    fn run(slot: &mut Option<SubmissionDraft>, ctx: &SubmitContext<'_>, inputs: Vec<DraftInput>) -> DraftOutcome {
        let mut last = DraftOutcome::Prompt;
        for input in inputs {
            last = advance(slot, input, ctx).unwrap();
        }
        last
    }

    fn text(s: &str) -> DraftInput {
        DraftInput::Text(s.into())
    }

    fn up_to_media(link: &str, category: Category, position: &str, task: &str) -> Vec<DraftInput> {
        vec![
            text(link),
            DraftInput::Grade(9),
            DraftInput::Subject("Алгебра".into()),
            DraftInput::Tier(Tier::Regular),
            DraftInput::Category(category),
            text(position),
            text(task),
        ]
    }

    #[test]
    fn contributor_homework_is_pending_and_announced() {
        let mut fx = Fixture::new();
        let ctx = fx.ctx(CONTRIBUTOR);
        let mut slot = Some(SubmissionDraft::contributor());

        let out = run(&mut slot, &ctx, up_to_media("https://foxford.ru/lessons/475003/tasks/301386", Category::Homework, "3", "2"));
        assert_eq!(out, DraftOutcome::Prompt);
        assert_eq!(slot.as_ref().unwrap().step, DraftStep::AwaitMedia);

        assert_eq!(advance(&mut slot, DraftInput::Media("m1.jpg".into()), &ctx).unwrap(), DraftOutcome::MediaAccepted { count: 1 });
        assert_eq!(advance(&mut slot, DraftInput::Finish, &ctx).unwrap(), DraftOutcome::ConfirmFinish { count: 1 });
        let DraftOutcome::Committed { task, batch_continues } = advance(&mut slot, DraftInput::Save, &ctx).unwrap() else {
            panic!("expected commit");
        };
        assert!(!batch_continues);
        assert!(slot.is_none());
        assert_eq!(task.grade, 9);
        assert_eq!(task.subject, "Алгебра");
        assert_eq!(task.lesson_order, Some(3));
        assert_eq!(task.task_order, Some(2));
        assert_eq!(task.variant, None);
        assert!(!task.is_moderated);
        assert_eq!(task.submitted_by, CONTRIBUTOR);
        drop(ctx);

        let events = fx.queue.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].recipient(), CURATOR);
    }

    #[test]
    fn curator_batch_numbers_control_work_variants() {
        let mut fx = Fixture::new();
        let ctx = fx.ctx(CURATOR);
        let mut slot = Some(SubmissionDraft::curator_batch());

        let pinned = run(
            &mut slot,
            &ctx,
            vec![
                DraftInput::Grade(9),
                DraftInput::Subject("Алгебра".into()),
                DraftInput::Tier(Tier::Regular),
                DraftInput::Category(Category::ControlWork),
                text("1"),
            ],
        );
        assert_eq!(pinned, DraftOutcome::Pinned);

        let mut variants = vec![];
        for i in 0..3 {
            let out = run(
                &mut slot,
                &ctx,
                vec![
                    text(&format!("https://foxford.ru/lessons/100/tasks/{i}")),
                    text("4"),
                    DraftInput::Media(format!("m{i}.jpg")),
                    DraftInput::Save,
                ],
            );
            let DraftOutcome::Committed { task, batch_continues } = out else {
                panic!("expected commit, got {out:?}");
            };
            assert!(batch_continues);
            assert!(task.is_moderated);
            assert_eq!(task.semester, Some(1));
            variants.push(task.variant);
        }
        assert_eq!(variants, vec![Some(1), Some(2), Some(3)]);
        assert_eq!(slot.as_ref().unwrap().step, DraftStep::AwaitLink);
        drop(ctx);
        // Curator commits are not queued.
        assert!(fx.queue.drain().is_empty());
    }

    #[test]
    fn finish_and_save_need_media() {
        let fx = Fixture::new();
        let ctx = fx.ctx(CURATOR);
        let mut slot = Some(SubmissionDraft::curator_single());
        run(&mut slot, &ctx, up_to_media("lessons/1/tasks/2", Category::Test, "1", "1"));
        assert_eq!(advance(&mut slot, DraftInput::Finish, &ctx).unwrap(), DraftOutcome::NeedMedia);
        assert_eq!(advance(&mut slot, DraftInput::Save, &ctx).unwrap(), DraftOutcome::NeedMedia);
        assert!(slot.is_some());
        assert!(fx.catalog.export_moderated().unwrap().is_empty());
    }

    #[test]
    fn cancel_hands_back_collected_media() {
        let fx = Fixture::new();
        let ctx = fx.ctx(CURATOR);
        let mut slot = Some(SubmissionDraft::curator_single());
        run(&mut slot, &ctx, up_to_media("lessons/1/tasks/2", Category::Homework, "1", "1"));
        advance(&mut slot, DraftInput::Media("a.jpg".into()), &ctx).unwrap();
        advance(&mut slot, DraftInput::Media("b.jpg".into()), &ctx).unwrap();
        assert_eq!(
            advance(&mut slot, DraftInput::RemoveLast, &ctx).unwrap(),
            DraftOutcome::MediaRemoved { removed: "b.jpg".into(), count: 1 }
        );
        assert_eq!(
            advance(&mut slot, DraftInput::Cancel, &ctx).unwrap(),
            DraftOutcome::Cancelled { discarded: vec!["a.jpg".into()] }
        );
        assert!(slot.is_none());
    }

    #[test]
    fn duplicate_homework_ends_the_draft() {
        let fx = Fixture::new();
        let ctx = fx.ctx(CURATOR);
        let mut slot = Some(SubmissionDraft::curator_single());
        run(&mut slot, &ctx, up_to_media("lessons/1/tasks/2", Category::Homework, "3", "2"));
        advance(&mut slot, DraftInput::Media("a.jpg".into()), &ctx).unwrap();
        assert!(matches!(advance(&mut slot, DraftInput::Save, &ctx).unwrap(), DraftOutcome::Committed { .. }));

        let mut slot = Some(SubmissionDraft::contributor());
        let ctx = fx.ctx(CONTRIBUTOR);
        let out = run(&mut slot, &ctx, up_to_media("lessons/9/tasks/9", Category::Homework, "3", "2"));
        assert_eq!(
            out,
            DraftOutcome::Duplicate { reason: DuplicateReason::Slot, discarded: vec![], batch_continues: false }
        );
        assert!(slot.is_none());
    }

    #[test]
    fn same_link_is_rejected_even_for_control_work() {
        let fx = Fixture::new();
        let ctx = fx.ctx(CURATOR);
        let mut slot = Some(SubmissionDraft::curator_single());
        run(&mut slot, &ctx, up_to_media("lessons/5/tasks/6", Category::ControlWork, "1", "1"));
        advance(&mut slot, DraftInput::Media("a.jpg".into()), &ctx).unwrap();
        advance(&mut slot, DraftInput::Save, &ctx).unwrap();

        let mut slot = Some(SubmissionDraft::curator_single());
        let out = run(&mut slot, &ctx, up_to_media("lessons/5/tasks/6", Category::ControlWork, "1", "1"));
        assert!(matches!(out, DraftOutcome::Duplicate { reason: DuplicateReason::Link, .. }));
    }

    #[test]
    fn batch_duplicate_keeps_the_pins() {
        let fx = Fixture::new();
        let ctx = fx.ctx(CURATOR);
        let mut slot = Some(SubmissionDraft::curator_batch());
        run(
            &mut slot,
            &ctx,
            vec![
                DraftInput::Grade(8),
                DraftInput::Subject("Физика".into()),
                DraftInput::Tier(Tier::Profile),
                DraftInput::Category(Category::Homework),
                text("2"),
                text("lessons/1/tasks/1"),
                text("1"),
                DraftInput::Media("a.jpg".into()),
                DraftInput::Save,
            ],
        );
        let out = run(&mut slot, &ctx, vec![text("lessons/1/tasks/2"), text("1")]);
        assert_eq!(
            out,
            DraftOutcome::Duplicate { reason: DuplicateReason::Slot, discarded: vec![], batch_continues: true }
        );
        let draft = slot.as_ref().unwrap();
        assert_eq!(draft.step, DraftStep::AwaitLink);
        assert_eq!(draft.pins.as_ref().map(|p| p.position), Some(2));

        assert_eq!(
            advance(&mut slot, DraftInput::ExitBatch, &ctx).unwrap(),
            DraftOutcome::Cancelled { discarded: vec![] }
        );
        assert!(slot.is_none());
    }

    #[test]
    fn validation_failures_reprompt_the_same_step() {
        let fx = Fixture::new();
        let ctx = fx.ctx(CONTRIBUTOR);
        let mut slot = Some(SubmissionDraft::contributor());

        assert_eq!(advance(&mut slot, text("not a link"), &ctx).unwrap(), DraftOutcome::Invalid(Invalid::Link));
        advance(&mut slot, text("lessons/1/tasks/1"), &ctx).unwrap();
        assert_eq!(advance(&mut slot, DraftInput::Grade(4), &ctx).unwrap(), DraftOutcome::Invalid(Invalid::Grade));
        assert_eq!(advance(&mut slot, text("12"), &ctx).unwrap(), DraftOutcome::Invalid(Invalid::Grade));
        advance(&mut slot, text("10"), &ctx).unwrap();
        assert_eq!(advance(&mut slot, text("Астрономия"), &ctx).unwrap(), DraftOutcome::Invalid(Invalid::Subject));
        advance(&mut slot, DraftInput::Subject("Физика".into()), &ctx).unwrap();
        advance(&mut slot, DraftInput::Tier(Tier::Regular), &ctx).unwrap();
        assert_eq!(
            advance(&mut slot, DraftInput::Category(Category::Theory), &ctx).unwrap(),
            DraftOutcome::Invalid(Invalid::CategoryForTier)
        );
        advance(&mut slot, DraftInput::Category(Category::Homework), &ctx).unwrap();
        assert_eq!(advance(&mut slot, text("0"), &ctx).unwrap(), DraftOutcome::Invalid(Invalid::NotPositive));
        assert_eq!(advance(&mut slot, DraftInput::Media("x".into()), &ctx).unwrap(), DraftOutcome::Unexpected);
        assert_eq!(slot.as_ref().unwrap().step, DraftStep::AwaitPosition);
    }

    #[test]
    fn inverted_control_categories_are_stored_as_regular() {
        let fx = Fixture::new();
        let ctx = fx.ctx(CURATOR);
        for (link, category, position) in [
            ("lessons/40/tasks/1", Category::Test, "2"),
            ("lessons/40/tasks/2", Category::ControlWork, "1"),
        ] {
            let mut slot = Some(SubmissionDraft::curator_single());
            let out = run(
                &mut slot,
                &ctx,
                vec![
                    text(link),
                    DraftInput::Grade(8),
                    DraftInput::Subject("Физика".into()),
                    DraftInput::Tier(Tier::Inverted),
                    DraftInput::Category(category),
                    text(position),
                    text("1"),
                    DraftInput::Media("shot.jpg".into()),
                    DraftInput::Save,
                ],
            );
            let DraftOutcome::Committed { task, .. } = out else {
                panic!("expected commit, got {out:?}");
            };
            assert_eq!(task.tier, Tier::Regular);
            assert_eq!(task.category, category);
            assert_eq!(fx.catalog.get(task.id).unwrap().unwrap().tier, Tier::Regular);
        }
    }
}
