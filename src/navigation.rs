//! Facet navigation over the moderated catalog.
//!
//! Stateless functions over a [`SearchSelection`]: given what has been chosen
//! so far, [`next_step`] returns the next legal choice set, or the resolved
//! task once the selection is complete. Choice sets come from the store, so
//! only facets with moderated content are ever offered.

use thiserror::Error;
use tracing::{debug, instrument};

use crate::domain::{Category, FacetScope, PositionKind, Task, TaskLink, Tier};
use crate::error::StoreResult;
use crate::store::{Catalog, TaskFilter};
use crate::token::Token;
use crate::util::parse_task_link;

/// Facets chosen so far in one conversation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchSelection {
    pub grade: Option<i32>,
    pub subject: Option<String>,
    pub tier: Option<Tier>,
    pub category: Option<Category>,
    pub position: Option<i32>,
    pub task_order: Option<i32>,
    pub variant: Option<i32>,
}

/// A single facet choice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Facet {
    Grade(i32),
    Subject(String),
    Tier(Tier),
    Category(Category),
    Position(PositionKind, i32),
    TaskOrder(i32),
    Variant(i32),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum NavError {
    /// A prerequisite facet is unset (lost session, stale button).
    #[error("selection expired")]
    Expired,
    /// The choice does not fit the current selection.
    #[error("choice not available")]
    Invalid,
}

impl SearchSelection {
    pub fn is_empty(&self) -> bool {
        *self == SearchSelection::default()
    }

    pub fn scope(&self) -> Option<FacetScope> {
        Some(FacetScope {
            grade: self.grade?,
            subject: self.subject.clone()?,
            tier: self.tier?,
            category: self.category?,
        })
    }

    /// Record a choice and clear everything after it.
    pub fn choose(&mut self, facet: Facet) -> Result<(), NavError> {
        match facet {
            Facet::Grade(g) => {
                *self = SearchSelection { grade: Some(g), ..Default::default() };
            }
            Facet::Subject(s) => {
                self.grade.ok_or(NavError::Expired)?;
                self.subject = Some(s);
                self.tier = None;
                self.clear_from_category();
            }
            Facet::Tier(t) => {
                self.subject.as_ref().ok_or(NavError::Expired)?;
                self.tier = Some(t);
                self.clear_from_category();
            }
            Facet::Category(c) => {
                let tier = self.tier.ok_or(NavError::Expired)?;
                if !tier.admits(c) {
                    return Err(NavError::Invalid);
                }
                self.clear_from_category();
                self.category = Some(c);
            }
            Facet::Position(kind, n) => {
                let category = self.category.ok_or(NavError::Expired)?;
                if category.position_kind() != kind {
                    return Err(NavError::Invalid);
                }
                self.position = Some(n);
                self.task_order = None;
                self.variant = None;
            }
            Facet::TaskOrder(n) => {
                self.position.ok_or(NavError::Expired)?;
                self.task_order = Some(n);
                self.variant = None;
            }
            Facet::Variant(v) => {
                self.task_order.ok_or(NavError::Expired)?;
                self.variant = Some(v);
            }
        }
        Ok(())
    }

    fn clear_from_category(&mut self) {
        self.category = None;
        self.position = None;
        self.task_order = None;
        self.variant = None;
    }

    /// Align the selection with a task shown directly (by id or link).
    fn follow(&mut self, task: &Task) {
        let tier = match self.tier {
            // Keep an Inverted selection when the task was only redirected to Regular.
            Some(t) if t.effective_for(task.category) == task.tier => t,
            _ => task.tier,
        };
        *self = SearchSelection {
            grade: Some(task.grade),
            subject: Some(task.subject.clone()),
            tier: Some(tier),
            category: Some(task.category),
            position: task.position(),
            task_order: task.task_order,
            variant: task.variant,
        };
    }
}

/// Neighbour moves offered next to a resolved task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Move {
    PrevTaskOrder(i32),
    NextTaskOrder(i32),
    PrevVariant(i32),
    NextVariant(i32),
    PrevTask(i64),
    NextTask(i64),
    PrevLesson(i32),
    NextLesson(i32),
}

impl Move {
    pub fn token(self) -> Token {
        match self {
            Move::PrevTaskOrder(n) | Move::NextTaskOrder(n) => Token::SearchTaskOrder(n),
            Move::PrevVariant(n) | Move::NextVariant(n) => Token::SearchVariant(n),
            Move::PrevTask(id) | Move::NextTask(id) => Token::ShowTask(id),
            Move::PrevLesson(n) | Move::NextLesson(n) => Token::SearchLesson(n),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedTask {
    pub task: Task,
    pub moves: Vec<Move>,
    /// Lesson whose full listing can be requested.
    pub lesson_listing: Option<i32>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FacetStep {
    Grades(Vec<i32>),
    Subjects(Vec<String>),
    Tiers(Vec<Tier>),
    Categories(Vec<Category>),
    Positions { kind: PositionKind, values: Vec<i32> },
    TaskOrders { values: Vec<i32>, lesson_listing: Option<i32> },
    Variants(Vec<i32>),
    Resolved(ResolvedTask),
    /// The selection points at nothing (content removed meanwhile).
    NotFound,
}

fn neighbours<T: PartialEq + Copy>(list: &[T], current: T) -> (Option<T>, Option<T>) {
    match list.iter().position(|x| *x == current) {
        Some(i) => (
            i.checked_sub(1).and_then(|p| list.get(p).copied()),
            list.get(i + 1).copied(),
        ),
        None => (None, None),
    }
}

fn lists_whole_lesson(category: Category) -> bool {
    matches!(category, Category::Homework | Category::Theory)
}

/// Categories under `tier` that have content for this grade and subject.
fn categories_with_content(catalog: &Catalog, grade: i32, subject: &str, tier: Tier) -> StoreResult<Vec<Category>> {
    let classes = catalog.classes(grade, subject)?;
    Ok(tier
        .categories()
        .iter()
        .copied()
        .filter(|c| classes.contains(&(tier.effective_for(*c), *c)))
        .collect())
}

/// The next legal choice set for `sel`.
#[instrument(level = "debug", skip(catalog))]
pub fn next_step(catalog: &Catalog, sel: &SearchSelection) -> StoreResult<FacetStep> {
    let Some(grade) = sel.grade else {
        return Ok(FacetStep::Grades(catalog.grades()?));
    };
    let Some(subject) = sel.subject.as_deref() else {
        return Ok(FacetStep::Subjects(catalog.subjects(grade)?));
    };
    let Some(tier) = sel.tier else {
        let mut tiers = vec![];
        for t in Tier::ALL {
            if !categories_with_content(catalog, grade, subject, t)?.is_empty() {
                tiers.push(t);
            }
        }
        return Ok(FacetStep::Tiers(tiers));
    };
    let Some(category) = sel.category else {
        return Ok(FacetStep::Categories(categories_with_content(catalog, grade, subject, tier)?));
    };
    let scope = FacetScope { grade, subject: subject.to_string(), tier, category };

    let Some(position) = sel.position else {
        return Ok(FacetStep::Positions { kind: category.position_kind(), values: catalog.positions(&scope)? });
    };
    let Some(task_order) = sel.task_order else {
        let values = catalog.task_orders(&scope, position)?;
        let lesson_listing = (lists_whole_lesson(category) && values.len() > 1).then_some(position);
        return Ok(FacetStep::TaskOrders { values, lesson_listing });
    };

    let variant = match sel.variant {
        Some(v) => Some(v),
        None => {
            let variants = catalog.variants(&scope, position, task_order)?;
            if variants.len() > 1 {
                return Ok(FacetStep::Variants(variants));
            }
            variants.first().copied()
        }
    };

    let filter = TaskFilter { task_order: Some(task_order), variant, ..TaskFilter::scope(&scope).at_position(position) };
    let Some(task) = catalog.search(&filter)?.into_iter().next() else {
        debug!(target: "navigation", ?sel, "Selection resolves to nothing");
        return Ok(FacetStep::NotFound);
    };
    Ok(FacetStep::Resolved(resolve_view(catalog, &scope, task)?))
}

/// Attach neighbour moves to a task, per category.
fn resolve_view(catalog: &Catalog, scope: &FacetScope, task: Task) -> StoreResult<ResolvedTask> {
    let mut moves = vec![];
    let mut lesson_listing = None;
    let Some(position) = task.position() else {
        return Ok(ResolvedTask { task, moves, lesson_listing });
    };

    match scope.category {
        Category::ControlWork | Category::Test => {
            if let Some(order) = task.task_order {
                let (prev, next) = neighbours(&catalog.task_orders(scope, position)?, order);
                moves.extend(prev.map(Move::PrevTaskOrder));
                moves.extend(next.map(Move::NextTaskOrder));
                if let Some(v) = task.variant {
                    let (prev, next) = neighbours(&catalog.variants(scope, position, order)?, v);
                    moves.extend(prev.map(Move::PrevVariant));
                    moves.extend(next.map(Move::NextVariant));
                }
            }
        }
        Category::Demo | Category::Homework | Category::Theory => {
            let siblings: Vec<i64> = catalog
                .search(&TaskFilter::scope(scope).at_position(position))?
                .iter()
                .map(|t| t.id)
                .collect();
            let (prev, next) = neighbours(&siblings, task.id);
            moves.extend(prev.map(Move::PrevTask));
            moves.extend(next.map(Move::NextTask));

            if lists_whole_lesson(scope.category) {
                let (prev_lesson, next_lesson) = neighbours(&catalog.positions(scope)?, position);
                if prev.is_none() {
                    moves.extend(prev_lesson.map(Move::PrevLesson));
                }
                if next.is_none() {
                    moves.extend(next_lesson.map(Move::NextLesson));
                }
                if siblings.len() > 1 {
                    lesson_listing = Some(position);
                }
            }
        }
    }
    Ok(ResolvedTask { task, moves, lesson_listing })
}

/// Show a moderated task by id and move the selection onto it.
#[instrument(level = "debug", skip(catalog, sel))]
pub fn open_task(catalog: &Catalog, sel: &mut SearchSelection, id: i64) -> StoreResult<Option<ResolvedTask>> {
    let Some(task) = catalog.get(id)?.filter(|t| t.is_moderated) else {
        return Ok(None);
    };
    sel.follow(&task);
    let Some(scope) = sel.scope() else {
        return Ok(None);
    };
    Ok(Some(resolve_view(catalog, &scope, task)?))
}

/// Every task of one lesson, in listing order.
pub fn lesson_listing(catalog: &Catalog, sel: &mut SearchSelection, lesson: i32) -> Result<Vec<Task>, LessonError> {
    let scope = sel.scope().ok_or(LessonError::Nav(NavError::Expired))?;
    if scope.category.position_kind() != PositionKind::Lesson {
        return Err(LessonError::Nav(NavError::Invalid));
    }
    sel.position = Some(lesson);
    sel.task_order = None;
    sel.variant = None;
    Ok(catalog.search(&TaskFilter::scope(&scope).at_position(lesson))?)
}

#[derive(Debug, Error)]
pub enum LessonError {
    #[error(transparent)]
    Nav(NavError),
    #[error(transparent)]
    Store(#[from] crate::error::StoreError),
}

pub enum LinkLookup {
    /// The text carries no recognisable link.
    NoLink,
    Found(ResolvedTask),
    Missing(TaskLink),
}

/// Look a pasted course link up in the moderated catalog.
pub fn lookup_link(catalog: &Catalog, sel: &mut SearchSelection, text: &str) -> StoreResult<LinkLookup> {
    let Some(link) = parse_task_link(text) else {
        return Ok(LinkLookup::NoLink);
    };
    let Some(task) = catalog.find_by_link(&link)? else {
        return Ok(LinkLookup::Missing(link));
    };
    sel.follow(&task);
    let Some(scope) = sel.scope() else {
        return Ok(LinkLookup::Missing(link));
    };
    Ok(LinkLookup::Found(resolve_view(catalog, &scope, task)?))
}
