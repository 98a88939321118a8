//! Domain models: tiers, categories, task links and the catalog task itself.
//!
//! The classification rules that several components need (tier redirection,
//! which positional slot a category uses, which categories a tier offers) live
//! here as plain functions on the closed enums, so every caller asks the same
//! question the same way.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Conversation identity as reported by the chat transport.
pub type ConversationId = i64;

pub const MIN_GRADE: i32 = 5;
pub const MAX_GRADE: i32 = 11;

/// Difficulty / track of a task.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
  Regular,
  Profile,
  Inverted,
}

impl Tier {
  pub const ALL: [Tier; 3] = [Tier::Regular, Tier::Profile, Tier::Inverted];

  pub fn ordinal(self) -> u8 {
    match self {
      Tier::Regular => 0,
      Tier::Profile => 1,
      Tier::Inverted => 2,
    }
  }

  pub fn from_ordinal(n: u8) -> Option<Self> {
    Self::ALL.get(n as usize).copied()
  }

  /// Tier actually stored/queried for `category`.
  /// Inverted has no demo, control or test content of its own; those live under Regular.
  pub fn effective_for(self, category: Category) -> Tier {
    match (self, category) {
      (Tier::Inverted, Category::Demo | Category::ControlWork | Category::Test) => Tier::Regular,
      (tier, _) => tier,
    }
  }

  /// Whether `category` is legal under this tier, counting the Regular redirect.
  pub fn admits(self, category: Category) -> bool {
    self.effective_for(category).categories().contains(&category)
  }

  /// Categories a user may pick after choosing this tier.
  pub fn categories(self) -> &'static [Category] {
    match self {
      Tier::Inverted => &[Category::Theory, Category::Homework],
      Tier::Regular | Tier::Profile => &[Category::Homework, Category::Test, Category::Demo, Category::ControlWork],
    }
  }
}

/// Kind of assignment.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
  Homework,
  Test,
  Demo,
  ControlWork,
  Theory,
}

/// Which positional field locates a task inside its category.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PositionKind {
  Lesson,
  Semester,
}

impl Category {
  pub const ALL: [Category; 5] = [
    Category::Homework,
    Category::Test,
    Category::Demo,
    Category::ControlWork,
    Category::Theory,
  ];

  pub fn ordinal(self) -> u8 {
    match self {
      Category::Homework => 0,
      Category::Test => 1,
      Category::Demo => 2,
      Category::ControlWork => 3,
      Category::Theory => 4,
    }
  }

  pub fn from_ordinal(n: u8) -> Option<Self> {
    Self::ALL.get(n as usize).copied()
  }

  pub fn position_kind(self) -> PositionKind {
    match self {
      Category::Demo | Category::ControlWork => PositionKind::Semester,
      Category::Homework | Category::Test | Category::Theory => PositionKind::Lesson,
    }
  }

  /// Every current category is indexed by task number; kept as a rule so the
  /// protocol and the resolver branch on one definition.
  pub fn needs_task_order(self) -> bool {
    matches!(
      self,
      Category::Homework | Category::ControlWork | Category::Test | Category::Theory | Category::Demo
    )
  }

  /// ControlWork and Test recur as parallel forms and are numbered by variant.
  pub fn has_variants(self) -> bool {
    matches!(self, Category::ControlWork | Category::Test)
  }
}

/// Source link identifiers, the natural key of a task.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct TaskLink {
  pub lesson_number: String,
  pub task_number: String,
}

impl TaskLink {
  pub fn url(&self) -> String {
    format!("https://foxford.ru/lessons/{}/tasks/{}", self.lesson_number, self.task_number)
  }
}

/// A catalog record as stored and exported.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
  #[serde(default)] pub id: i64,
  #[serde(flatten)] pub link: TaskLink,
  pub grade: i32,
  pub subject: String,
  pub tier: Tier,
  pub category: Category,
  #[serde(default)] pub lesson_order: Option<i32>,
  #[serde(default)] pub task_order: Option<i32>,
  #[serde(default)] pub variant: Option<i32>,
  #[serde(default)] pub semester: Option<i32>,
  #[serde(default)] pub media: Vec<String>,
  pub created_at: DateTime<Utc>,
  #[serde(default)] pub is_moderated: bool,
  #[serde(default)] pub submitted_by: ConversationId,
}

impl Task {
  /// Lesson or semester, whichever the category uses.
  pub fn position(&self) -> Option<i32> {
    match self.category.position_kind() {
      PositionKind::Lesson => self.lesson_order,
      PositionKind::Semester => self.semester,
    }
  }

  pub fn scope(&self) -> FacetScope {
    FacetScope {
      grade: self.grade,
      subject: self.subject.clone(),
      tier: self.tier,
      category: self.category,
    }
  }
}

/// A task ready to be inserted: everything except the store-assigned fields.
#[derive(Clone, Debug, PartialEq)]
pub struct NewTask {
  pub link: TaskLink,
  pub grade: i32,
  pub subject: String,
  pub tier: Tier,
  pub category: Category,
  pub position: Option<i32>,
  pub task_order: Option<i32>,
  /// Requested variant; only honoured on import, fresh submissions leave it empty.
  pub variant: Option<i32>,
  pub media: Vec<String>,
  pub is_moderated: bool,
  pub submitted_by: ConversationId,
  pub created_at: Option<DateTime<Utc>>,
}

impl NewTask {
  /// Apply tier redirection and drop fields the category does not use.
  pub fn canonical(mut self) -> Self {
    self.tier = self.tier.effective_for(self.category);
    if !self.category.needs_task_order() {
      self.task_order = None;
    }
    if !(self.category.has_variants() && self.task_order.is_some()) {
      self.variant = None;
    }
    self
  }

  pub fn lesson_order(&self) -> Option<i32> {
    match self.category.position_kind() {
      PositionKind::Lesson => self.position,
      PositionKind::Semester => None,
    }
  }

  pub fn semester(&self) -> Option<i32> {
    match self.category.position_kind() {
      PositionKind::Semester => self.position,
      PositionKind::Lesson => None,
    }
  }

  /// Rebuild an insert candidate from an exported record.
  pub fn from_record(task: Task) -> Self {
    let position = task.position();
    NewTask {
      link: task.link,
      grade: task.grade,
      subject: task.subject,
      tier: task.tier,
      category: task.category,
      position,
      task_order: task.task_order,
      variant: task.variant,
      media: task.media,
      is_moderated: task.is_moderated,
      submitted_by: task.submitted_by,
      created_at: Some(task.created_at),
    }
  }
}

/// Grade/subject/tier/category: the facets shared by every positional query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FacetScope {
  pub grade: i32,
  pub subject: String,
  pub tier: Tier,
  pub category: Category,
}

impl FacetScope {
  pub fn effective_tier(&self) -> Tier {
    self.tier.effective_for(self.category)
  }
}

/// Counters shown on the curator panel.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
  pub total_users: i64,
  pub total_tasks: i64,
  pub pending_tasks: i64,
  pub last_task_added: Option<DateTime<Utc>>,
  pub last_task_requested: Option<DateTime<Utc>>,
}

/// Who is sending a turn; display fields only.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderInfo {
  #[serde(default)] pub first_name: Option<String>,
  #[serde(default)] pub username: Option<String>,
}

pub fn tier_label(tier: Tier) -> &'static str {
  match tier {
    Tier::Regular => "Обычный",
    Tier::Profile => "Профильный",
    Tier::Inverted => "Перевернутый",
  }
}

pub fn category_label(category: Category) -> &'static str {
  match category {
    Category::Homework => "Домашняя работа",
    Category::Test => "Проверочная",
    Category::Demo => "Демоверсия",
    Category::ControlWork => "Контрольная",
    Category::Theory => "Задачи по теории",
  }
}
