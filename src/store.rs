//! Catalog store on SQLite.
//!
//! One connection behind a mutex: reads and writes are short, and holding the
//! lock across the resolver check and the insert is what makes duplicate
//! suppression and variant numbering atomic. A unique index on the source link
//! backs the check up at the schema level.
//!
//! Every user-facing enumeration is restricted to moderated tasks. The
//! resolver's lookups are not: a pending task still occupies its link and slot.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use tracing::{debug, info, instrument, warn};

use crate::domain::{
    Category, ConversationId, FacetScope, NewTask, PositionKind, SenderInfo, Statistics, Task, TaskLink, Tier,
};
use crate::error::{StoreError, StoreResult};
use crate::resolver::{self, CatalogLookup, DuplicateReason, Resolution, SlotKey};
use crate::util::{pack_media, unpack_media};

const TASK_COLUMNS: &str = "id, lesson_number, task_number, grade, subject, tier, category, \
     lesson_order, task_order, variant, semester, media, created_at, is_moderated, submitted_by";

/// Result of an insert attempt.
#[derive(Clone, Debug, PartialEq)]
pub enum InsertOutcome {
    Inserted(Task),
    Duplicate(DuplicateReason),
}

/// Result of a bulk import.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub accepted: usize,
    pub skipped: usize,
}

/// Free-form filter for [`Catalog::search`]. Unset fields do not constrain.
#[derive(Clone, Debug, Default)]
pub struct TaskFilter {
    pub grade: Option<i32>,
    pub subject: Option<String>,
    pub tier: Option<Tier>,
    pub category: Option<Category>,
    pub lesson_order: Option<i32>,
    pub semester: Option<i32>,
    pub task_order: Option<i32>,
    pub variant: Option<i32>,
}

impl TaskFilter {
    pub fn scope(scope: &FacetScope) -> Self {
        TaskFilter {
            grade: Some(scope.grade),
            subject: Some(scope.subject.clone()),
            tier: Some(scope.tier),
            category: Some(scope.category),
            ..Default::default()
        }
    }

    /// Set lesson or semester depending on the category.
    pub fn at_position(mut self, position: i32) -> Self {
        match self.category.map(Category::position_kind) {
            Some(PositionKind::Semester) => self.semester = Some(position),
            _ => self.lesson_order = Some(position),
        }
        self
    }
}

/// Incrementally built `WHERE` clause with positional parameters.
#[derive(Default)]
struct Where {
    clauses: Vec<String>,
    values: Vec<Value>,
}

impl Where {
    fn moderated() -> Self {
        let mut w = Where::default();
        w.clauses.push("is_moderated = 1".into());
        w
    }

    fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.clauses.push(format!("{column} = ?"));
        self.values.push(value.into());
        self
    }

    /// `IS` so that an absent value matches NULL.
    fn is(mut self, column: &str, value: Option<i32>) -> Self {
        self.clauses.push(format!("{column} IS ?"));
        self.values.push(value.into());
        self
    }

    fn maybe(self, column: &str, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(v) => self.eq(column, v),
            None => self,
        }
    }

    fn not_null(mut self, column: &str) -> Self {
        self.clauses.push(format!("{column} IS NOT NULL"));
        self
    }

    fn classification(self, grade: i32, subject: &str, tier: Tier, category: Category) -> Self {
        self.eq("grade", grade)
            .eq("subject", subject.to_string())
            .eq("tier", i64::from(tier.ordinal()))
            .eq("category", i64::from(category.ordinal()))
    }

    fn scope(self, scope: &FacetScope) -> Self {
        self.classification(scope.grade, &scope.subject, scope.effective_tier(), scope.category)
    }

    fn sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

fn position_column(category: Category) -> &'static str {
    match category.position_kind() {
        PositionKind::Lesson => "lesson_order",
        PositionKind::Semester => "semester",
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(id: i64, text: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt { id, reason: format!("timestamp {text:?}: {e}") })
}

/// Columns exactly as stored, decoded into domain types afterwards.
struct RawTask {
    id: i64,
    lesson_number: String,
    task_number: String,
    grade: i32,
    subject: String,
    tier: i64,
    category: i64,
    lesson_order: Option<i32>,
    task_order: Option<i32>,
    variant: Option<i32>,
    semester: Option<i32>,
    media: String,
    created_at: String,
    is_moderated: bool,
    submitted_by: i64,
}

impl RawTask {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(RawTask {
            id: row.get(0)?,
            lesson_number: row.get(1)?,
            task_number: row.get(2)?,
            grade: row.get(3)?,
            subject: row.get(4)?,
            tier: row.get(5)?,
            category: row.get(6)?,
            lesson_order: row.get(7)?,
            task_order: row.get(8)?,
            variant: row.get(9)?,
            semester: row.get(10)?,
            media: row.get(11)?,
            created_at: row.get(12)?,
            is_moderated: row.get(13)?,
            submitted_by: row.get(14)?,
        })
    }

    fn into_task(self) -> StoreResult<Task> {
        let id = self.id;
        let tier = u8::try_from(self.tier)
            .ok()
            .and_then(Tier::from_ordinal)
            .ok_or_else(|| StoreError::Corrupt { id, reason: format!("tier {}", self.tier) })?;
        let category = u8::try_from(self.category)
            .ok()
            .and_then(Category::from_ordinal)
            .ok_or_else(|| StoreError::Corrupt { id, reason: format!("category {}", self.category) })?;
        Ok(Task {
            id,
            link: TaskLink { lesson_number: self.lesson_number, task_number: self.task_number },
            grade: self.grade,
            subject: self.subject,
            tier,
            category,
            lesson_order: self.lesson_order,
            task_order: self.task_order,
            variant: self.variant,
            semester: self.semester,
            media: unpack_media(&self.media)
                .map_err(|e| StoreError::Corrupt { id, reason: format!("media {e}") })?,
            created_at: parse_timestamp(id, &self.created_at)?,
            is_moderated: self.is_moderated,
            submitted_by: self.submitted_by,
        })
    }
}

impl CatalogLookup for Connection {
    fn link_exists(&self, link: &TaskLink) -> StoreResult<bool> {
        let found = self.query_row(
            "SELECT EXISTS(SELECT 1 FROM tasks WHERE lesson_number = ?1 AND task_number = ?2)",
            params![link.lesson_number, link.task_number],
            |r| r.get::<_, bool>(0),
        )?;
        Ok(found)
    }

    fn slot_taken(&self, task: &NewTask, key: SlotKey) -> StoreResult<bool> {
        let pos = position_column(task.category);
        let mut w = Where::default().classification(task.grade, &task.subject, task.tier, task.category);
        w = match key {
            SlotKey::SemesterAndTask => w.is("semester", task.semester()).is("task_order", task.task_order),
            SlotKey::LessonAndTask => w.is("lesson_order", task.lesson_order()).is("task_order", task.task_order),
            SlotKey::LessonOnly => w.is(pos, task.position),
        };
        let sql = format!("SELECT EXISTS(SELECT 1 FROM tasks{})", w.sql());
        Ok(self.query_row(&sql, params_from_iter(w.values.iter()), |r| r.get::<_, bool>(0))?)
    }

    fn max_variant(&self, task: &NewTask) -> StoreResult<Option<i32>> {
        let w = Where::default()
            .classification(task.grade, &task.subject, task.tier, task.category)
            .is(position_column(task.category), task.position)
            .is("task_order", task.task_order);
        let sql = format!("SELECT MAX(variant) FROM tasks{}", w.sql());
        Ok(self.query_row(&sql, params_from_iter(w.values.iter()), |r| r.get::<_, Option<i32>>(0))?)
    }

    fn variant_taken(&self, task: &NewTask, variant: i32) -> StoreResult<bool> {
        let w = Where::default()
            .classification(task.grade, &task.subject, task.tier, task.category)
            .is(position_column(task.category), task.position)
            .is("task_order", task.task_order)
            .eq("variant", variant);
        let sql = format!("SELECT EXISTS(SELECT 1 FROM tasks{})", w.sql());
        Ok(self.query_row(&sql, params_from_iter(w.values.iter()), |r| r.get::<_, bool>(0))?)
    }
}

#[derive(Debug)]
pub struct Catalog {
    conn: Mutex<Connection>,
}

impl Catalog {
    /// Open (or create) the database file and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(target: "catalog", path = %parent.display(), error = %e, "Could not create database directory");
            }
        }
        let catalog = Self { conn: Mutex::new(Connection::open(path)?) };
        catalog.migrate(true)?;
        info!(target: "catalog", path = %path.display(), "Catalog opened");
        Ok(catalog)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> StoreResult<Self> {
        let catalog = Self { conn: Mutex::new(Connection::open_in_memory()?) };
        catalog.migrate(false)?;
        Ok(catalog)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn migrate(&self, wal: bool) -> StoreResult<()> {
        let conn = self.lock()?;
        if wal {
            conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        }
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              lesson_number TEXT NOT NULL,
              task_number TEXT NOT NULL,
              grade INTEGER NOT NULL,
              subject TEXT NOT NULL,
              tier INTEGER NOT NULL,
              category INTEGER NOT NULL,
              lesson_order INTEGER,
              task_order INTEGER,
              variant INTEGER,
              semester INTEGER,
              media TEXT NOT NULL DEFAULT '',
              created_at TEXT NOT NULL,
              is_moderated INTEGER NOT NULL DEFAULT 0,
              submitted_by INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS users (
              user_id INTEGER PRIMARY KEY,
              first_name TEXT,
              username TEXT,
              first_seen_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS statistics (
              id INTEGER PRIMARY KEY CHECK (id = 1),
              last_task_requested_at TEXT
            );
            INSERT OR IGNORE INTO statistics(id) VALUES (1);

            CREATE INDEX IF NOT EXISTS idx_tasks_lesson
              ON tasks(grade, subject, tier, category, lesson_order, is_moderated);
            CREATE INDEX IF NOT EXISTS idx_tasks_semester
              ON tasks(grade, subject, tier, category, semester, is_moderated);
            CREATE INDEX IF NOT EXISTS idx_tasks_link
              ON tasks(lesson_number, task_number, is_moderated);
            CREATE UNIQUE INDEX IF NOT EXISTS uq_tasks_link
              ON tasks(lesson_number, task_number);
            "#,
        )?;
        Ok(())
    }

    fn query_tasks(conn: &Connection, sql: &str, values: &[Value]) -> StoreResult<Vec<Task>> {
        let mut stmt = conn.prepare(sql)?;
        let raws = stmt
            .query_map(params_from_iter(values.iter()), RawTask::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawTask::into_task).collect()
    }

    fn query_ints(conn: &Connection, sql: &str, values: &[Value]) -> StoreResult<Vec<i64>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), |r| r.get::<_, i64>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn get_locked(conn: &Connection, id: i64) -> StoreResult<Option<Task>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1");
        let raw = conn.query_row(&sql, params![id], RawTask::from_row).optional()?;
        raw.map(RawTask::into_task).transpose()
    }

    // ---- point lookups ----

    /// Any task by id, moderated or not.
    pub fn get(&self, id: i64) -> StoreResult<Option<Task>> {
        let conn = self.lock()?;
        Self::get_locked(&conn, id)
    }

    /// Moderated task for a source link.
    #[instrument(level = "debug", skip(self), fields(lesson = %link.lesson_number, task = %link.task_number))]
    pub fn find_by_link(&self, link: &TaskLink) -> StoreResult<Option<Task>> {
        let conn = self.lock()?;
        let w = Where::moderated()
            .eq("lesson_number", link.lesson_number.clone())
            .eq("task_number", link.task_number.clone());
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks{} LIMIT 1", w.sql());
        Ok(Self::query_tasks(&conn, &sql, &w.values)?.into_iter().next())
    }

    // ---- writes ----

    /// Duplicate preview without inserting.
    pub fn check_duplicate(&self, task: &NewTask) -> StoreResult<Option<DuplicateReason>> {
        let candidate = task.clone().canonical();
        let conn = self.lock()?;
        resolver::is_duplicate(&candidate, &*conn)
    }

    /// Resolve and insert in one transaction.
    #[instrument(level = "info", skip(self, task), fields(category = ?task.category, moderated = task.is_moderated))]
    pub fn insert(&self, task: NewTask) -> StoreResult<InsertOutcome> {
        let task = task.canonical();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let variant = match resolver::resolve(&task, &*tx)? {
            Resolution::Reject(reason) => {
                debug!(target: "catalog", ?reason, lesson = %task.link.lesson_number, task = %task.link.task_number, "Insert rejected as duplicate");
                return Ok(InsertOutcome::Duplicate(reason));
            }
            Resolution::Accept { variant } => variant,
        };

        let created_at = task.created_at.unwrap_or_else(Utc::now);
        let media = pack_media(&task.media)?;
        let inserted = tx.execute(
            "INSERT INTO tasks (lesson_number, task_number, grade, subject, tier, category, lesson_order, \
             task_order, variant, semester, media, created_at, is_moderated, submitted_by) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                task.link.lesson_number,
                task.link.task_number,
                task.grade,
                task.subject,
                task.tier.ordinal(),
                task.category.ordinal(),
                task.lesson_order(),
                task.task_order,
                variant,
                task.semester(),
                media,
                timestamp(created_at),
                task.is_moderated,
                task.submitted_by,
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                warn!(target: "catalog", lesson = %task.link.lesson_number, task = %task.link.task_number, "Unique link index rejected insert");
                return Ok(InsertOutcome::Duplicate(DuplicateReason::Link));
            }
            Err(e) => return Err(e.into()),
        }
        let id = tx.last_insert_rowid();
        tx.commit()?;

        let stored = Self::get_locked(&conn, id)?.ok_or(StoreError::Corrupt {
            id,
            reason: "missing right after insert".into(),
        })?;
        info!(target: "catalog", id, variant = ?stored.variant, moderated = stored.is_moderated, "Task inserted");
        Ok(InsertOutcome::Inserted(stored))
    }

    /// Mark a pending task moderated. `None` if it is gone or already moderated.
    #[instrument(level = "info", skip(self))]
    pub fn approve(&self, id: i64) -> StoreResult<Option<Task>> {
        let conn = self.lock()?;
        let changed = conn.execute("UPDATE tasks SET is_moderated = 1 WHERE id = ?1 AND is_moderated = 0", params![id])?;
        if changed == 0 {
            return Ok(None);
        }
        Self::get_locked(&conn, id)
    }

    /// Delete a pending task, returning it so its media can be removed.
    pub fn delete_pending(&self, id: i64) -> StoreResult<Option<Task>> {
        self.delete_where(id, true)
    }

    /// Delete any task by id.
    pub fn delete(&self, id: i64) -> StoreResult<Option<Task>> {
        self.delete_where(id, false)
    }

    #[instrument(level = "info", skip(self))]
    fn delete_where(&self, id: i64, pending_only: bool) -> StoreResult<Option<Task>> {
        let conn = self.lock()?;
        let Some(task) = Self::get_locked(&conn, id)? else {
            return Ok(None);
        };
        if pending_only && task.is_moderated {
            return Ok(None);
        }
        conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        info!(target: "catalog", id, "Task deleted");
        Ok(Some(task))
    }

    // ---- facet enumeration (moderated only) ----

    pub fn grades(&self) -> StoreResult<Vec<i32>> {
        let conn = self.lock()?;
        let w = Where::moderated();
        let sql = format!("SELECT DISTINCT grade FROM tasks{} ORDER BY grade", w.sql());
        Ok(Self::query_ints(&conn, &sql, &w.values)?.into_iter().map(|g| g as i32).collect())
    }

    pub fn subjects(&self, grade: i32) -> StoreResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT subject FROM tasks WHERE is_moderated = 1 AND grade = ?1 ORDER BY subject",
        )?;
        let rows = stmt
            .query_map(params![grade], |r| r.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Stored (tier, category) pairs with moderated content for a grade and subject.
    pub fn classes(&self, grade: i32, subject: &str) -> StoreResult<BTreeSet<(Tier, Category)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT tier, category FROM tasks WHERE is_moderated = 1 AND grade = ?1 AND subject = ?2",
        )?;
        let pairs = stmt
            .query_map(params![grade, subject], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(pairs
            .into_iter()
            .filter_map(|(t, c)| {
                let tier = u8::try_from(t).ok().and_then(Tier::from_ordinal)?;
                let category = u8::try_from(c).ok().and_then(Category::from_ordinal)?;
                Some((tier, category))
            })
            .collect())
    }

    /// Lessons or semesters available in a scope.
    pub fn positions(&self, scope: &FacetScope) -> StoreResult<Vec<i32>> {
        let col = position_column(scope.category);
        let conn = self.lock()?;
        let w = Where::moderated().scope(scope).not_null(col);
        let sql = format!("SELECT DISTINCT {col} FROM tasks{} ORDER BY {col}", w.sql());
        Ok(Self::query_ints(&conn, &sql, &w.values)?.into_iter().map(|n| n as i32).collect())
    }

    pub fn task_orders(&self, scope: &FacetScope, position: i32) -> StoreResult<Vec<i32>> {
        let conn = self.lock()?;
        let w = Where::moderated()
            .scope(scope)
            .eq(position_column(scope.category), position)
            .not_null("task_order");
        let sql = format!("SELECT DISTINCT task_order FROM tasks{} ORDER BY task_order", w.sql());
        Ok(Self::query_ints(&conn, &sql, &w.values)?.into_iter().map(|n| n as i32).collect())
    }

    pub fn variants(&self, scope: &FacetScope, position: i32, task_order: i32) -> StoreResult<Vec<i32>> {
        let conn = self.lock()?;
        let w = Where::moderated()
            .scope(scope)
            .eq(position_column(scope.category), position)
            .eq("task_order", task_order)
            .not_null("variant");
        let sql = format!("SELECT DISTINCT variant FROM tasks{} ORDER BY variant", w.sql());
        Ok(Self::query_ints(&conn, &sql, &w.values)?.into_iter().map(|n| n as i32).collect())
    }

    /// Moderated tasks matching `filter`, ordered by (task index, variant, id).
    #[instrument(level = "debug", skip(self))]
    pub fn search(&self, filter: &TaskFilter) -> StoreResult<Vec<Task>> {
        let tier = match (filter.tier, filter.category) {
            (Some(t), Some(c)) => Some(t.effective_for(c)),
            (t, _) => t,
        };
        let w = Where::moderated()
            .maybe("grade", filter.grade)
            .maybe("subject", filter.subject.clone())
            .maybe("tier", tier.map(|t| i64::from(t.ordinal())))
            .maybe("category", filter.category.map(|c| i64::from(c.ordinal())))
            .maybe("lesson_order", filter.lesson_order)
            .maybe("semester", filter.semester)
            .maybe("task_order", filter.task_order)
            .maybe("variant", filter.variant);
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks{} ORDER BY task_order, variant, id", w.sql());
        let conn = self.lock()?;
        Self::query_tasks(&conn, &sql, &w.values)
    }

    // ---- moderation ----

    /// Oldest pending tasks first.
    pub fn moderation_queue(&self, limit: usize) -> StoreResult<Vec<Task>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE is_moderated = 0 ORDER BY created_at, id LIMIT ?");
        Self::query_tasks(&conn, &sql, &[Value::Integer(limit as i64)])
    }

    // ---- bulk export / import ----

    pub fn export_moderated(&self) -> StoreResult<Vec<Task>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE is_moderated = 1 ORDER BY id");
        Self::query_tasks(&conn, &sql, &[])
    }

    pub fn export_json(&self) -> StoreResult<String> {
        Ok(serde_json::to_string_pretty(&self.export_moderated()?)?)
    }

    /// Re-validate every record through the resolver. Imported tasks are moderated.
    #[instrument(level = "info", skip(self, json), fields(bytes = json.len()))]
    pub fn import_json(&self, json: &str) -> StoreResult<ImportReport> {
        let records: Vec<Task> = serde_json::from_str(json)?;
        let mut report = ImportReport::default();
        for record in records {
            let mut candidate = NewTask::from_record(record);
            candidate.is_moderated = true;
            match self.insert(candidate)? {
                InsertOutcome::Inserted(_) => report.accepted += 1,
                InsertOutcome::Duplicate(_) => report.skipped += 1,
            }
        }
        info!(target: "catalog", accepted = report.accepted, skipped = report.skipped, "Import finished");
        Ok(report)
    }

    // ---- users and statistics ----

    pub fn record_user(&self, id: ConversationId, sender: &SenderInfo) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO users (user_id, first_name, username, first_seen_at) VALUES (?1, ?2, ?3, ?4)",
            params![id, sender.first_name, sender.username, timestamp(Utc::now())],
        )?;
        Ok(())
    }

    pub fn touch_last_request(&self) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE statistics SET last_task_requested_at = ?1 WHERE id = 1",
            params![timestamp(Utc::now())],
        )?;
        Ok(())
    }

    pub fn statistics(&self) -> StoreResult<Statistics> {
        let conn = self.lock()?;
        let total_users: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
        let (total_tasks, pending_tasks, last_added): (i64, i64, Option<String>) = conn.query_row(
            "SELECT COALESCE(SUM(is_moderated = 1), 0), COALESCE(SUM(is_moderated = 0), 0), MAX(created_at) FROM tasks",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )?;
        let last_requested: Option<String> = conn
            .query_row("SELECT last_task_requested_at FROM statistics WHERE id = 1", [], |r| r.get(0))
            .optional()?
            .flatten();
        Ok(Statistics {
            total_users,
            total_tasks,
            pending_tasks,
            last_task_added: last_added.map(|s| parse_timestamp(0, &s)).transpose()?,
            last_task_requested: last_requested.map(|s| parse_timestamp(0, &s)).transpose()?,
        })
    }
}
