//! Small utility helpers used across modules.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::TaskLink;

fn training_re() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"trainings/(\d+)/tasks/(\d+)").expect("static regex"))
}

fn lesson_task_re() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"lessons/(\d+)/tasks/(\d+)").expect("static regex"))
}

fn lesson_re() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"lessons/(\d+)").expect("static regex"))
}

fn task_re() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"tasks/(\d+)").expect("static regex"))
}

/// Extract `(lessonNumber, taskNumber)` from a course link.
///
/// Accepted shapes, first match wins:
///   `.../trainings/<a>/tasks/<b>`
///   `.../lessons/<a>/tasks/<b>`
///   any text containing both `lessons/<a>` and `tasks/<b>`
pub fn parse_task_link(text: &str) -> Option<TaskLink> {
  let pair = |a: &str, b: &str| TaskLink { lesson_number: a.to_string(), task_number: b.to_string() };

  if let Some(c) = training_re().captures(text) {
    return Some(pair(&c[1], &c[2]));
  }
  if let Some(c) = lesson_task_re().captures(text) {
    return Some(pair(&c[1], &c[2]));
  }
  match (lesson_re().captures(text), task_re().captures(text)) {
    (Some(l), Some(t)) => Some(pair(&l[1], &t[1])),
    _ => None,
  }
}

/// Strictly positive integer typed by a user (lesson, semester, task index, id).
pub fn parse_positive(text: &str) -> Option<i32> {
  text.trim().parse::<i32>().ok().filter(|n| *n > 0)
}

/// Media references are persisted as a JSON array in one column.
pub fn pack_media(refs: &[String]) -> Result<String, serde_json::Error> {
  serde_json::to_string(refs)
}

pub fn unpack_media(packed: &str) -> Result<Vec<String>, serde_json::Error> {
  if packed.trim().is_empty() {
    return Ok(vec![]);
  }
  serde_json::from_str(packed)
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge inbound payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut cut = max;
  while !s.is_char_boundary(cut) {
    cut -= 1;
  }
  format!("{}… ({} bytes total)", &s[..cut], s.len())
}
