//! Loading service configuration from TOML plus environment overrides.
//!
//! See `AppConfig` for the expected schema. Every key is optional; a missing or
//! broken file falls back to the defaults.

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::domain::ConversationId;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  /// The single conversation allowed to curate.
  pub curator_id: Option<ConversationId>,
  pub database_path: String,
  pub media_dir: String,
  /// Subjects offered during submission.
  pub subjects: Vec<String>,
  /// How many pending tasks one moderation pass looks at.
  pub moderation_batch: usize,
  pub notify: NotifyConfig,
}

#[derive(Clone, Debug, Deserialize, Default)]
#[serde(default)]
pub struct NotifyConfig {
  pub webhook_url: Option<String>,
  pub disabled: bool,
}

pub fn default_subjects() -> Vec<String> {
  [
    "Алгебра", "Геометрия", "Информатика", "Физика", "Химия", "Биология", "Русский язык", "Литература",
    "История", "Обществознание", "География", "Английский язык", "Вероятность и статистика", "ОБЗР",
    "Физкультура",
  ]
  .into_iter()
  .map(String::from)
  .collect()
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      curator_id: None,
      database_path: "gdz_catalog.db".into(),
      media_dir: "task_media".into(),
      subjects: default_subjects(),
      moderation_batch: 10,
      notify: NotifyConfig::default(),
    }
  }
}

impl AppConfig {
  pub fn is_curator(&self, id: ConversationId) -> bool {
    self.curator_id == Some(id)
  }

  /// Environment wins over the file. `lookup` is `std::env::var` outside tests.
  pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("CURATOR_ID") {
      match v.trim().parse::<ConversationId>() {
        Ok(id) => self.curator_id = Some(id),
        Err(e) => warn!(target: "gdz_catalog", value = %v, error = %e, "Ignoring malformed CURATOR_ID"),
      }
    }
    if let Some(v) = lookup("DATABASE_PATH") {
      self.database_path = v;
    }
    if let Some(v) = lookup("MEDIA_DIR") {
      self.media_dir = v;
    }
    if let Some(v) = lookup("NOTIFY_WEBHOOK_URL") {
      self.notify.webhook_url = Some(v).filter(|s| !s.is_empty());
    }
    if let Some(v) = lookup("NOTIFY_DISABLED") {
      self.notify.disabled = v.eq_ignore_ascii_case("true") || v == "1";
    }
    if self.subjects.is_empty() {
      warn!(target: "gdz_catalog", "Empty subject list in config; using defaults");
      self.subjects = default_subjects();
    }
    self.moderation_batch = self.moderation_batch.max(1);
  }
}

/// Attempt to load `AppConfig` from GDZ_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_config_file_from_env() -> Option<AppConfig> {
  let path = std::env::var("GDZ_CONFIG_PATH").ok()?;
  load_config_file(&path)
}

fn load_config_file(path: &str) -> Option<AppConfig> {
  match std::fs::read_to_string(path) {
    Ok(s) => match toml::from_str::<AppConfig>(&s) {
      Ok(cfg) => {
        info!(target: "gdz_catalog", %path, "Loaded config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "gdz_catalog", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "gdz_catalog", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

/// File (if any) + environment overrides.
pub fn load_config() -> AppConfig {
  let mut cfg = load_config_file_from_env().unwrap_or_default();
  cfg.apply_overrides(|k| std::env::var(k).ok());
  cfg
}
