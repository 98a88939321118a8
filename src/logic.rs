//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! One inbound turn is routed, in this order, to:
//!   - commands (`/start`, `/cancel`, `/admin`, `/exit_batch`, `/done`, `/remove`)
//!   - a pending curator action (delete by id)
//!   - the submission draft, when one is in progress
//!   - navigation, for selection tokens and pasted links
//!
//! Catalog work runs through `AppState::blocking`. Failures never end the
//! conversation: the cause is reported and the user lands on the main menu
//! (or the curator panel).

use tracing::{debug, error, info, instrument, warn};

use crate::domain::{ConversationId, PositionKind, Statistics};
use crate::error::{AppError, MediaError};
use crate::moderation::{self, Verdict};
use crate::navigation::{self, Facet, FacetStep, LessonError, LinkLookup, SearchSelection};
use crate::protocol::{InboundTurn, Reply, TurnEvent};
use crate::render;
use crate::session::{PendingAction, Session};
use crate::state::AppState;
use crate::store::Catalog;
use crate::submission::{self, DraftInput, SubmissionDraft};
use crate::token::Token;
use crate::util::{parse_positive, trunc_for_log};

/// Process one turn for one conversation and produce its replies.
#[instrument(level = "info", skip(state, turn), fields(conversation = turn.conversation))]
pub async fn handle_turn(state: &AppState, turn: InboundTurn) -> Vec<Reply> {
  let id = turn.conversation;
  let sender = turn.sender.unwrap_or_default();
  if let Err(e) = state.blocking(move |st| Ok(st.catalog.record_user(id, &sender)?)).await {
    warn!(target: "gdz_catalog", conversation = id, error = %e, "Could not record user");
  }

  let handle = state.sessions.acquire(id).await;
  let replies = {
    let mut session = handle.lock().await;
    match dispatch(state, id, &mut session, turn.event).await {
      Ok(replies) => replies,
      Err(e) => {
        error!(target: "gdz_catalog", conversation = id, error = %e, "Turn failed");
        discard_draft(state, &mut session).await;
        session.reset();
        vec![render::failure(&e.to_string()), home(state, id).await]
      }
    }
  };
  state.sessions.release(id, handle).await;
  replies
}

async fn statistics(state: &AppState) -> Result<Statistics, AppError> {
  state.blocking(|st| Ok(st.catalog.statistics()?)).await
}

async fn admin_panel(state: &AppState) -> Result<Reply, AppError> {
  Ok(render::admin_panel(&statistics(state).await?))
}

async fn home(state: &AppState, id: ConversationId) -> Reply {
  if state.is_curator(id) {
    if let Ok(panel) = admin_panel(state).await {
      return panel;
    }
  }
  render::main_menu(state.is_curator(id))
}

/// Run a navigation call against the session's selection off the runtime.
async fn with_selection<T, F>(state: &AppState, session: &mut Session, work: F) -> Result<T, AppError>
where
  T: Send + 'static,
  F: FnOnce(&Catalog, &mut SearchSelection) -> T + Send + 'static,
{
  let mut sel = std::mem::take(&mut session.selection);
  let (sel, out) = state
    .blocking(move |st| {
      let out = work(&st.catalog, &mut sel);
      Ok((sel, out))
    })
    .await?;
  session.selection = sel;
  Ok(out)
}

async fn dispatch(state: &AppState, id: ConversationId, session: &mut Session, event: TurnEvent) -> Result<Vec<Reply>, AppError> {
  match event {
    TurnEvent::Text { text } => on_text(state, id, session, text).await,
    TurnEvent::Select { token } => match token.parse::<Token>() {
      Ok(token) => on_token(state, id, session, token).await,
      Err(e) => {
        debug!(target: "gdz_catalog", conversation = id, error = %e, "Malformed token");
        redisplay(state, id, session).await
      }
    },
    TurnEvent::Media { data_base64, mime } => on_media(state, id, session, &data_base64, &mime).await,
    TurnEvent::Document { file_name, data_base64 } => on_document(state, id, &file_name, &data_base64).await,
  }
}

/// Show the current step again, whatever it is.
async fn redisplay(state: &AppState, id: ConversationId, session: &mut Session) -> Result<Vec<Reply>, AppError> {
  if let Some(draft) = &session.draft {
    return Ok(vec![render::draft_prompt(draft, &state.config.subjects)]);
  }
  if !session.selection.is_empty() {
    let step = with_selection(state, session, |catalog, sel| navigation::next_step(catalog, sel)).await??;
    return Ok(vec![render::facet_step(&step)]);
  }
  Ok(vec![render::main_menu(state.is_curator(id))])
}

async fn discard_draft(state: &AppState, session: &mut Session) {
  if let Some(draft) = session.draft.take() {
    state.media.remove_all(&draft.media).await;
  }
}

async fn drive_draft(state: &AppState, id: ConversationId, session: &mut Session, input: DraftInput) -> Result<Vec<Reply>, AppError> {
  let draft = session.draft.take();
  let (draft, outcome) = state
    .blocking(move |st| {
      let mut draft = draft;
      let outcome = submission::advance(&mut draft, input, &st.submit_context(id));
      Ok((draft, outcome))
    })
    .await?;
  session.draft = draft;
  let outcome = outcome?;

  match &outcome {
    submission::DraftOutcome::Duplicate { discarded, .. }
    | submission::DraftOutcome::Cancelled { discarded }
    | submission::DraftOutcome::Expired { discarded } => state.media.remove_all(discarded).await,
    submission::DraftOutcome::MediaRemoved { removed, .. } => state.media.remove_all(std::slice::from_ref(removed)).await,
    _ => {}
  }
  Ok(render::draft_outcome(&outcome, session.draft.as_ref(), &state.config.subjects, state.is_curator(id)))
}

async fn start_draft(state: &AppState, session: &mut Session, draft: SubmissionDraft) -> Vec<Reply> {
  discard_draft(state, session).await;
  session.pending = None;
  let reply = render::draft_prompt(&draft, &state.config.subjects);
  session.draft = Some(draft);
  vec![reply]
}

async fn on_text(state: &AppState, id: ConversationId, session: &mut Session, text: String) -> Result<Vec<Reply>, AppError> {
  let trimmed = text.trim();
  debug!(target: "gdz_catalog", conversation = id, text = %trunc_for_log(trimmed, 120), "Text turn");

  if trimmed.starts_with('/') {
    let command = trimmed.split_whitespace().next().unwrap_or_default();
    return match command {
      "/start" => {
        discard_draft(state, session).await;
        session.reset();
        Ok(vec![render::main_menu(state.is_curator(id))])
      }
      "/cancel" if session.draft.is_some() => drive_draft(state, id, session, DraftInput::Cancel).await,
      "/cancel" => {
        session.pending = None;
        Ok(vec![Reply::text("🚫 Действие отменено."), home(state, id).await])
      }
      "/admin" if state.is_curator(id) => Ok(vec![admin_panel(state).await?]),
      "/exit_batch" if session.draft.is_some() => drive_draft(state, id, session, DraftInput::ExitBatch).await,
      "/done" if session.draft.is_some() => drive_draft(state, id, session, DraftInput::Finish).await,
      "/remove" if session.draft.is_some() => drive_draft(state, id, session, DraftInput::RemoveLast).await,
      _ => redisplay(state, id, session).await,
    };
  }

  if session.pending == Some(PendingAction::DeleteTask) && state.is_curator(id) {
    let Some(task_id) = parse_positive(trimmed) else {
      return Ok(vec![Reply::text("❌ Введи число. Попробуй снова:")]);
    };
    session.pending = None;
    let deleted = state.blocking(move |st| Ok(st.catalog.delete(i64::from(task_id))?)).await?;
    if let Some(task) = &deleted {
      state.media.remove_all(&task.media).await;
      info!(target: "gdz_catalog", task_id = task.id, "Task deleted by curator");
    }
    return Ok(vec![render::deleted(deleted.as_ref()), admin_panel(state).await?]);
  }

  if session.draft.is_some() {
    return drive_draft(state, id, session, DraftInput::Text(trimmed.to_string())).await;
  }

  let text = trimmed.to_string();
  match with_selection(state, session, move |catalog, sel| navigation::lookup_link(catalog, sel, &text)).await?? {
    LinkLookup::Found(view) => {
      state.touch_last_request();
      Ok(vec![render::task_card(&view)])
    }
    LinkLookup::Missing(link) => {
      info!(target: "navigation", lesson = %link.lesson_number, task = %link.task_number, "Link not in catalog");
      Ok(vec![render::link_missing()])
    }
    LinkLookup::NoLink => Ok(vec![render::main_menu(state.is_curator(id))]),
  }
}

fn facet_of(token: &Token) -> Option<Facet> {
  Some(match token {
    Token::SearchGrade(g) => Facet::Grade(*g),
    Token::SearchSubject(s) => Facet::Subject(s.clone()),
    Token::SearchTier(t) => Facet::Tier(*t),
    Token::SearchCategory(c) => Facet::Category(*c),
    Token::SearchSemester(n) => Facet::Position(PositionKind::Semester, *n),
    Token::SearchLesson(n) => Facet::Position(PositionKind::Lesson, *n),
    Token::SearchTaskOrder(n) => Facet::TaskOrder(*n),
    Token::SearchVariant(v) => Facet::Variant(*v),
    _ => return None,
  })
}

async fn show_step(state: &AppState, session: &mut Session) -> Result<Vec<Reply>, AppError> {
  let step = with_selection(state, session, |catalog, sel| navigation::next_step(catalog, sel)).await??;
  if matches!(step, FacetStep::Resolved(_)) {
    state.touch_last_request();
  }
  Ok(vec![render::facet_step(&step)])
}

async fn on_token(state: &AppState, id: ConversationId, session: &mut Session, token: Token) -> Result<Vec<Reply>, AppError> {
  if let Some(facet) = facet_of(&token) {
    if let Err(e) = session.selection.choose(facet) {
      return Ok(vec![render::nav_error(e)]);
    }
    return show_step(state, session).await;
  }

  let curator = state.is_curator(id);
  match token {
    Token::MainMenu => {
      discard_draft(state, session).await;
      session.reset();
      Ok(vec![render::main_menu(curator)])
    }
    Token::SearchStart => {
      session.selection = Default::default();
      show_step(state, session).await
    }
    Token::ShowTask(task_id) => {
      match with_selection(state, session, move |catalog, sel| navigation::open_task(catalog, sel, task_id)).await?? {
        Some(view) => {
          state.touch_last_request();
          Ok(vec![render::task_card(&view)])
        }
        None => Ok(vec![render::facet_step(&FacetStep::NotFound)]),
      }
    }
    Token::ShowLesson(lesson) => {
      match with_selection(state, session, move |catalog, sel| navigation::lesson_listing(catalog, sel, lesson)).await? {
        Ok(tasks) => {
          state.touch_last_request();
          Ok(render::lesson_listing(lesson, &tasks))
        }
        Err(LessonError::Nav(e)) => Ok(vec![render::nav_error(e)]),
        Err(LessonError::Store(e)) => Err(e.into()),
      }
    }

    Token::SubmitStart => Ok(start_draft(state, session, SubmissionDraft::contributor()).await),
    Token::DraftGrade(g) => draft_token(state, id, session, DraftInput::Grade(g)).await,
    Token::DraftSubject(s) => draft_token(state, id, session, DraftInput::Subject(s)).await,
    Token::DraftTier(t) => draft_token(state, id, session, DraftInput::Tier(t)).await,
    Token::DraftCategory(c) => draft_token(state, id, session, DraftInput::Category(c)).await,
    Token::DraftSave => draft_token(state, id, session, DraftInput::Save).await,
    Token::DraftCancel => draft_token(state, id, session, DraftInput::Cancel).await,

    admin if !curator => {
      warn!(target: "gdz_catalog", conversation = id, token = %admin, "Curator action refused");
      Ok(vec![Reply::text("⛔ Нет доступа."), render::main_menu(false)])
    }
    Token::AdminPanel => {
      session.pending = None;
      Ok(vec![admin_panel(state).await?])
    }
    Token::AdminModerate => Ok(vec![render::moderation_card(&queue_head(state).await?)]),
    Token::AdminAddSingle => Ok(start_draft(state, session, SubmissionDraft::curator_single()).await),
    Token::AdminAddBatch => {
      let mut replies = vec![Reply::text("⚡️ Пакетное добавление\n\nСначала настроим параметры для всей сессии.")];
      replies.extend(start_draft(state, session, SubmissionDraft::curator_batch()).await);
      Ok(replies)
    }
    Token::AdminDelete => {
      session.pending = Some(PendingAction::DeleteTask);
      Ok(vec![render::delete_prompt()])
    }
    Token::AdminExport => {
      let json = state.blocking(|st| Ok(st.catalog.export_json()?)).await?;
      Ok(vec![render::export_document(json)])
    }
    Token::AdminImport => Ok(vec![render::import_prompt()]),
    Token::Approve(task_id) => {
      let verdict = state.blocking(move |st| moderation::approve(&st.catalog, &st.notifier, task_id)).await?;
      after_verdict(state, &verdict).await
    }
    Token::Decline(task_id) => {
      let verdict = moderation::decline(&state.catalog, &state.media, &state.notifier, task_id).await?;
      after_verdict(state, &verdict).await
    }

    // Facet tokens were handled above.
    Token::SearchGrade(_)
    | Token::SearchSubject(_)
    | Token::SearchTier(_)
    | Token::SearchCategory(_)
    | Token::SearchSemester(_)
    | Token::SearchLesson(_)
    | Token::SearchTaskOrder(_)
    | Token::SearchVariant(_) => redisplay(state, id, session).await,
  }
}

async fn queue_head(state: &AppState) -> Result<moderation::QueueView, AppError> {
  state.blocking(|st| moderation::head(&st.catalog, st.config.moderation_batch)).await
}

async fn after_verdict(state: &AppState, verdict: &Verdict) -> Result<Vec<Reply>, AppError> {
  let next = queue_head(state).await?;
  Ok(vec![render::verdict(verdict), render::moderation_card(&next)])
}

async fn draft_token(state: &AppState, id: ConversationId, session: &mut Session, input: DraftInput) -> Result<Vec<Reply>, AppError> {
  if session.draft.is_none() {
    return Ok(vec![Reply::text("⌛ Сессия устарела, начни заново."), render::main_menu(state.is_curator(id))]);
  }
  drive_draft(state, id, session, input).await
}

async fn on_media(state: &AppState, id: ConversationId, session: &mut Session, data_base64: &str, mime: &str) -> Result<Vec<Reply>, AppError> {
  if !session.draft.as_ref().is_some_and(SubmissionDraft::accepts_media) {
    let mut replies = vec![Reply::text("🤔 Скриншоты принимаются только при добавлении задания.")];
    replies.extend(redisplay(state, id, session).await?);
    return Ok(replies);
  }
  let reference = match state.media.save(data_base64, mime).await {
    Ok(reference) => reference,
    // A bad payload is bad input: the draft and its collected media stay.
    Err(e @ (MediaError::Decode(_) | MediaError::Empty)) => {
      debug!(target: "media", conversation = id, error = %e, "Media payload rejected");
      let mut replies = vec![Reply::text("❌ Не удалось прочитать изображение. Отправь его ещё раз.")];
      replies.extend(redisplay(state, id, session).await?);
      return Ok(replies);
    }
    Err(e) => return Err(e.into()),
  };
  drive_draft(state, id, session, DraftInput::Media(reference)).await
}

async fn on_document(state: &AppState, id: ConversationId, file_name: &str, data_base64: &str) -> Result<Vec<Reply>, AppError> {
  use base64::{engine::general_purpose::STANDARD, Engine as _};

  if !state.is_curator(id) || !file_name.to_lowercase().ends_with(".json") {
    return Ok(vec![Reply::text("🤔 Этот файл здесь не нужен."), render::main_menu(state.is_curator(id))]);
  }
  let bytes = STANDARD.decode(data_base64.trim()).map_err(MediaError::from)?;
  let json = String::from_utf8_lossy(&bytes).into_owned();
  let report = state.blocking(move |st| Ok(st.catalog.import_json(&json)?)).await?;
  Ok(vec![render::import_report(&report), admin_panel(state).await?])
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::AppConfig;
  use crate::notify::{Notifier, NotifyEvent, NotifyQueue};
  use crate::store::Catalog;
  use base64::{engine::general_purpose::STANDARD, Engine as _};

  const CURATOR: ConversationId = 1;

  fn anonymous_turn(conversation: ConversationId, event: TurnEvent) -> InboundTurn {
    InboundTurn { conversation, sender: None, event }
  }

  fn setup() -> (AppState, NotifyQueue, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig {
      curator_id: Some(CURATOR),
      media_dir: dir.path().join("media").to_string_lossy().into_owned(),
      ..Default::default()
    };
    let (notifier, queue) = Notifier::channel();
    let state = AppState::new(config, Catalog::open_in_memory().unwrap(), notifier);
    (state, queue, dir)
  }

  async fn say(state: &AppState, id: ConversationId, text: &str) -> Vec<Reply> {
    handle_turn(state, anonymous_turn(id, TurnEvent::Text { text: text.into() })).await
  }

  async fn press(state: &AppState, id: ConversationId, token: Token) -> Vec<Reply> {
    handle_turn(state, anonymous_turn(id, TurnEvent::Select { token: token.to_string() })).await
  }

  async fn photo(state: &AppState, id: ConversationId) -> Vec<Reply> {
    let event = TurnEvent::Media { data_base64: STANDARD.encode(b"jpeg"), mime: "image/jpeg".into() };
    handle_turn(state, anonymous_turn(id, event)).await
  }

  async fn draft_media(state: &AppState, id: ConversationId) -> Vec<String> {
    let handle = state.sessions.acquire(id).await;
    let media = handle.lock().await.draft.as_ref().map(|d| d.media.clone()).unwrap_or_default();
    state.sessions.release(id, handle).await;
    media
  }

  async fn submit_homework(state: &AppState, id: ConversationId, link: &str) {
    say(state, id, link).await;
    press(state, id, Token::DraftGrade(9)).await;
    press(state, id, Token::DraftSubject("Алгебра".into())).await;
    press(state, id, Token::DraftTier(crate::domain::Tier::Regular)).await;
    press(state, id, Token::DraftCategory(crate::domain::Category::Homework)).await;
    say(state, id, "3").await;
    say(state, id, "2").await;
  }

  #[tokio::test]
  async fn contributor_submission_reaches_catalog_after_approval() {
    let (state, mut queue, _dir) = setup();
    let user = 500;

    press(&state, user, Token::SubmitStart).await;
    submit_homework(&state, user, "https://foxford.ru/lessons/475003/tasks/301386").await;
    photo(&state, user).await;
    let confirm = say(&state, user, "/done").await;
    assert_eq!(confirm[0].choices[0][0].token, "draft_save");
    let saved = press(&state, user, Token::DraftSave).await;
    assert!(saved[0].text.contains("модерацию"));

    let events = queue.drain();
    assert!(matches!(events.as_slice(), [NotifyEvent::SubmissionQueued { recipient: CURATOR, .. }]));
    assert!(state.catalog.grades().unwrap().is_empty());

    let card = press(&state, CURATOR, Token::AdminModerate).await;
    let approve = card[0].choices[0][0].token.clone();
    assert!(approve.starts_with("approve_"));
    let after = handle_turn(&state, anonymous_turn(CURATOR, TurnEvent::Select { token: approve })).await;
    assert!(after[1].text.contains("пуста"));

    let found = say(&state, 42, "https://foxford.ru/lessons/475003/tasks/301386").await;
    assert!(found[0].text.contains("Домашняя работа, урок 3, задание 2"));
    assert_eq!(found[0].media.len(), 1);
    assert!(matches!(queue.drain().as_slice(), [NotifyEvent::SubmissionAccepted { recipient: 500, .. }]));
  }

  #[tokio::test]
  async fn cancel_removes_only_own_media() {
    let (state, _queue, _dir) = setup();
    for (user, link) in [(10, "lessons/1/tasks/1"), (11, "lessons/2/tasks/2")] {
      press(&state, user, Token::SubmitStart).await;
      say(&state, user, link).await;
      press(&state, user, Token::DraftGrade(9)).await;
      press(&state, user, Token::DraftSubject("Алгебра".into())).await;
      press(&state, user, Token::DraftTier(crate::domain::Tier::Regular)).await;
      press(&state, user, Token::DraftCategory(crate::domain::Category::Homework)).await;
      say(&state, user, &user.to_string()).await;
      say(&state, user, "1").await;
      photo(&state, user).await;
    }
    let mine = draft_media(&state, 10).await;
    let theirs = draft_media(&state, 11).await;
    assert_eq!((mine.len(), theirs.len()), (1, 1));

    say(&state, 10, "/cancel").await;
    assert!(!std::path::Path::new(&mine[0]).exists());
    assert!(std::path::Path::new(&theirs[0]).exists());
    assert_eq!(draft_media(&state, 11).await, theirs);
    assert!(draft_media(&state, 10).await.is_empty());
  }

  #[tokio::test]
  async fn malformed_token_redisplays_current_step() {
    let (state, _queue, _dir) = setup();
    press(&state, 7, Token::SubmitStart).await;
    say(&state, 7, "lessons/1/tasks/1").await;
    let again = handle_turn(&state, anonymous_turn(7, TurnEvent::Select { token: "draft_grade_x".into() })).await;
    assert_eq!(again.len(), 1);
    assert!(again[0].text.contains("Выбери класс"));
  }

  #[tokio::test]
  async fn curator_actions_need_the_curator() {
    let (state, _queue, _dir) = setup();
    let refused = press(&state, 99, Token::AdminExport).await;
    assert!(refused[0].text.contains("Нет доступа"));
    assert!(refused[0].choices.is_empty());
  }

  #[tokio::test]
  async fn media_outside_a_draft_is_not_stored() {
    let (state, _queue, dir) = setup();
    let replies = photo(&state, 5).await;
    assert_eq!(replies.len(), 2);
    assert!(replies[0].text.contains("только при добавлении"));
    assert!(!dir.path().join("media").exists());
  }

  #[tokio::test]
  async fn export_then_import_through_documents() {
    let (state, _queue, _dir) = setup();
    press(&state, CURATOR, Token::AdminAddSingle).await;
    submit_homework(&state, CURATOR, "lessons/8/tasks/9").await;
    photo(&state, CURATOR).await;
    let saved = press(&state, CURATOR, Token::DraftSave).await;
    assert!(saved[0].text.contains("сохранено"));

    let export = press(&state, CURATOR, Token::AdminExport).await;
    let doc = export[0].document.clone().unwrap();
    assert!(doc.file_name.ends_with(".json"));

    let (other, _q, _d) = setup();
    let event = TurnEvent::Document { file_name: doc.file_name, data_base64: doc.data_base64 };
    let replies = handle_turn(&other, anonymous_turn(CURATOR, event)).await;
    assert!(replies[0].text.contains("Добавлено: 1"));
    assert_eq!(other.catalog.export_moderated().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn curator_deletes_by_id() {
    let (state, _queue, _dir) = setup();
    press(&state, CURATOR, Token::AdminAddSingle).await;
    submit_homework(&state, CURATOR, "lessons/8/tasks/9").await;
    photo(&state, CURATOR).await;
    press(&state, CURATOR, Token::DraftSave).await;
    let task = state.catalog.export_moderated().unwrap().remove(0);

    press(&state, CURATOR, Token::AdminDelete).await;
    assert!(say(&state, CURATOR, "abc").await[0].text.contains("Введи число"));
    let replies = say(&state, CURATOR, &task.id.to_string()).await;
    assert!(replies[0].text.contains("удалено"));
    assert!(!std::path::Path::new(&task.media[0]).exists());
    assert!(state.catalog.get(task.id).unwrap().is_none());
  }

  #[tokio::test]
  async fn search_tokens_walk_to_a_task() {
    let (state, _queue, _dir) = setup();
    press(&state, CURATOR, Token::AdminAddSingle).await;
    submit_homework(&state, CURATOR, "lessons/8/tasks/9").await;
    photo(&state, CURATOR).await;
    press(&state, CURATOR, Token::DraftSave).await;

    let user = 3;
    let grades = press(&state, user, Token::SearchStart).await;
    assert_eq!(grades[0].choices[0][0].token, "search_grade_9");
    press(&state, user, Token::SearchGrade(9)).await;
    press(&state, user, Token::SearchSubject("Алгебра".into())).await;
    press(&state, user, Token::SearchTier(crate::domain::Tier::Regular)).await;
    press(&state, user, Token::SearchCategory(crate::domain::Category::Homework)).await;
    press(&state, user, Token::SearchLesson(3)).await;
    let card = press(&state, user, Token::SearchTaskOrder(2)).await;
    assert!(card[0].text.contains("урок 3, задание 2"));

    // A stale button after returning to the menu reports expiry.
    press(&state, user, Token::MainMenu).await;
    let stale = press(&state, user, Token::SearchVariant(1)).await;
    assert!(stale[0].text.contains("устарел"));
  }

  #[tokio::test]
  async fn unreadable_media_keeps_the_draft() {
    let (state, _queue, _dir) = setup();
    let user = 30;
    press(&state, user, Token::SubmitStart).await;
    submit_homework(&state, user, "lessons/5/tasks/6").await;
    photo(&state, user).await;
    let before = draft_media(&state, user).await;
    assert_eq!(before.len(), 1);

    for payload in ["%%%not-b64", ""] {
      let event = TurnEvent::Media { data_base64: payload.into(), mime: "image/jpeg".into() };
      let replies = handle_turn(&state, anonymous_turn(user, event)).await;
      assert!(replies[0].text.contains("Не удалось прочитать"));
      assert!(replies[1].text.contains("Отправь скриншоты"));
    }
    assert_eq!(draft_media(&state, user).await, before);
    assert!(std::path::Path::new(&before[0]).exists());

    let saved = press(&state, user, Token::DraftSave).await;
    assert!(saved[0].text.contains("модерацию"));
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
  async fn concurrent_turns_of_one_conversation_run_one_at_a_time() {
    let (state, _queue, _dir) = setup();
    let state = std::sync::Arc::new(state);
    let user = 40;
    press(&state, user, Token::SubmitStart).await;
    submit_homework(&state, user, "lessons/6/tasks/7").await;

    let spawn_photo = |state: std::sync::Arc<AppState>| tokio::spawn(async move { photo(&state, user).await });
    let (a, b) = tokio::join!(spawn_photo(state.clone()), spawn_photo(state.clone()));
    let mut texts = vec![a.unwrap().remove(0).text, b.unwrap().remove(0).text];
    texts.sort();
    assert!(texts[0].contains("всего: 1)"), "{texts:?}");
    assert!(texts[1].contains("всего: 2)"), "{texts:?}");
    assert_eq!(draft_media(&state, user).await.len(), 2);
  }
}
