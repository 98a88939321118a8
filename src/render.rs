//! Presentation: engine results turned into chat replies.
//!
//! Nothing here reads state or decides anything. Each function takes an
//! engine result and lays it out as text, media and button rows.

use crate::domain::{
    category_label, tier_label, Category, PositionKind, Statistics, Task, Tier, MAX_GRADE, MIN_GRADE,
};
use crate::moderation::{QueueView, Verdict};
use crate::navigation::{FacetStep, Move, NavError, ResolvedTask};
use crate::protocol::{Choice, DocumentOut, Reply};
use crate::resolver::DuplicateReason;
use crate::store::ImportReport;
use crate::submission::{DraftOutcome, DraftStep, Invalid, SubmissionDraft};
use crate::token::Token;

const LINK_EXAMPLE: &str = "Пример:\nhttps://foxford.ru/lessons/475003/tasks/301386";

fn choice(label: impl Into<String>, token: Token) -> Choice {
    Choice { label: label.into(), token: token.to_string() }
}

fn menu_row() -> Vec<Choice> {
    vec![choice("🏠 В главное меню", Token::MainMenu)]
}

/// Lay buttons out `per_row` to a row.
fn grid(items: Vec<Choice>, per_row: usize) -> Vec<Vec<Choice>> {
    items.chunks(per_row.max(1)).map(|c| c.to_vec()).collect()
}

fn format_time(at: Option<chrono::DateTime<chrono::Utc>>) -> String {
    at.map(|t| t.format("%d.%m.%Y %H:%M").to_string()).unwrap_or_else(|| "Нет данных".into())
}

pub fn main_menu(is_curator: bool) -> Reply {
    let mut choices = vec![
        vec![choice("🔍 Найти решение", Token::SearchStart)],
        vec![choice("📥 Предложить задание", Token::SubmitStart)],
    ];
    if is_curator {
        choices.push(vec![choice("⚙️ Админ-панель", Token::AdminPanel)]);
    }
    Reply {
        text: "👋 Привет! Здесь собраны ответы на задания.\n\nМожно найти задание по классу и предмету \
               или просто прислать ссылку на него."
            .into(),
        choices,
        ..Default::default()
    }
}

pub fn admin_panel(stats: &Statistics) -> Reply {
    let text = format!(
        "⚙️ Админ-панель\n\n👥 Пользователей: {}\n📝 Заданий в базе: {}\n📬 На модерации: {}\n\
         🕐 Последнее добавление: {}\n🔍 Последний запрос: {}",
        stats.total_users,
        stats.total_tasks,
        stats.pending_tasks,
        format_time(stats.last_task_added),
        format_time(stats.last_task_requested),
    );
    Reply {
        text,
        choices: vec![
            vec![choice(format!("📬 Модерация ({})", stats.pending_tasks), Token::AdminModerate)],
            vec![
                choice("➕ Одиночное добавление", Token::AdminAddSingle),
                choice("⚡️ Пакетное добавление", Token::AdminAddBatch),
            ],
            vec![choice("🗑 Удалить задание", Token::AdminDelete)],
            vec![choice("📤 Экспорт JSON", Token::AdminExport), choice("📥 Импорт JSON", Token::AdminImport)],
            menu_row(),
        ],
        ..Default::default()
    }
}

// ---- navigation ----

fn position_word(category: Category) -> &'static str {
    match category.position_kind() {
        PositionKind::Lesson => "Урок",
        PositionKind::Semester => "Полугодие",
    }
}

/// Header lines describing a task.
pub fn task_header(task: &Task) -> String {
    let mut parts = vec![category_label(task.category).to_string()];
    if let Some(p) = task.position() {
        parts.push(format!("{} {}", position_word(task.category).to_lowercase(), p));
    }
    if let Some(o) = task.task_order {
        parts.push(format!("задание {o}"));
    }
    if let Some(v) = task.variant {
        parts.push(format!("вариант {v}"));
    }
    format!(
        "📘 {}, {} класс ({})\n{}\n🔗 {}",
        task.subject,
        task.grade,
        tier_label(task.tier),
        parts.join(", "),
        task.link.url()
    )
}

pub fn facet_step(step: &FacetStep) -> Reply {
    let (text, choices): (String, Vec<Vec<Choice>>) = match step {
        FacetStep::Grades(grades) => (
            "📚 Выбери класс:".into(),
            grid(grades.iter().map(|g| choice(format!("{g} класс"), Token::SearchGrade(*g))).collect(), 3),
        ),
        FacetStep::Subjects(subjects) => (
            "📖 Выбери предмет:".into(),
            grid(subjects.iter().map(|s| choice(s.clone(), Token::SearchSubject(s.clone()))).collect(), 2),
        ),
        FacetStep::Tiers(tiers) => (
            "📊 Выбери уровень:".into(),
            vec![tiers.iter().map(|t| choice(tier_label(*t), Token::SearchTier(*t))).collect()],
        ),
        FacetStep::Categories(categories) => (
            "📚 Выбери тип задания:".into(),
            grid(categories.iter().map(|c| choice(category_label(*c), Token::SearchCategory(*c))).collect(), 2),
        ),
        FacetStep::Positions { kind, values } => {
            let (text, label, token): (&str, &str, fn(i32) -> Token) = match kind {
                PositionKind::Lesson => ("📖 Выбери урок:", "Урок", Token::SearchLesson),
                PositionKind::Semester => ("📖 Выбери полугодие:", "Полугодие", Token::SearchSemester),
            };
            (text.into(), grid(values.iter().map(|n| choice(format!("{label} {n}"), token(*n))).collect(), 4))
        }
        FacetStep::TaskOrders { values, lesson_listing } => {
            let mut rows = grid(
                values.iter().map(|n| choice(format!("№{n}"), Token::SearchTaskOrder(*n))).collect(),
                5,
            );
            if let Some(lesson) = lesson_listing {
                rows.push(vec![choice("📚 Показать все задания урока", Token::ShowLesson(*lesson))]);
            }
            (format!("✅ Найдено заданий: {}\n\nВыбери нужное:", values.len()), rows)
        }
        FacetStep::Variants(variants) => (
            "Выбери вариант:".into(),
            grid(variants.iter().map(|v| choice(format!("Вариант {v}"), Token::SearchVariant(*v))).collect(), 4),
        ),
        FacetStep::Resolved(view) => return task_card(view),
        FacetStep::NotFound => ("😔 Задание не найдено. Возможно, его уже удалили.".into(), vec![]),
    };

    let empty = choices.is_empty();
    let mut choices = choices;
    choices.push(menu_row());
    Reply {
        text: if empty && !matches!(step, FacetStep::NotFound) { "😔 Пока ничего нет.".into() } else { text },
        choices,
        ..Default::default()
    }
}

fn move_label(m: Move) -> String {
    match m {
        Move::PrevTaskOrder(n) => format!("⬅️ Задание {n}"),
        Move::NextTaskOrder(n) => format!("Задание {n} ➡️"),
        Move::PrevVariant(n) => format!("⬅️ Вариант {n}"),
        Move::NextVariant(n) => format!("Вариант {n} ➡️"),
        Move::PrevTask(_) => "⬅️ Предыдущее".into(),
        Move::NextTask(_) => "Следующее ➡️".into(),
        Move::PrevLesson(n) => format!("⬅️ Урок {n}"),
        Move::NextLesson(n) => format!("Урок {n} ➡️"),
    }
}

pub fn task_card(view: &ResolvedTask) -> Reply {
    let mut choices = vec![];
    if !view.moves.is_empty() {
        choices.push(view.moves.iter().map(|m| choice(move_label(*m), m.token())).collect());
    }
    if let Some(lesson) = view.lesson_listing {
        choices.push(vec![choice("📚 Все задания урока", Token::ShowLesson(lesson))]);
    }
    choices.push(menu_row());

    let mut text = task_header(&view.task);
    if view.task.media.is_empty() {
        text.push_str("\n\n❌ Скриншоты для этого задания не найдены.");
    }
    Reply { text, choices, media: view.task.media.clone(), document: None }
}

pub fn lesson_listing(lesson: i32, tasks: &[Task]) -> Vec<Reply> {
    if tasks.is_empty() {
        return vec![Reply { text: "😔 В этом уроке пока нет заданий.".into(), choices: vec![menu_row()], ..Default::default() }];
    }
    let mut out: Vec<Reply> = tasks
        .iter()
        .map(|t| Reply { text: task_header(t), media: t.media.clone(), ..Default::default() })
        .collect();
    out.push(Reply {
        text: format!("📖 Урок №{lesson}: отправлено заданий: {}", tasks.len()),
        choices: vec![menu_row()],
        ..Default::default()
    });
    out
}

pub fn link_missing() -> Reply {
    Reply {
        text: "😔 Этого задания пока нет в базе. Можешь прислать решение, и после проверки оно появится.".into(),
        choices: vec![vec![choice("📥 Предложить задание", Token::SubmitStart)], menu_row()],
        ..Default::default()
    }
}

pub fn nav_error(e: NavError) -> Reply {
    let text = match e {
        NavError::Expired => "⌛ Выбор устарел, начни заново.",
        NavError::Invalid => "❌ Этот вариант сейчас недоступен.",
    };
    Reply { text: text.into(), choices: vec![vec![choice("🔍 Искать заново", Token::SearchStart)], menu_row()], ..Default::default() }
}

// ---- submission ----

fn cancel_hint(draft: &SubmissionDraft) -> &'static str {
    if draft.batch && draft.pins.is_some() {
        "(/exit_batch для выхода из пакетного режима)"
    } else {
        "(/cancel для отмены)"
    }
}

/// Prompt for the draft's current step.
pub fn draft_prompt(draft: &SubmissionDraft, subjects: &[String]) -> Reply {
    let hint = cancel_hint(draft);
    match draft.step {
        DraftStep::AwaitLink => Reply::text(format!("🔗 Отправь ссылку на задание:\n\n{LINK_EXAMPLE}\n\n{hint}")),
        DraftStep::AwaitGrade => Reply {
            text: format!("📚 Выбери класс:\n\n{hint}"),
            choices: grid((MIN_GRADE..=MAX_GRADE).map(|g| choice(format!("{g} класс"), Token::DraftGrade(g))).collect(), 4),
            ..Default::default()
        },
        DraftStep::AwaitSubject => Reply {
            text: format!("📖 Выбери предмет:\n\n{hint}"),
            choices: grid(subjects.iter().map(|s| choice(s.clone(), Token::DraftSubject(s.clone()))).collect(), 2),
            ..Default::default()
        },
        DraftStep::AwaitTier => Reply {
            text: format!("📊 Выбери уровень:\n\n{hint}"),
            choices: vec![Tier::ALL.iter().map(|t| choice(tier_label(*t), Token::DraftTier(*t))).collect()],
            ..Default::default()
        },
        DraftStep::AwaitCategory => {
            let categories = draft.tier.map(Tier::categories).unwrap_or(&[]);
            Reply {
                text: format!("📚 Выбери тип задания:\n\n{hint}"),
                choices: grid(categories.iter().map(|c| choice(category_label(*c), Token::DraftCategory(*c))).collect(), 2),
                ..Default::default()
            }
        }
        DraftStep::AwaitPosition => {
            let batch = if draft.batch { " (для всей сессии)" } else { "" };
            let text = match draft.category.map(Category::position_kind) {
                Some(PositionKind::Semester) => format!("🔢 Введи полугодие (1 или 2){batch}:\n\n{hint}"),
                _ => format!("🔢 Введи порядковый номер урока{batch}:\n\n{hint}"),
            };
            Reply::text(text)
        }
        DraftStep::AwaitTaskOrder => Reply::text(format!("🔢 Введи порядковый номер задания (1, 2, 3...):\n\n{hint}")),
        DraftStep::AwaitMedia => Reply::text(format!(
            "📸 Отправь скриншоты ответа.\n\nКогда закончишь, нажми /done. /remove удалит последний скриншот.\n\n{hint}"
        )),
    }
}

fn invalid_text(reason: Invalid) -> &'static str {
    match reason {
        Invalid::Link => "❌ Не удалось распознать ссылку.",
        Invalid::Grade => "❌ Класс должен быть от 5 до 11.",
        Invalid::Subject => "❌ Такого предмета нет в списке.",
        Invalid::CategoryForTier => "❌ Этот тип задания недоступен для выбранного уровня.",
        Invalid::NotPositive => "❌ Введи число. Попробуй снова:",
    }
}

fn duplicate_text(reason: DuplicateReason) -> &'static str {
    match reason {
        DuplicateReason::Link => "❌ Задание с такой ссылкой уже есть в базе или ожидает модерации.",
        DuplicateReason::Slot => "❌ Такое задание (по параметрам) уже есть в базе или ожидает модерации.",
    }
}

/// Replies for one submission step. `draft` is the draft after the step, if it survived.
pub fn draft_outcome(
    outcome: &DraftOutcome,
    draft: Option<&SubmissionDraft>,
    subjects: &[String],
    is_curator: bool,
) -> Vec<Reply> {
    let prompt = |extra: Option<&str>| -> Vec<Reply> {
        let mut out = vec![];
        if let Some(e) = extra {
            out.push(Reply::text(e));
        }
        match draft {
            Some(d) => out.push(draft_prompt(d, subjects)),
            None => out.push(main_menu(is_curator)),
        }
        out
    };

    match outcome {
        DraftOutcome::Prompt => prompt(None),
        DraftOutcome::Pinned => prompt(Some("📌 Параметры сохранены для всей сессии.")),
        DraftOutcome::Invalid(reason) => prompt(Some(invalid_text(*reason))),
        DraftOutcome::Unexpected => prompt(Some("🤔 Сейчас ожидается другое.")),
        DraftOutcome::Duplicate { reason, batch_continues, .. } => {
            let mut out = vec![Reply::text(format!("{}\n\nДействие отменено.", duplicate_text(*reason)))];
            if *batch_continues {
                out.extend(prompt(None));
            } else {
                out.push(main_menu(is_curator));
            }
            out
        }
        DraftOutcome::MediaAccepted { count } => vec![Reply::text(format!(
            "✅ Скриншот добавлен (всего: {count}).\n\n• Отправь ещё фото\n• /remove удалит последний\n• /done завершит"
        ))],
        DraftOutcome::MediaRemoved { count, .. } => vec![Reply::text(format!("🗑 Последний скриншот удалён (осталось: {count})."))],
        DraftOutcome::NothingToRemove => vec![Reply::text("Удалять нечего: скриншотов пока нет.")],
        DraftOutcome::NeedMedia => vec![Reply::text("📸 Нужен хотя бы один скриншот. Отправь фото или /cancel для отмены.")],
        DraftOutcome::ConfirmFinish { count } => vec![Reply {
            text: format!("Сохранить задание? Скриншотов: {count}."),
            choices: vec![vec![choice("✅ Сохранить", Token::DraftSave), choice("❌ Отменить", Token::DraftCancel)]],
            ..Default::default()
        }],
        DraftOutcome::Committed { task, batch_continues } => {
            let head = if task.is_moderated {
                format!("✅ Задание #{} сохранено.\n{}", task.id, task_header(task))
            } else {
                "✅ Спасибо! Задание отправлено на модерацию.".to_string()
            };
            let mut out = vec![Reply::text(head)];
            if *batch_continues {
                out.push(Reply::text("Отправь следующую ссылку или /exit_batch для выхода."));
            } else {
                out.push(main_menu(is_curator));
            }
            out
        }
        DraftOutcome::Cancelled { .. } => vec![Reply::text("🚫 Действие отменено."), main_menu(is_curator)],
        DraftOutcome::Expired { .. } => vec![Reply::text("⌛ Сессия устарела, начни заново."), main_menu(is_curator)],
    }
}

// ---- curator ----

pub fn moderation_card(view: &QueueView) -> Reply {
    match view {
        QueueView::Empty => Reply {
            text: "✅ Очередь модерации пуста.".into(),
            choices: vec![vec![choice("⚙️ Админ-панель", Token::AdminPanel)]],
            ..Default::default()
        },
        QueueView::Head { task, shown } => Reply {
            text: format!(
                "📬 На модерации (в очереди: {shown})\n\n#{} от {}\n{}",
                task.id,
                task.submitted_by,
                task_header(task)
            ),
            choices: vec![
                vec![choice("✅ Одобрить", Token::Approve(task.id)), choice("❌ Отклонить", Token::Decline(task.id))],
                vec![choice("⏭ Пропустить", Token::AdminModerate), choice("⚙️ Админ-панель", Token::AdminPanel)],
            ],
            media: task.media.clone(),
            document: None,
        },
    }
}

pub fn verdict(v: &Verdict) -> Reply {
    Reply::text(match v {
        Verdict::Approved(t) => format!("✅ Задание #{} одобрено.", t.id),
        Verdict::Declined(t) => format!("🗑 Задание #{} отклонено и удалено.", t.id),
        Verdict::Gone => "❌ Ошибка: задание уже обработано.".into(),
    })
}

pub fn delete_prompt() -> Reply {
    Reply::text("Отправь ID задания, которое нужно удалить.\n\n(/cancel для отмены)")
}

pub fn deleted(task: Option<&Task>) -> Reply {
    Reply::text(match task {
        Some(t) => format!("🗑 Задание #{} удалено.", t.id),
        None => "❌ Задание с таким ID не найдено.".into(),
    })
}

pub fn export_document(json: String) -> Reply {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    let file_name = format!("export_{}.json", chrono::Utc::now().format("%Y%m%d_%H%M%S"));
    Reply {
        text: "✅ Экспорт завершён!".into(),
        document: Some(DocumentOut { file_name, data_base64: STANDARD.encode(json) }),
        ..Default::default()
    }
}

pub fn import_prompt() -> Reply {
    Reply::text("📥 Отправь JSON-файл для импорта")
}

pub fn import_report(report: &ImportReport) -> Reply {
    Reply::text(format!(
        "✅ Импорт завершён. Добавлено: {}, пропущено дубликатов: {}.",
        report.accepted, report.skipped
    ))
}

pub fn failure(cause: &str) -> Reply {
    Reply::text(format!("❌ Ошибка: {cause}"))
}
