//! Selection tokens carried by choice buttons.
//!
//! A token is either a fixed action (`menu_main`) or `<prefix>_<value>`, with
//! the value parsed per facet: integer, tier/category ordinal, or the raw rest
//! of the string for subjects.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::domain::{Category, Tier};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    MainMenu,
    SearchStart,
    SearchGrade(i32),
    SearchSubject(String),
    SearchTier(Tier),
    SearchCategory(Category),
    SearchSemester(i32),
    SearchLesson(i32),
    SearchTaskOrder(i32),
    SearchVariant(i32),
    ShowTask(i64),
    ShowLesson(i32),
    SubmitStart,
    DraftGrade(i32),
    DraftSubject(String),
    DraftTier(Tier),
    DraftCategory(Category),
    DraftSave,
    DraftCancel,
    AdminPanel,
    AdminModerate,
    AdminAddSingle,
    AdminAddBatch,
    AdminDelete,
    AdminExport,
    AdminImport,
    Approve(i64),
    Decline(i64),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("unknown token {0:?}")]
    Unknown(String),
    #[error("bad value {value:?} for {prefix}")]
    BadValue { prefix: &'static str, value: String },
}

const FIXED: &[(&str, Token)] = &[
    ("menu_main", Token::MainMenu),
    ("search_start", Token::SearchStart),
    ("submit_start", Token::SubmitStart),
    ("draft_save", Token::DraftSave),
    ("draft_cancel", Token::DraftCancel),
    ("admin_panel", Token::AdminPanel),
    ("admin_moderate", Token::AdminModerate),
    ("admin_add_single", Token::AdminAddSingle),
    ("admin_add_batch", Token::AdminAddBatch),
    ("admin_delete", Token::AdminDelete),
    ("admin_export", Token::AdminExport),
    ("admin_import", Token::AdminImport),
];

fn int<T: FromStr>(prefix: &'static str, value: &str) -> Result<T, TokenError> {
    value
        .parse::<T>()
        .map_err(|_| TokenError::BadValue { prefix, value: value.to_string() })
}

fn tier(prefix: &'static str, value: &str) -> Result<Tier, TokenError> {
    Tier::from_ordinal(int(prefix, value)?).ok_or_else(|| TokenError::BadValue { prefix, value: value.to_string() })
}

fn category(prefix: &'static str, value: &str) -> Result<Category, TokenError> {
    Category::from_ordinal(int(prefix, value)?)
        .ok_or_else(|| TokenError::BadValue { prefix, value: value.to_string() })
}

fn subject(prefix: &'static str, value: &str) -> Result<String, TokenError> {
    if value.trim().is_empty() {
        return Err(TokenError::BadValue { prefix, value: value.to_string() });
    }
    Ok(value.to_string())
}

impl FromStr for Token {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((_, t)) = FIXED.iter().find(|(name, _)| *name == s) {
            return Ok(t.clone());
        }

        type Parse = fn(&'static str, &str) -> Result<Token, TokenError>;
        let prefixed: &[(&'static str, Parse)] = &[
            ("search_grade_", |p, v| int(p, v).map(Token::SearchGrade)),
            ("search_subj_", |p, v| subject(p, v).map(Token::SearchSubject)),
            ("search_tier_", |p, v| tier(p, v).map(Token::SearchTier)),
            ("search_cat_", |p, v| category(p, v).map(Token::SearchCategory)),
            ("search_semester_", |p, v| int(p, v).map(Token::SearchSemester)),
            ("search_lesson_", |p, v| int(p, v).map(Token::SearchLesson)),
            ("search_taskorder_", |p, v| int(p, v).map(Token::SearchTaskOrder)),
            ("search_variant_", |p, v| int(p, v).map(Token::SearchVariant)),
            ("show_task_", |p, v| int(p, v).map(Token::ShowTask)),
            ("show_lesson_", |p, v| int(p, v).map(Token::ShowLesson)),
            ("draft_grade_", |p, v| int(p, v).map(Token::DraftGrade)),
            ("draft_subj_", |p, v| subject(p, v).map(Token::DraftSubject)),
            ("draft_tier_", |p, v| tier(p, v).map(Token::DraftTier)),
            ("draft_cat_", |p, v| category(p, v).map(Token::DraftCategory)),
            ("approve_", |p, v| int(p, v).map(Token::Approve)),
            ("decline_", |p, v| int(p, v).map(Token::Decline)),
        ];
        for (prefix, parse) in prefixed {
            if let Some(value) = s.strip_prefix(prefix) {
                return parse(prefix, value);
            }
        }
        Err(TokenError::Unknown(s.to_string()))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::SearchGrade(n) => write!(f, "search_grade_{n}"),
            Token::SearchSubject(s) => write!(f, "search_subj_{s}"),
            Token::SearchTier(t) => write!(f, "search_tier_{}", t.ordinal()),
            Token::SearchCategory(c) => write!(f, "search_cat_{}", c.ordinal()),
            Token::SearchSemester(n) => write!(f, "search_semester_{n}"),
            Token::SearchLesson(n) => write!(f, "search_lesson_{n}"),
            Token::SearchTaskOrder(n) => write!(f, "search_taskorder_{n}"),
            Token::SearchVariant(n) => write!(f, "search_variant_{n}"),
            Token::ShowTask(id) => write!(f, "show_task_{id}"),
            Token::ShowLesson(n) => write!(f, "show_lesson_{n}"),
            Token::DraftGrade(n) => write!(f, "draft_grade_{n}"),
            Token::DraftSubject(s) => write!(f, "draft_subj_{s}"),
            Token::DraftTier(t) => write!(f, "draft_tier_{}", t.ordinal()),
            Token::DraftCategory(c) => write!(f, "draft_cat_{}", c.ordinal()),
            Token::Approve(id) => write!(f, "approve_{id}"),
            Token::Decline(id) => write!(f, "decline_{id}"),
            fixed => {
                let name = FIXED
                    .iter()
                    .find(|(_, t)| t == fixed)
                    .map(|(name, _)| *name)
                    .unwrap_or("menu_main");
                f.write_str(name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fixed_and_prefixed_tokens() {
        assert_eq!("menu_main".parse::<Token>(), Ok(Token::MainMenu));
        assert_eq!("draft_save".parse::<Token>(), Ok(Token::DraftSave));
        assert_eq!("search_grade_9".parse::<Token>(), Ok(Token::SearchGrade(9)));
        assert_eq!("search_tier_2".parse::<Token>(), Ok(Token::SearchTier(Tier::Inverted)));
        assert_eq!("search_cat_3".parse::<Token>(), Ok(Token::SearchCategory(Category::ControlWork)));
        assert_eq!(
            "search_subj_Русский язык".parse::<Token>(),
            Ok(Token::SearchSubject("Русский язык".into()))
        );
        assert_eq!("approve_42".parse::<Token>(), Ok(Token::Approve(42)));
    }

    #[test]
    fn malformed_values_are_errors() {
        assert!(matches!("search_grade_x".parse::<Token>(), Err(TokenError::BadValue { .. })));
        assert!(matches!("search_tier_7".parse::<Token>(), Err(TokenError::BadValue { .. })));
        assert!(matches!("draft_subj_".parse::<Token>(), Err(TokenError::BadValue { .. })));
        assert!(matches!("bogus".parse::<Token>(), Err(TokenError::Unknown(_))));
    }

    #[test]
    fn display_is_parseable() {
        let tokens = [
            Token::AdminAddBatch,
            Token::SearchVariant(2),
            Token::DraftCategory(Category::Theory),
            Token::ShowLesson(4),
            Token::Decline(9),
        ];
        for t in tokens {
            assert_eq!(t.to_string().parse::<Token>(), Ok(t.clone()));
        }
    }
}
