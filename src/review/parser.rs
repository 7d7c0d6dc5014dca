//! Review annotation grammar.
//!
//! Reviewers reply with lines such as:
//!
//! ```text
//! ct(0): Please shorten the title.
//! re(3)(1): The second reward is too expensive.
//! dd(6)(0): The director's ID scan is unreadable.
//! ```
//!
//! Scanning is lexical: every grammar match in the body becomes a
//! [`ReviewItem`], in order of appearance, and text between matches is
//! ignored. Whether an item can be written into a draft is decided separately
//! by [`ReviewItem::resolve`].

use std::sync::LazyLock;

use regex::Regex;

use crate::contract::{FieldKind, FieldStage, FieldVocabulary, ItemIndex, ListStage, Stage};
use crate::error::ReviewError;

/// `<two-letters>(<digits>)[(<digits>)]: <text>.`
static REVIEW_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([a-zA-Z]{2})\(([0-9]+)\)(?:\(([0-9]+)\))?: (.*?\.)")
        .expect("review item pattern is valid")
});

/// One annotation as written by the reviewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewItem {
    /// Two-letter field code, case preserved.
    pub field_code: String,
    /// Stage digit(s) as written.
    pub stage_code: String,
    /// Optional list index digits as written.
    pub index: Option<String>,
    /// Review text including the terminating period.
    pub message: String,
}

/// Where a review item lands in a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewTarget {
    /// `draft_progress[stage].review_items[code]`
    Field { stage: FieldStage, code: String },
    /// `draft_progress[stage].review_items[index]`
    Entry { stage: ListStage, index: ItemIndex },
    /// `draft_progress.documentation.review_items.dd[index]`
    Director { index: ItemIndex },
    /// `draft_progress.documentation.review_items[code]`
    Document { code: String },
}

impl ReviewTarget {
    pub fn stage(&self) -> Stage {
        match self {
            ReviewTarget::Field { stage, .. } => (*stage).into(),
            ReviewTarget::Entry { stage, .. } => (*stage).into(),
            ReviewTarget::Director { .. } | ReviewTarget::Document { .. } => Stage::Documentation,
        }
    }
}

/// Why a review item contributes nothing to a draft.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ItemRejection {
    #[error("unknown stage code {code:?}")]
    UnknownStage { code: String },

    #[error("field {code:?} is not part of the {stage} stage")]
    UnknownField { stage: Stage, code: String },

    #[error("field {code:?} in the {stage} stage needs an index")]
    MissingIndex { stage: Stage, code: String },

    #[error("field {code:?} in the {stage} stage does not take an index")]
    UnexpectedIndex { stage: Stage, code: String },

    #[error("index {index:?} is out of range")]
    IndexOutOfRange { index: String },
}

impl ReviewItem {
    /// Check the item against the vocabulary and compute its write target.
    pub fn resolve(&self, vocabulary: &FieldVocabulary) -> Result<ReviewTarget, ItemRejection> {
        let stage = Stage::from_code(&self.stage_code).ok_or_else(|| ItemRejection::UnknownStage {
            code: self.stage_code.clone(),
        })?;
        let code = self.field_code.clone();
        let kind = vocabulary
            .kind(stage, &code)
            .ok_or_else(|| ItemRejection::UnknownField {
                stage,
                code: code.clone(),
            })?;
        let index = self.index.as_deref().map(parse_index).transpose()?;

        match (kind, index) {
            (FieldKind::Scalar, Some(_)) => Err(ItemRejection::UnexpectedIndex { stage, code }),
            (FieldKind::Indexed, None) => Err(ItemRejection::MissingIndex { stage, code }),
            (FieldKind::Indexed, Some(index)) => match stage.as_list_stage() {
                Some(stage) => Ok(ReviewTarget::Entry { stage, index }),
                None if stage == Stage::Documentation => Ok(ReviewTarget::Director { index }),
                None => Err(ItemRejection::UnexpectedIndex { stage, code }),
            },
            (FieldKind::Scalar, None) => match stage.as_field_stage() {
                Some(stage) => Ok(ReviewTarget::Field { stage, code }),
                None if stage == Stage::Documentation => Ok(ReviewTarget::Document { code }),
                None => Err(ItemRejection::MissingIndex { stage, code }),
            },
        }
    }
}

fn parse_index(raw: &str) -> Result<ItemIndex, ItemRejection> {
    raw.parse::<u32>()
        .map(ItemIndex)
        .map_err(|_| ItemRejection::IndexOutOfRange {
            index: raw.to_string(),
        })
}

/// Scan a body for review items, in order of appearance.
pub fn parse_review_items(body: &str) -> Vec<ReviewItem> {
    REVIEW_ITEM_RE
        .captures_iter(body)
        .map(|caps| ReviewItem {
            field_code: caps[1].to_string(),
            stage_code: caps[2].to_string(),
            index: caps.get(3).map(|m| m.as_str().to_string()),
            message: caps[4].to_string(),
        })
        .collect()
}

/// Whether the body is a bare approval (`approved` / `approved.`, any case).
pub fn is_approval(body: &str) -> bool {
    matches!(body.trim().to_lowercase().as_str(), "approved" | "approved.")
}

/// Whether the subject carries the review marker at all.
pub fn has_review_marker(subject: &str, marker: &str) -> bool {
    subject.contains(marker)
}

/// Extract the contract id from a `"<marker>: <id>"` subject.
///
/// The subject must split into exactly two segments around `"<marker>: "`
/// and the id must not be blank.
pub fn extract_contract_id(subject: &str, marker: &str) -> Result<String, ReviewError> {
    let separator = format!("{marker}: ");
    let segments: Vec<&str> = subject.split(separator.as_str()).collect();
    match segments.as_slice() {
        [_, id] if !id.trim().is_empty() => Ok(id.trim().to_string()),
        _ => Err(ReviewError::SubjectMalformed {
            subject: subject.to_string(),
        }),
    }
}
