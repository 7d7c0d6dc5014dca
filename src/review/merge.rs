//! Applies review items to a draft's stage structure.

use std::collections::BTreeSet;

use tracing::debug;

use super::parser::{ItemRejection, ReviewItem, ReviewTarget};
use crate::contract::{ContractDraft, DraftProgress, FieldVocabulary, Stage};

/// Result of merging one message's review items into a draft.
#[derive(Debug, Default)]
pub struct MergeOutcome {
    /// Number of items written into the draft.
    pub applied: usize,
    /// Stages that received at least one write.
    pub stages: BTreeSet<Stage>,
    /// Items that could not be written, with the reason.
    pub rejected: Vec<(ReviewItem, ItemRejection)>,
}

impl MergeOutcome {
    pub fn has_effect(&self) -> bool {
        self.applied > 0
    }
}

/// Write every resolvable item into `draft`, marking touched stages unread.
///
/// Later items win when several address the same slot.
pub fn merge_review_items(
    draft: &mut ContractDraft,
    items: &[ReviewItem],
    vocabulary: &FieldVocabulary,
) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();

    for item in items {
        match item.resolve(vocabulary) {
            Ok(target) => {
                let stage = apply_target(&mut draft.draft_progress, &target, &item.message);
                outcome.applied += 1;
                outcome.stages.insert(stage);
            }
            Err(rejection) => {
                debug!(
                    contract = %draft.key,
                    field = %item.field_code,
                    stage = %item.stage_code,
                    reason = %rejection,
                    "Review item rejected"
                );
                outcome.rejected.push((item.clone(), rejection));
            }
        }
    }

    outcome
}

/// Write a single message at `target` and flag its stage as unread.
pub fn apply_target(progress: &mut DraftProgress, target: &ReviewTarget, message: &str) -> Stage {
    match target {
        ReviewTarget::Field { stage, code } => {
            let record = progress.fields_mut(*stage);
            record.review_items.insert(code.clone(), message.to_string());
            record.mark_unread();
        }
        ReviewTarget::Entry { stage, index } => {
            let record = progress.entries_mut(*stage);
            record.review_items.insert(*index, message.to_string());
            record.mark_unread();
        }
        ReviewTarget::Director { index } => {
            let record = &mut progress.documentation;
            record
                .review_items
                .directors
                .insert(*index, message.to_string());
            record.mark_unread();
        }
        ReviewTarget::Document { code } => {
            let record = &mut progress.documentation;
            record
                .review_items
                .fields
                .insert(code.clone(), message.to_string());
            record.mark_unread();
        }
    }
    target.stage()
}
