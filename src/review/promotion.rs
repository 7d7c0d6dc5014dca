//! Approval promotion: draft → live contract, plus curator bookkeeping.
//!
//! Steps run in an order that can be resumed after a failure:
//!
//! 1. write the live contract (insert, or replace one left by an earlier pass),
//! 2. record the contract on every curator account (idempotent appends),
//! 3. delete the draft,
//! 4. notify curators.
//!
//! The draft is only deleted once the live contract is written and every
//! existing curator account records it. Any failure before that leaves the
//! draft in place so the message can be retried.

use tracing::{error, info, warn};

use super::notify::{CuratorNotifier, CuratorRole};
use crate::contract::{ContractDraft, TimeRecord};
use crate::error::ReviewError;
use crate::store::DocumentStore;

/// What happened to one curator account during promotion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CuratorOutcome {
    /// Contract id appended and account saved.
    Added,
    /// Account already listed the contract.
    AlreadyRecorded,
    /// No account with this email address.
    AccountMissing,
    /// Lookup or save failed.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CuratorUpdate {
    pub email_address: String,
    pub role: CuratorRole,
    pub outcome: CuratorOutcome,
}

/// Summary of a promotion.
#[derive(Debug, Clone)]
pub struct PromotionReport {
    pub key: String,
    /// `false` when an earlier pass had already written the live contract
    /// and this pass replaced it.
    pub inserted: bool,
    pub curators: Vec<CuratorUpdate>,
    pub draft_deleted: bool,
}

/// Promote an approved draft into the live collection.
///
/// Fails with [`ReviewError::PromotionInsertFailure`] when the live write
/// fails; in that case nothing else has been touched. Fails with
/// [`ReviewError::PromotionIncomplete`] when a curator account could not be
/// updated or the draft could not be deleted; the draft is kept and a later
/// pass picks up where this one stopped.
pub async fn promote_draft(
    store: &dyn DocumentStore,
    notifier: &dyn CuratorNotifier,
    mut draft: ContractDraft,
) -> Result<PromotionReport, ReviewError> {
    draft.approve(TimeRecord::now());
    let key = draft.key.clone();
    let insert_failure = |reason: String| ReviewError::PromotionInsertFailure {
        key: key.clone(),
        reason,
    };

    let inserted = if store.find_live(&key).await?.is_some() {
        info!(contract = %key, "Live contract already exists, replacing it and resuming promotion");
        let replaced = store
            .replace_live(&draft)
            .await
            .map_err(|e| insert_failure(e.to_string()))?;
        if !replaced {
            return Err(insert_failure("live contract vanished during promotion".into()));
        }
        false
    } else {
        store
            .insert_live(&draft)
            .await
            .map_err(|e| insert_failure(e.to_string()))?;
        info!(contract = %key, "Contract moved to live contracts");
        true
    };

    let mut curators = Vec::new();
    for (position, email) in draft.curators().enumerate() {
        let role = if position == 0 {
            CuratorRole::Primary
        } else {
            CuratorRole::Featured
        };
        let outcome = record_on_account(store, email, &key, role).await;
        curators.push(CuratorUpdate {
            email_address: email.to_string(),
            role,
            outcome,
        });
    }

    if let Some((curator, reason)) = curators.iter().find_map(|update| match &update.outcome {
        CuratorOutcome::Failed(reason) => Some((&update.email_address, reason)),
        _ => None,
    }) {
        return Err(ReviewError::PromotionIncomplete {
            key,
            reason: format!("curator {curator} not updated: {reason}"),
        });
    }

    let draft_deleted = match store.delete_draft(&key).await {
        Ok(true) => true,
        Ok(false) => {
            warn!(contract = %key, "Draft already gone during promotion");
            false
        }
        Err(e) => {
            return Err(ReviewError::PromotionIncomplete {
                key,
                reason: format!("draft not deleted: {e}"),
            });
        }
    };

    for update in &curators {
        if matches!(
            update.outcome,
            CuratorOutcome::Added | CuratorOutcome::AlreadyRecorded
        ) {
            notifier
                .contract_approved(&draft, &update.email_address, update.role)
                .await;
        }
    }

    Ok(PromotionReport {
        key,
        inserted,
        curators,
        draft_deleted,
    })
}

/// Append `contract` to the curator's account.
async fn record_on_account(
    store: &dyn DocumentStore,
    email_address: &str,
    contract: &str,
    role: CuratorRole,
) -> CuratorOutcome {
    let mut account = match store.find_account(email_address).await {
        Ok(Some(account)) => account,
        Ok(None) => {
            warn!(curator = email_address, contract = contract, "Curator account not found");
            return CuratorOutcome::AccountMissing;
        }
        Err(e) => {
            error!(curator = email_address, error = %e, "Curator lookup failed");
            return CuratorOutcome::Failed(e.to_string());
        }
    };

    let added = match role {
        CuratorRole::Primary => account.add_owned(contract),
        CuratorRole::Featured => account.add_featured(contract),
    };
    if !added {
        return CuratorOutcome::AlreadyRecorded;
    }

    match store.replace_account(&account).await {
        Ok(true) => CuratorOutcome::Added,
        Ok(false) => {
            warn!(curator = email_address, "Curator account vanished before update");
            CuratorOutcome::AccountMissing
        }
        Err(e) => {
            error!(curator = email_address, error = %e, "Curator update failed");
            CuratorOutcome::Failed(e.to_string())
        }
    }
}
