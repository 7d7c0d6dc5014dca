//! Review pipeline: one tick over the monitored folder.
//!
//! Flow per message:
//! 1. Allowlist and subject marker → otherwise `General`
//! 2. Contract id from the subject → otherwise `Malformed` (may end the tick)
//! 3. Approval → promotion; anything else → review merge
//! 4. Route to the folder the outcome names, or leave it in the inbox
//!
//! A message only leaves the inbox once it has been routed.

use std::sync::Arc;

use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::ReviewConfig;
use crate::contract::FieldVocabulary;
use crate::error::ReviewError;
use crate::mail::{Folder, MailStore, ReviewMail, is_sender_allowed, route_message};
use crate::pipeline::types::{Disposition, RetainReason, TickReport};
use crate::review::{
    CuratorNotifier, LogNotifier, LogReporter, NonDelivery, NonDeliveryReporter,
    extract_contract_id, has_review_marker, is_approval, merge_review_items, parse_review_items,
    promote_draft,
};
use crate::store::DocumentStore;

/// Drives review mail from the inbox into the document store.
pub struct ReviewPipeline {
    mailbox: Arc<dyn MailStore>,
    store: Arc<dyn DocumentStore>,
    reporter: Arc<dyn NonDeliveryReporter>,
    notifier: Arc<dyn CuratorNotifier>,
    vocabulary: FieldVocabulary,
    config: ReviewConfig,
}

impl ReviewPipeline {
    /// Create a pipeline with logging hooks and the default field vocabulary.
    pub fn new(
        mailbox: Arc<dyn MailStore>,
        store: Arc<dyn DocumentStore>,
        config: ReviewConfig,
    ) -> Self {
        Self {
            mailbox,
            store,
            reporter: Arc::new(LogReporter),
            notifier: Arc::new(LogNotifier),
            vocabulary: FieldVocabulary::default(),
            config,
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn NonDeliveryReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn CuratorNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_vocabulary(mut self, vocabulary: FieldVocabulary) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    /// Process everything currently in the monitored folder.
    ///
    /// Never fails: adapter errors are logged and reflected in the report.
    pub async fn run_tick(&self) -> TickReport {
        let mut report = TickReport::new();
        let span = info_span!("tick", id = %report.tick_id);

        async {
            let uids = match self.mailbox.search_all().await {
                Ok(uids) => uids,
                Err(e) => {
                    error!(error = %e, "Mailbox search failed");
                    report.search_failed = true;
                    return;
                }
            };
            report.listed = uids.len();
            if uids.is_empty() {
                return;
            }
            debug!(count = uids.len(), "Messages to process");

            for uid in uids {
                let raw = match self.mailbox.fetch(uid).await {
                    Ok(raw) => raw,
                    Err(e) => {
                        warn!(uid, error = %e, "Failed to fetch message");
                        report.fetch_failed += 1;
                        continue;
                    }
                };

                let disposition = self.process_message(uid, &raw).await;
                report.record(&disposition);

                if disposition == Disposition::MalformedSubject
                    && self.config.abort_tick_on_malformed_subject
                {
                    info!(uid, "Malformed review subject, skipping rest of tick");
                    report.aborted = true;
                    break;
                }
            }
        }
        .instrument(span)
        .await;

        report
    }

    /// Decide and carry out the disposition of one raw message.
    pub async fn process_message(&self, uid: u32, raw: &[u8]) -> Disposition {
        let Some(mail) = ReviewMail::parse(raw) else {
            warn!(uid, "Unparseable message");
            return self.route(uid, Folder::General).await;
        };

        if !is_sender_allowed(&self.config.allowed_reviewers, &mail.sender) {
            debug!(uid, sender = %mail.sender, "Sender not an allowed reviewer");
            return self.route(uid, Folder::General).await;
        }
        if !has_review_marker(&mail.subject, &self.config.subject_marker) {
            debug!(uid, subject = %mail.subject, "Not a review subject");
            return self.route(uid, Folder::General).await;
        }

        let key = match extract_contract_id(&mail.subject, &self.config.subject_marker) {
            Ok(key) => key,
            Err(e) => {
                warn!(uid, error = %e, "Review subject without a usable contract id");
                return match self.route(uid, Folder::Malformed).await {
                    Disposition::Routed(_) => Disposition::MalformedSubject,
                    retained => retained,
                };
            }
        };

        match self.handle_review(&key, &mail).await {
            Ok(folder) => self.route(uid, folder).await,
            Err(ReviewError::NoEffectReview { .. }) => {
                info!(uid, contract = %key, "Review changed nothing");
                self.route(uid, Folder::Malformed).await
            }
            Err(e) => self.retain(uid, &key, &mail, e).await,
        }
    }

    /// Apply one review message to contract `key`; returns the target folder.
    pub async fn handle_review(&self, key: &str, mail: &ReviewMail) -> Result<Folder, ReviewError> {
        let approval = is_approval(&mail.body);

        let Some(mut draft) = self.store.find_draft(key).await? else {
            if approval && self.store.find_live(key).await?.is_some() {
                info!(contract = key, "Approval for a contract that is already live");
                return Ok(Folder::Reviewed);
            }
            return Err(ReviewError::ContractNotFound {
                key: key.to_string(),
            });
        };

        if approval {
            let report = promote_draft(self.store.as_ref(), self.notifier.as_ref(), draft).await?;
            info!(
                contract = key,
                inserted = report.inserted,
                curators = report.curators.len(),
                draft_deleted = report.draft_deleted,
                "Contract approved"
            );
            return Ok(Folder::Reviewed);
        }

        let items = parse_review_items(&mail.body);
        let outcome = merge_review_items(&mut draft, &items, &self.vocabulary);
        if !outcome.has_effect() {
            return Err(ReviewError::NoEffectReview {
                key: key.to_string(),
            });
        }

        if !self.store.replace_draft(&draft).await? {
            return Err(ReviewError::ContractNotFound {
                key: key.to_string(),
            });
        }
        info!(
            contract = key,
            applied = outcome.applied,
            rejected = outcome.rejected.len(),
            stages = ?outcome.stages,
            "Review merged"
        );
        Ok(Folder::Reviewed)
    }

    async fn route(&self, uid: u32, folder: Folder) -> Disposition {
        match route_message(self.mailbox.as_ref(), uid, folder).await {
            Ok(()) => Disposition::Routed(folder),
            Err(e) => {
                error!(uid, folder = %folder, error = %e, "Failed to route message");
                Disposition::Retained(RetainReason::RoutingFailed)
            }
        }
    }

    async fn retain(&self, uid: u32, key: &str, mail: &ReviewMail, err: ReviewError) -> Disposition {
        // Partial promotions and store failures are retried next tick without a report.
        let (reason, report) = match &err {
            ReviewError::ContractNotFound { .. } => (RetainReason::ContractNotFound, true),
            ReviewError::PromotionInsertFailure { .. } => (RetainReason::PromotionFailed, true),
            ReviewError::PromotionIncomplete { .. } => (RetainReason::PromotionFailed, false),
            _ => (RetainReason::StoreFailure, false),
        };

        if !report {
            error!(uid, contract = key, error = %err, "Review left in inbox");
        } else {
            self.reporter
                .report(&NonDelivery {
                    sender: mail.sender.clone(),
                    subject: mail.subject.clone(),
                    contract: key.to_string(),
                    reason: err.to_string(),
                    body: mail.body.clone(),
                })
                .await;
        }
        Disposition::Retained(reason)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::contract::{Account, ContractDraft, ItemIndex};
    use crate::error::MailboxError;
    use crate::store::LibSqlBackend;

    /// In-memory mailbox: uid → raw message, plus a log of routing calls.
    #[derive(Default)]
    struct MemoryMailbox {
        inbox: Mutex<BTreeMap<u32, Vec<u8>>>,
        deleted: Mutex<Vec<u32>>,
        copies: Mutex<Vec<(u32, String)>>,
    }

    impl MemoryMailbox {
        fn with(messages: &[(u32, String)]) -> Self {
            let mailbox = Self::default();
            {
                let mut inbox = mailbox.inbox.lock().unwrap();
                for (uid, raw) in messages {
                    inbox.insert(*uid, raw.clone().into_bytes());
                }
            }
            mailbox
        }

        fn copies(&self) -> Vec<(u32, String)> {
            self.copies.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MailStore for MemoryMailbox {
        async fn search_all(&self) -> Result<Vec<u32>, MailboxError> {
            Ok(self.inbox.lock().unwrap().keys().copied().collect())
        }
        async fn fetch(&self, uid: u32) -> Result<Vec<u8>, MailboxError> {
            self.inbox
                .lock()
                .unwrap()
                .get(&uid)
                .cloned()
                .ok_or(MailboxError::NotFound { uid })
        }
        async fn copy(&self, uid: u32, folder: &str) -> Result<(), MailboxError> {
            self.copies.lock().unwrap().push((uid, folder.to_string()));
            Ok(())
        }
        async fn mark_deleted(&self, uid: u32) -> Result<(), MailboxError> {
            self.deleted.lock().unwrap().push(uid);
            Ok(())
        }
        async fn expunge(&self) -> Result<(), MailboxError> {
            let deleted: Vec<u32> = self.deleted.lock().unwrap().drain(..).collect();
            let mut inbox = self.inbox.lock().unwrap();
            for uid in deleted {
                inbox.remove(&uid);
            }
            Ok(())
        }
    }

    fn mail(from: &str, subject: &str, body: &str) -> String {
        format!("From: {from}\r\nSubject: {subject}\r\n\r\n{body}\r\n")
    }

    async fn pipeline_with(
        messages: &[(u32, String)],
    ) -> (ReviewPipeline, Arc<MemoryMailbox>, Arc<LibSqlBackend>) {
        let mailbox = Arc::new(MemoryMailbox::with(messages));
        let store = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        store
            .insert_draft(&ContractDraft::new("C123", "Solar Farm", "a@x.com"))
            .await
            .unwrap();
        store.insert_account(&Account::new("a@x.com")).await.unwrap();

        let config = ReviewConfig {
            allowed_reviewers: vec!["libby@x.com".into()],
            ..Default::default()
        };
        let pipeline = ReviewPipeline::new(mailbox.clone(), store.clone(), config);
        (pipeline, mailbox, store)
    }

    // ── Routing decisions ───────────────────────────────────────────

    #[tokio::test]
    async fn subject_without_marker_goes_general() {
        let (pipeline, mailbox, _) =
            pipeline_with(&[(1, mail("libby@x.com", "Lunch?", "ct(0): Hi."))]).await;
        let report = pipeline.run_tick().await;
        assert_eq!(report.general, 1);
        assert_eq!(mailbox.copies(), vec![(1, "General".to_string())]);
    }

    #[tokio::test]
    async fn unknown_sender_goes_general() {
        let (pipeline, mailbox, store) = pipeline_with(&[(
            1,
            mail("mallory@evil.com", "Reviewal: C123", "ct(0): Hi."),
        )])
        .await;
        pipeline.run_tick().await;
        assert_eq!(mailbox.copies(), vec![(1, "General".to_string())]);
        let draft = store.find_draft("C123").await.unwrap().unwrap();
        assert!(draft.draft_progress.basic.review_items.is_empty());
    }

    #[tokio::test]
    async fn review_is_merged_and_routed() {
        let (pipeline, mailbox, store) = pipeline_with(&[(
            7,
            mail("libby@x.com", "Reviewal: C123", "re(3)(2): Too cheap."),
        )])
        .await;
        let report = pipeline.run_tick().await;
        assert_eq!(report.reviewed, 1);
        assert_eq!(mailbox.copies(), vec![(7, "Reviewed".to_string())]);

        let draft = store.find_draft("C123").await.unwrap().unwrap();
        assert_eq!(
            draft.draft_progress.rewards.review_items[&ItemIndex(2)],
            "Too cheap."
        );
        assert!(draft.draft_progress.rewards.has_unread_reviews);
    }

    #[tokio::test]
    async fn missing_contract_is_reported_and_retained() {
        #[derive(Default)]
        struct Recording(Mutex<Vec<NonDelivery>>);

        #[async_trait]
        impl NonDeliveryReporter for Recording {
            async fn report(&self, report: &NonDelivery) {
                self.0.lock().unwrap().push(report.clone());
            }
        }

        let (pipeline, mailbox, _) = pipeline_with(&[(
            2,
            mail("libby@x.com", "Reviewal: C999", "ct(0): Hi."),
        )])
        .await;
        let reporter = Arc::new(Recording::default());
        let pipeline = pipeline.with_reporter(reporter.clone());

        let report = pipeline.run_tick().await;
        assert_eq!(report.retained, 1);
        assert!(mailbox.copies().is_empty());
        assert_eq!(mailbox.search_all().await.unwrap(), vec![2]);

        let reports = reporter.0.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].contract, "C999");
    }

    #[tokio::test]
    async fn approval_of_live_contract_is_routed() {
        let (pipeline, mailbox, store) = pipeline_with(&[(
            4,
            mail("libby@x.com", "Reviewal: C555", "Approved."),
        )])
        .await;
        store
            .insert_live(&ContractDraft::new("C555", "Mill", "a@x.com"))
            .await
            .unwrap();

        let report = pipeline.run_tick().await;
        assert_eq!(report.reviewed, 1);
        assert_eq!(mailbox.copies(), vec![(4, "Reviewed".to_string())]);
    }

    #[tokio::test]
    async fn marker_without_id_routes_malformed() {
        let (pipeline, mailbox, _) =
            pipeline_with(&[(1, mail("libby@x.com", "Reviewal", "approved"))]).await;
        let disposition = pipeline
            .process_message(1, mailbox.fetch(1).await.unwrap().as_slice())
            .await;
        assert_eq!(disposition, Disposition::MalformedSubject);
        assert_eq!(mailbox.copies(), vec![(1, "Malformed".to_string())]);
    }
}
