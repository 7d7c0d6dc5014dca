//! Per-message dispositions and per-tick summaries.

use std::fmt;

use uuid::Uuid;

use crate::mail::Folder;

/// Why a message was left in the monitored folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetainReason {
    /// No draft with the subject's contract id.
    ContractNotFound,
    /// Live insert failed during promotion.
    PromotionFailed,
    /// Document store error while handling the review.
    StoreFailure,
    /// The message was handled but could not be moved.
    RoutingFailed,
}

impl RetainReason {
    pub fn label(&self) -> &'static str {
        match self {
            RetainReason::ContractNotFound => "contract_not_found",
            RetainReason::PromotionFailed => "promotion_failed",
            RetainReason::StoreFailure => "store_failure",
            RetainReason::RoutingFailed => "routing_failed",
        }
    }
}

impl fmt::Display for RetainReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Terminal outcome of one message in one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Moved to a folder.
    Routed(Folder),
    /// Review marker present but no usable contract id; moved to `Malformed`.
    MalformedSubject,
    /// Left in the inbox; seen again next tick.
    Retained(RetainReason),
}

impl Disposition {
    /// Folder the message ended up in, if it left the inbox.
    pub fn folder(&self) -> Option<Folder> {
        match self {
            Disposition::Routed(folder) => Some(*folder),
            Disposition::MalformedSubject => Some(Folder::Malformed),
            Disposition::Retained(_) => None,
        }
    }
}

/// Counts for one poller tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub tick_id: Uuid,
    /// Messages listed by the search.
    pub listed: usize,
    pub general: usize,
    pub malformed: usize,
    pub reviewed: usize,
    pub retained: usize,
    pub fetch_failed: usize,
    /// The search itself failed; nothing was processed.
    pub search_failed: bool,
    /// Remaining messages were skipped after a malformed subject.
    pub aborted: bool,
}

impl TickReport {
    pub fn new() -> Self {
        Self {
            tick_id: Uuid::new_v4(),
            listed: 0,
            general: 0,
            malformed: 0,
            reviewed: 0,
            retained: 0,
            fetch_failed: 0,
            search_failed: false,
            aborted: false,
        }
    }

    pub fn record(&mut self, disposition: &Disposition) {
        match disposition.folder() {
            Some(Folder::General) => self.general += 1,
            Some(Folder::Malformed) => self.malformed += 1,
            Some(Folder::Reviewed) => self.reviewed += 1,
            None => self.retained += 1,
        }
    }

    /// Messages that got a disposition this tick.
    pub fn processed(&self) -> usize {
        self.general + self.malformed + self.reviewed + self.retained
    }

    /// Nothing happened worth logging.
    pub fn is_empty(&self) -> bool {
        self.listed == 0 && !self.search_failed
    }
}

impl Default for TickReport {
    fn default() -> Self {
        Self::new()
    }
}
