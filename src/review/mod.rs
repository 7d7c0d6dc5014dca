//! Review annotations: parsing, merging into drafts, and approval promotion.

pub mod merge;
pub mod notify;
pub mod parser;
pub mod promotion;

pub use merge::{MergeOutcome, merge_review_items};
pub use notify::{
    CuratorNotifier, CuratorRole, LogNotifier, LogReporter, NonDelivery, NonDeliveryReporter,
};
pub use parser::{
    ItemRejection, ReviewItem, ReviewTarget, extract_contract_id, has_review_marker, is_approval,
    parse_review_items,
};
pub use promotion::{CuratorOutcome, CuratorUpdate, PromotionReport, promote_draft};
