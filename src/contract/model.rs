//! Contract draft, live contract, and account documents.
//!
//! Documents are stored as JSON. Fields this crate does not know about are
//! kept in the flattened `extra` maps so a replace-by-key write never drops
//! data owned by the authoring flow.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use super::stage::{FieldStage, ListStage, Stage};

/// Numeric position of an entry in an indexed list (rewards, directors, ...).
///
/// Serialized as a text key (`"0"`, `"1"`, ...) to match the stored shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemIndex(pub u32);

impl fmt::Display for ItemIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for ItemIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ItemIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IndexVisitor;

        impl Visitor<'_> for IndexVisitor {
            type Value = ItemIndex;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative list index")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ItemIndex, E> {
                v.parse().map(ItemIndex).map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<ItemIndex, E> {
                u32::try_from(v).map(ItemIndex).map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<ItemIndex, E> {
                u32::try_from(v).map(ItemIndex).map_err(E::custom)
            }
        }

        // Keys arrive as strings from JSON maps but may be buffered
        // (flatten) before reaching us, so accept any representation.
        deserializer.deserialize_any(IndexVisitor)
    }
}

/// Review items of a stage keyed by two-letter field code.
pub type FieldItems = BTreeMap<String, String>;

/// Review items of a list stage keyed by entry index.
pub type IndexedItems = BTreeMap<ItemIndex, String>;

/// Review items of the documentation stage.
///
/// Company documents are keyed by field code; director documents live in a
/// nested map under `dd`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentationItems {
    #[serde(rename = "dd", default, deserialize_with = "null_as_default")]
    pub directors: IndexedItems,
    #[serde(flatten)]
    pub fields: FieldItems,
}

/// One entry of `draft_progress`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageRecord<T> {
    #[serde(default)]
    pub has_unread_reviews: bool,
    #[serde(default)]
    pub review_items: T,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl<T> StageRecord<T> {
    pub fn mark_unread(&mut self) {
        self.has_unread_reviews = true;
    }
}

/// The seven stages of a draft, each with its own review-item shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DraftProgress {
    #[serde(default)]
    pub basic: StageRecord<FieldItems>,
    #[serde(default)]
    pub story: StageRecord<FieldItems>,
    #[serde(default)]
    pub finances: StageRecord<FieldItems>,
    #[serde(default)]
    pub rewards: StageRecord<IndexedItems>,
    #[serde(default)]
    pub curators: StageRecord<IndexedItems>,
    #[serde(default)]
    pub milestones: StageRecord<IndexedItems>,
    #[serde(default)]
    pub documentation: StageRecord<DocumentationItems>,
}

impl DraftProgress {
    pub fn fields_mut(&mut self, stage: FieldStage) -> &mut StageRecord<FieldItems> {
        match stage {
            FieldStage::Basic => &mut self.basic,
            FieldStage::Story => &mut self.story,
            FieldStage::Finances => &mut self.finances,
        }
    }

    pub fn entries_mut(&mut self, stage: ListStage) -> &mut StageRecord<IndexedItems> {
        match stage {
            ListStage::Rewards => &mut self.rewards,
            ListStage::Curators => &mut self.curators,
            ListStage::Milestones => &mut self.milestones,
        }
    }

    /// Whether a stage has reviews the author has not read yet.
    pub fn has_unread_reviews(&self, stage: Stage) -> bool {
        match stage {
            Stage::Basic => self.basic.has_unread_reviews,
            Stage::Story => self.story.has_unread_reviews,
            Stage::Finances => self.finances.has_unread_reviews,
            Stage::Rewards => self.rewards.has_unread_reviews,
            Stage::Curators => self.curators.has_unread_reviews,
            Stage::Milestones => self.milestones.has_unread_reviews,
            Stage::Documentation => self.documentation.has_unread_reviews,
        }
    }
}

/// Timestamp record written into `approval_date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRecord {
    /// Unix seconds.
    pub timestamp: i64,
    /// `YYYY-MM-DD`, UTC.
    pub date: String,
    /// `HH:MM:SS`, UTC.
    pub time: String,
}

impl TimeRecord {
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self {
            timestamp: at.timestamp(),
            date: at.format("%Y-%m-%d").to_string(),
            time: at.format("%H:%M:%S").to_string(),
        }
    }
}

/// A contract document, either in the drafts or in the live collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractDraft {
    /// Contract id. Never written by review items.
    pub key: String,
    #[serde(default)]
    pub name: String,
    /// Primary curator's email address.
    #[serde(default)]
    pub curator: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub other_curators: Vec<String>,
    #[serde(default)]
    pub is_approved: bool,
    #[serde(default)]
    pub approval_date: Option<TimeRecord>,
    #[serde(default)]
    pub draft_progress: DraftProgress,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContractDraft {
    pub fn new(key: &str, name: &str, curator: &str) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            curator: curator.to_string(),
            other_curators: Vec::new(),
            is_approved: false,
            approval_date: None,
            draft_progress: DraftProgress::default(),
            extra: Map::new(),
        }
    }

    pub fn with_other_curators<I, S>(mut self, curators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.other_curators = curators.into_iter().map(Into::into).collect();
        self
    }

    /// Mark the contract approved at the given time.
    pub fn approve(&mut self, at: TimeRecord) {
        self.is_approved = true;
        self.approval_date = Some(at);
    }

    /// Primary curator first, then the featured curators in order.
    pub fn curators(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.curator.as_str()).chain(self.other_curators.iter().map(String::as_str))
    }
}

/// A user account that may own or feature contracts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub email_address: String,
    /// Contracts owned as primary curator.
    #[serde(default, deserialize_with = "null_as_default")]
    pub contracts: Vec<String>,
    /// Contracts featured as a secondary curator. Absent until first use.
    #[serde(default)]
    pub contracts_featured: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Account {
    pub fn new(email_address: &str) -> Self {
        Self {
            email_address: email_address.to_string(),
            contracts: Vec::new(),
            contracts_featured: None,
            extra: Map::new(),
        }
    }

    /// Record ownership of a contract. Returns `false` if already recorded.
    pub fn add_owned(&mut self, contract: &str) -> bool {
        push_unique(&mut self.contracts, contract)
    }

    /// Record a featured contract. Returns `false` if already recorded.
    pub fn add_featured(&mut self, contract: &str) -> bool {
        push_unique(self.contracts_featured.get_or_insert_with(Vec::new), contract)
    }
}

fn push_unique(list: &mut Vec<String>, item: &str) -> bool {
    if list.iter().any(|c| c == item) {
        return false;
    }
    list.push(item.to_string());
    true
}

/// Treat an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_json() -> Value {
        serde_json::json!({
            "_id": "64f0c0ffee",
            "key": "C123",
            "name": "Solar Farm",
            "curator": "a@x.com",
            "other_curators": ["b@x.com"],
            "is_approved": false,
            "approval_date": null,
            "hatching_goal": 5000,
            "draft_progress": {
                "basic": { "has_unread_reviews": false, "review_items": { "ct": "Shorter." } },
                "story": { "has_unread_reviews": false, "review_items": {} },
                "finances": { "has_unread_reviews": false, "review_items": {} },
                "rewards": { "has_unread_reviews": true, "review_items": { "0": "Cheaper.", "10": "Later." } },
                "curators": { "has_unread_reviews": false, "review_items": {} },
                "milestones": { "has_unread_reviews": false, "review_items": {}, "is_complete": true },
                "documentation": {
                    "has_unread_reviews": false,
                    "review_items": { "cr": "Expired.", "dd": { "1": "Blurry scan." } }
                }
            }
        })
    }

    #[test]
    fn deserializes_stored_document() {
        let draft: ContractDraft = serde_json::from_value(sample_json()).unwrap();
        assert_eq!(draft.key, "C123");
        assert_eq!(draft.other_curators, vec!["b@x.com"]);
        assert_eq!(draft.draft_progress.basic.review_items["ct"], "Shorter.");
        assert_eq!(
            draft.draft_progress.rewards.review_items[&ItemIndex(10)],
            "Later."
        );
        assert!(draft.draft_progress.has_unread_reviews(Stage::Rewards));
        let docs = &draft.draft_progress.documentation.review_items;
        assert_eq!(docs.fields["cr"], "Expired.");
        assert_eq!(docs.directors[&ItemIndex(1)], "Blurry scan.");
        assert!(!docs.fields.contains_key("dd"));
    }

    #[test]
    fn unknown_fields_survive_roundtrip() {
        let draft: ContractDraft = serde_json::from_value(sample_json()).unwrap();
        let value = serde_json::to_value(&draft).unwrap();
        assert_eq!(value["_id"], "64f0c0ffee");
        assert_eq!(value["hatching_goal"], 5000);
        assert_eq!(value["draft_progress"]["milestones"]["is_complete"], true);
        assert_eq!(value["draft_progress"]["rewards"]["review_items"]["10"], "Later.");
        assert_eq!(
            value["draft_progress"]["documentation"]["review_items"]["dd"]["1"],
            "Blurry scan."
        );
    }

    #[test]
    fn missing_progress_defaults_to_empty_stages() {
        let draft: ContractDraft = serde_json::from_value(serde_json::json!({
            "key": "C9",
            "other_curators": null
        }))
        .unwrap();
        assert!(draft.other_curators.is_empty());
        assert_eq!(draft.draft_progress, DraftProgress::default());
    }

    #[test]
    fn approve_sets_flag_and_date() {
        let mut draft = ContractDraft::new("C1", "Name", "a@x.com");
        let at = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        draft.approve(TimeRecord::from_datetime(at));
        assert!(draft.is_approved);
        let date = draft.approval_date.unwrap();
        assert_eq!(date.date, "2026-03-04");
        assert_eq!(date.time, "05:06:07");
        assert_eq!(date.timestamp, at.timestamp());
    }

    #[test]
    fn curators_primary_first() {
        let draft = ContractDraft::new("C1", "Name", "a@x.com").with_other_curators(["b@x.com", "c@x.com"]);
        assert_eq!(
            draft.curators().collect::<Vec<_>>(),
            ["a@x.com", "b@x.com", "c@x.com"]
        );
    }

    #[test]
    fn account_appends_are_idempotent() {
        let mut account = Account::new("b@x.com");
        assert!(account.contracts_featured.is_none());
        assert!(account.add_featured("C1"));
        assert!(!account.add_featured("C1"));
        assert_eq!(account.contracts_featured, Some(vec!["C1".to_string()]));
        assert!(account.add_owned("C1"));
        assert!(!account.add_owned("C1"));
        assert_eq!(account.contracts, vec!["C1"]);
    }

    #[test]
    fn account_null_featured_list() {
        let account: Account = serde_json::from_value(serde_json::json!({
            "email_address": "b@x.com",
            "contracts": [],
            "contracts_featured": null,
            "display_name": "Bee"
        }))
        .unwrap();
        assert!(account.contracts_featured.is_none());
        assert_eq!(account.extra["display_name"], "Bee");
    }
}
