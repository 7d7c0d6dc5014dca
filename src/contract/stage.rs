//! Draft stages and the field-code vocabulary.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the seven fixed sections of a contract draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Basic,
    Story,
    Finances,
    Rewards,
    Curators,
    Milestones,
    Documentation,
}

impl Stage {
    /// All stages in digit order.
    pub const ALL: [Stage; 7] = [
        Stage::Basic,
        Stage::Story,
        Stage::Finances,
        Stage::Rewards,
        Stage::Curators,
        Stage::Milestones,
        Stage::Documentation,
    ];

    /// Resolve the textual stage code used in annotations (`"0"`..`"6"`).
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "0" => Some(Stage::Basic),
            "1" => Some(Stage::Story),
            "2" => Some(Stage::Finances),
            "3" => Some(Stage::Rewards),
            "4" => Some(Stage::Curators),
            "5" => Some(Stage::Milestones),
            "6" => Some(Stage::Documentation),
            _ => None,
        }
    }

    pub fn code(self) -> char {
        match self {
            Stage::Basic => '0',
            Stage::Story => '1',
            Stage::Finances => '2',
            Stage::Rewards => '3',
            Stage::Curators => '4',
            Stage::Milestones => '5',
            Stage::Documentation => '6',
        }
    }

    /// Document key of the stage inside `draft_progress`.
    pub fn name(self) -> &'static str {
        match self {
            Stage::Basic => "basic",
            Stage::Story => "story",
            Stage::Finances => "finances",
            Stage::Rewards => "rewards",
            Stage::Curators => "curators",
            Stage::Milestones => "milestones",
            Stage::Documentation => "documentation",
        }
    }

    /// Whether every entry of this stage is addressed by numeric index.
    pub fn is_list(self) -> bool {
        matches!(self, Stage::Rewards | Stage::Curators | Stage::Milestones)
    }

    pub fn as_field_stage(self) -> Option<FieldStage> {
        match self {
            Stage::Basic => Some(FieldStage::Basic),
            Stage::Story => Some(FieldStage::Story),
            Stage::Finances => Some(FieldStage::Finances),
            _ => None,
        }
    }

    pub fn as_list_stage(self) -> Option<ListStage> {
        match self {
            Stage::Rewards => Some(ListStage::Rewards),
            Stage::Curators => Some(ListStage::Curators),
            Stage::Milestones => Some(ListStage::Milestones),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stages whose review items are keyed by field code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldStage {
    Basic,
    Story,
    Finances,
}

/// Stages whose review items are keyed by list index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListStage {
    Rewards,
    Curators,
    Milestones,
}

impl From<FieldStage> for Stage {
    fn from(stage: FieldStage) -> Self {
        match stage {
            FieldStage::Basic => Stage::Basic,
            FieldStage::Story => Stage::Story,
            FieldStage::Finances => Stage::Finances,
        }
    }
}

impl From<ListStage> for Stage {
    fn from(stage: ListStage) -> Self {
        match stage {
            ListStage::Rewards => Stage::Rewards,
            ListStage::Curators => Stage::Curators,
            ListStage::Milestones => Stage::Milestones,
        }
    }
}

/// Field code of the director documents list under `documentation`.
pub const DIRECTOR_FIELD: &str = "dd";

/// How a field code addresses its slot in a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// One text value per field code.
    Scalar,
    /// One text value per numeric index.
    Indexed,
}

/// The set of field codes each stage accepts.
///
/// The defaults mirror the contract authoring form; integrating applications
/// can register extra codes with [`FieldVocabulary::with_field`].
#[derive(Debug, Clone)]
pub struct FieldVocabulary {
    fields: BTreeMap<Stage, BTreeMap<String, FieldKind>>,
}

impl FieldVocabulary {
    /// A vocabulary with no field codes at all.
    pub fn empty() -> Self {
        Self {
            fields: BTreeMap::new(),
        }
    }

    /// Register a field code for a stage.
    ///
    /// Codes in list stages are indexed, as is the director field under
    /// documentation; every other code holds a single value.
    pub fn with_field(mut self, stage: Stage, code: &str) -> Self {
        let kind = if stage.is_list() || (stage == Stage::Documentation && code == DIRECTOR_FIELD) {
            FieldKind::Indexed
        } else {
            FieldKind::Scalar
        };
        self.fields
            .entry(stage)
            .or_default()
            .insert(code.to_string(), kind);
        self
    }

    /// Look up how `code` is addressed within `stage`, if it is known.
    pub fn kind(&self, stage: Stage, code: &str) -> Option<FieldKind> {
        self.fields.get(&stage).and_then(|f| f.get(code)).copied()
    }
}

impl Default for FieldVocabulary {
    fn default() -> Self {
        let fields: [(Stage, &[&str]); 7] = [
            (Stage::Basic, &["ct", "cb", "fp", "pc", "sc", "co", "po", "cl", "pv"]),
            (Stage::Story, &["st"]),
            (Stage::Finances, &["hg", "cp"]),
            (Stage::Rewards, &["re"]),
            (Stage::Curators, &["cu"]),
            (Stage::Milestones, &["mi"]),
            (Stage::Documentation, &["cr", "pa", "pb", "tc", DIRECTOR_FIELD]),
        ];
        fields
            .into_iter()
            .fold(Self::empty(), |vocab, (stage, codes)| {
                codes.iter().fold(vocab, |vocab, code| vocab.with_field(stage, code))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_codes_roundtrip() {
        for stage in Stage::ALL {
            let code = stage.code().to_string();
            assert_eq!(Stage::from_code(&code), Some(stage));
        }
    }

    #[test]
    fn unknown_stage_codes() {
        assert_eq!(Stage::from_code("7"), None);
        assert_eq!(Stage::from_code("01"), None);
        assert_eq!(Stage::from_code(""), None);
    }

    #[test]
    fn stage_names_match_document_keys() {
        let names: Vec<_> = Stage::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            [
                "basic",
                "story",
                "finances",
                "rewards",
                "curators",
                "milestones",
                "documentation"
            ]
        );
    }

    #[test]
    fn stage_partitions() {
        for stage in Stage::ALL {
            let partitions = [
                stage.as_field_stage().is_some(),
                stage.as_list_stage().is_some(),
                stage == Stage::Documentation,
            ];
            assert_eq!(partitions.iter().filter(|p| **p).count(), 1, "{stage}");
        }
        assert_eq!(Stage::from(ListStage::Curators), Stage::Curators);
        assert_eq!(Stage::from(FieldStage::Finances), Stage::Finances);
    }

    #[test]
    fn default_vocabulary() {
        let vocab = FieldVocabulary::default();
        assert_eq!(vocab.kind(Stage::Basic, "ct"), Some(FieldKind::Scalar));
        assert_eq!(vocab.kind(Stage::Story, "st"), Some(FieldKind::Scalar));
        assert_eq!(vocab.kind(Stage::Rewards, "re"), Some(FieldKind::Indexed));
        assert_eq!(
            vocab.kind(Stage::Documentation, DIRECTOR_FIELD),
            Some(FieldKind::Indexed)
        );
        assert_eq!(vocab.kind(Stage::Documentation, "cr"), Some(FieldKind::Scalar));
        // Codes are per stage.
        assert_eq!(vocab.kind(Stage::Story, "ct"), None);
        assert_eq!(vocab.kind(Stage::Basic, "CT"), None);
    }

    #[test]
    fn field_kind_follows_stage() {
        let vocab = FieldVocabulary::empty()
            .with_field(Stage::Milestones, "ms")
            .with_field(Stage::Basic, "dd")
            .with_field(Stage::Documentation, "id");
        assert_eq!(vocab.kind(Stage::Milestones, "ms"), Some(FieldKind::Indexed));
        assert_eq!(vocab.kind(Stage::Basic, "dd"), Some(FieldKind::Scalar));
        assert_eq!(vocab.kind(Stage::Documentation, "id"), Some(FieldKind::Scalar));
    }

    #[test]
    fn codes_are_scoped_to_their_stage() {
        let vocab = FieldVocabulary::default();
        assert!(vocab.kind(Stage::Finances, "cp").is_some());
        assert!(vocab.kind(Stage::Finances, "hg").is_some());
        assert!(vocab.kind(Stage::Basic, "hg").is_none());
        assert!(FieldVocabulary::empty().kind(Stage::Finances, "cp").is_none());
    }
}
