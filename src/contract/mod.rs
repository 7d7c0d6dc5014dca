//! Contract documents and the fixed stage vocabulary.

pub mod model;
pub mod stage;

pub use model::{
    Account, ContractDraft, DocumentationItems, DraftProgress, FieldItems, IndexedItems, ItemIndex,
    StageRecord, TimeRecord,
};
pub use stage::{DIRECTOR_FIELD, FieldKind, FieldStage, FieldVocabulary, ListStage, Stage};
