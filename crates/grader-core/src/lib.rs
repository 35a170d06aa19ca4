//! Grading Engine Core Library
//!
//! Annotation, scoring, and session state for grading scanned answer sheets.

pub mod annotation;
pub mod document;
pub mod engine;
pub mod input;
pub mod ledger;
pub mod loader;
pub mod marksheet;
pub mod overlay;
pub mod page_store;
pub mod session;

#[cfg(test)]
mod testkit;

pub use annotation::{
    Annotation, AnnotationId, AnnotationKind, Color, NumberValue, PagePoint,
};
pub use document::{Document, Page};
pub use engine::{AnnotationEngine, EngineConfig, EngineEvent, Tool};
pub use input::{pointer_from_touch, PointerEvent, PointerPhase, TouchEvent, TouchPhase};
pub use ledger::{AwardReceipt, LedgerError, Question, QuestionSeed, ScoreLedger};
pub use loader::{
    DocumentLoadError, DocumentLoader, LoaderConfig, UploadOutcome, UploadSource, UploadTicket,
};
pub use marksheet::{FinishError, IncompleteGradingWarning, MarksheetBuilder};
pub use overlay::{composite, Overlay};
pub use page_store::{PageBuffer, PageSnapshot, PageStore, PageStoreError};
pub use session::{
    Disposition, FinishCheck, GradingSession, Modal, PointerOutcome, SessionError,
};
