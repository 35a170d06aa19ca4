//! One grading sitting end to end: upload a sheet, annotate and award marks,
//! then settle the sheet with exactly one terminal decision.

use image::RgbaImage;
use raster_engine::PageRasterizer;
use sheet_model::{Marksheet, PaperDetails, StudentInfo};
use tracing::{debug, info};

use crate::annotation::{Annotation, Color, NumberValue, PagePoint};
use crate::engine::{AnnotationEngine, EngineConfig, EngineEvent, Tool};
use crate::input::{pointer_from_touch, PointerEvent, TouchEvent};
use crate::ledger::{AwardReceipt, LedgerError, QuestionSeed, ScoreLedger};
use crate::loader::{
    DocumentLoadError, DocumentLoader, LoaderConfig, UploadOutcome, UploadSource, UploadTicket,
};
use crate::marksheet::{FinishError, IncompleteGradingWarning, MarksheetBuilder};
use crate::page_store::{PageStore, PageStoreError};

/// How the sheet was settled. Starts as `None`; exactly one terminal
/// decision can ever be taken, after which grading mutations are refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Disposition {
    #[default]
    None,
    Rejected,
    Flagged,
    Finished,
}

impl Disposition {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Rejected => "rejected",
            Self::Flagged => "flagged",
            Self::Finished => "finished",
        }
    }
}

/// The single pending confirmation, if any. Destructive and terminal actions
/// all go through one of these before they take effect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Modal {
    TextEntry { at: PagePoint },
    ConfirmReject,
    ConfirmFlag,
    IncompleteOverride,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("sheet already marked {}", .disposition.as_str())]
    AlreadyDecided { disposition: Disposition },
    #[error("no confirmation is pending")]
    NothingPending,
    #[error(transparent)]
    Finish(#[from] FinishError),
    #[error(transparent)]
    Load(#[from] DocumentLoadError),
    #[error(transparent)]
    Pages(#[from] PageStoreError),
}

/// What one pointer event did, mirroring [`EngineEvent`] with the ledger
/// effect of a number stamp folded in.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerOutcome {
    Ignored,
    Drawing,
    Recorded,
    ScoreStamped(AwardReceipt),
    TextRequested { at: PagePoint },
}

#[derive(Debug, Clone)]
pub enum FinishCheck {
    Ready,
    Incomplete(IncompleteGradingWarning),
}

/// The grading facade: owns the loader, page store, annotation engine,
/// ledger, and disposition for one answer sheet.
pub struct GradingSession<R: PageRasterizer> {
    loader: DocumentLoader<R>,
    store: PageStore,
    engine: AnnotationEngine,
    ledger: ScoreLedger,
    builder: MarksheetBuilder,
    disposition: Disposition,
    modal: Option<Modal>,
}

impl<R: PageRasterizer> GradingSession<R> {
    pub fn new(
        rasterizer: R,
        seeds: Vec<QuestionSeed>,
        evaluated_by: impl Into<String>,
    ) -> Result<Self, LedgerError> {
        Self::with_configs(
            rasterizer,
            LoaderConfig::default(),
            EngineConfig::default(),
            seeds,
            evaluated_by,
        )
    }

    pub fn with_configs(
        rasterizer: R,
        loader_config: LoaderConfig,
        engine_config: EngineConfig,
        seeds: Vec<QuestionSeed>,
        evaluated_by: impl Into<String>,
    ) -> Result<Self, LedgerError> {
        Ok(Self {
            loader: DocumentLoader::with_config(rasterizer, loader_config),
            store: PageStore::new(),
            engine: AnnotationEngine::with_config(engine_config),
            ledger: ScoreLedger::from_seeds(seeds)?,
            builder: MarksheetBuilder::new(evaluated_by),
            disposition: Disposition::None,
            modal: None,
        })
    }

    // ---- upload ----

    pub fn begin_upload(&mut self) -> UploadTicket {
        self.loader.begin_upload()
    }

    /// Finishes an upload attempt. Returns true when the document was
    /// installed, false when a newer attempt superseded this one.
    pub fn complete_upload(
        &mut self,
        ticket: UploadTicket,
        sources: Vec<UploadSource>,
    ) -> Result<bool, SessionError> {
        self.ensure_open()?;
        match self.loader.load_batch(ticket, sources)? {
            UploadOutcome::Loaded(document) => {
                self.store.load(document);
                self.modal = None;
                Ok(true)
            }
            UploadOutcome::Superseded => Ok(false),
        }
    }

    /// Single-shot upload, for callers with no concurrent attempts. Returns
    /// the page count of the installed document.
    pub fn upload(&mut self, sources: Vec<UploadSource>) -> Result<u32, SessionError> {
        let ticket = self.begin_upload();
        self.complete_upload(ticket, sources)?;
        Ok(self.store.page_count())
    }

    // ---- annotation ----

    pub fn tool(&self) -> Tool {
        self.engine.tool()
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.engine.set_tool(tool);
    }

    pub fn set_color(&mut self, color: Color) {
        self.engine.set_color(color);
    }

    pub fn set_number_value(&mut self, value: NumberValue) {
        self.engine.set_number_value(value);
    }

    /// Routes a pointer event through the armed tool. With no page under the
    /// pointer, or after a terminal decision, or while a confirmation is
    /// pending, the event is dropped without an error.
    pub fn pointer(&mut self, event: PointerEvent) -> PointerOutcome {
        if self.disposition.is_terminal() || self.modal.is_some() {
            return PointerOutcome::Ignored;
        }
        let Some(page_no) = self.store.current_page() else {
            debug!("pointer ignored, no document loaded");
            return PointerOutcome::Ignored;
        };
        let Some(buffer) = self.store.buffer_mut() else {
            return PointerOutcome::Ignored;
        };

        match self.engine.handle_pointer(event, page_no, buffer) {
            EngineEvent::Idle => PointerOutcome::Ignored,
            EngineEvent::PathProgress => PointerOutcome::Drawing,
            EngineEvent::Committed => PointerOutcome::Recorded,
            EngineEvent::NumberStamped { value } => {
                let receipt = self.ledger.award_selected(value.as_f32());
                PointerOutcome::ScoreStamped(receipt)
            }
            EngineEvent::TextRequested { at } => {
                self.modal = Some(Modal::TextEntry { at });
                PointerOutcome::TextRequested { at }
            }
        }
    }

    /// Touch input, folded onto the pointer pipeline.
    pub fn touch(&mut self, event: TouchEvent) -> PointerOutcome {
        self.pointer(pointer_from_touch(event))
    }

    /// Commits the pending comment text. Returns true when a comment was
    /// recorded, false when the text was blank.
    pub fn confirm_text(&mut self, text: impl Into<String>) -> Result<bool, SessionError> {
        self.ensure_open()?;
        let Some(Modal::TextEntry { at }) = self.modal else {
            return Err(SessionError::NothingPending);
        };
        self.modal = None;

        let Some(page_no) = self.store.current_page() else {
            return Ok(false);
        };
        let Some(buffer) = self.store.buffer_mut() else {
            return Ok(false);
        };

        let event = self.engine.commit_comment(at, text, page_no, buffer);
        Ok(event == EngineEvent::Committed)
    }

    /// Dismisses whatever confirmation is pending. Returns true when one was.
    pub fn cancel_modal(&mut self) -> bool {
        self.modal.take().is_some()
    }

    /// Removes the newest record on the active page. Already-composited
    /// pixels stay on the overlay.
    pub fn undo(&mut self) -> Option<Annotation> {
        if self.disposition.is_terminal() {
            return None;
        }
        self.store.buffer_mut()?.undo_last()
    }

    pub fn clear_page(&mut self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.store.clear_current()?;
        Ok(())
    }

    pub fn clear_all_pages(&mut self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.store.clear_all()?;
        Ok(())
    }

    // ---- ledger ----

    pub fn ledger(&self) -> &ScoreLedger {
        &self.ledger
    }

    /// Moves the ledger cursor. Selection is view state, so it stays allowed
    /// even on a decided sheet, and it never changes awarded marks.
    pub fn select_question(&mut self, index: usize) -> bool {
        self.ledger.select(index)
    }

    /// Manual marks entry: the same clamp and cursor advance as stamping a
    /// number badge, without touching the page.
    pub fn enter_marks(&mut self, value: f32) -> Option<AwardReceipt> {
        if self.disposition.is_terminal() {
            return None;
        }
        Some(self.ledger.award_selected(value))
    }

    // ---- disposition ----

    pub fn disposition(&self) -> Disposition {
        self.disposition
    }

    pub fn modal(&self) -> Option<Modal> {
        self.modal
    }

    /// First step of finishing. A fully marked ledger is ready to confirm;
    /// otherwise the warning is returned and an override confirmation opens.
    pub fn request_finish(&mut self) -> Result<FinishCheck, SessionError> {
        self.ensure_open()?;
        match MarksheetBuilder::check_complete(&self.ledger) {
            Ok(()) => Ok(FinishCheck::Ready),
            Err(warning) => {
                self.modal = Some(Modal::IncompleteOverride);
                Ok(FinishCheck::Incomplete(warning))
            }
        }
    }

    /// Second step of finishing. `acknowledge_incomplete` carries the
    /// override for unmarked questions, which are scored zero.
    pub fn confirm_finish(
        &mut self,
        student: &StudentInfo,
        paper: &PaperDetails,
        acknowledge_incomplete: bool,
    ) -> Result<Marksheet, SessionError> {
        self.ensure_open()?;
        let sheet = self.builder.build(&self.ledger, student, paper, acknowledge_incomplete)?;

        self.disposition = Disposition::Finished;
        self.modal = None;
        info!(sheet = %sheet.id, "sheet finished");
        Ok(sheet)
    }

    pub fn request_reject(&mut self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.modal = Some(Modal::ConfirmReject);
        Ok(())
    }

    pub fn request_flag(&mut self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.modal = Some(Modal::ConfirmFlag);
        Ok(())
    }

    /// Second step of a reject or flag. The matching request must still be
    /// pending.
    pub fn confirm_disposition(&mut self) -> Result<Disposition, SessionError> {
        self.ensure_open()?;
        let decided = match self.modal {
            Some(Modal::ConfirmReject) => Disposition::Rejected,
            Some(Modal::ConfirmFlag) => Disposition::Flagged,
            _ => return Err(SessionError::NothingPending),
        };

        self.disposition = decided;
        self.modal = None;
        info!(disposition = decided.as_str(), "sheet decided");
        Ok(decided)
    }

    // ---- pages ----

    pub fn page_count(&self) -> u32 {
        self.store.page_count()
    }

    pub fn current_page(&self) -> Option<u32> {
        self.store.current_page()
    }

    pub fn visited(&self, page_no: u32) -> bool {
        self.store.visited(page_no)
    }

    pub fn switch_page(&mut self, page_no: u32) -> Result<(), SessionError> {
        Ok(self.store.switch_to(page_no)?)
    }

    pub fn next_page(&mut self) -> Result<bool, SessionError> {
        Ok(self.store.next_page()?)
    }

    pub fn prev_page(&mut self) -> Result<bool, SessionError> {
        Ok(self.store.prev_page()?)
    }

    pub fn current_records(&self) -> &[Annotation] {
        self.store.buffer().map(|buffer| buffer.records()).unwrap_or(&[])
    }

    pub fn composited_current(&self) -> Option<RgbaImage> {
        self.store.composited_current()
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.disposition.is_terminal() {
            return Err(SessionError::AlreadyDecided { disposition: self.disposition });
        }
        Ok(())
    }
}
