//! Turns a graded ledger plus student and paper details into a finalized
//! [`Marksheet`], enforcing the completeness and validation gates.

use sheet_model::{
    EvaluationRow, Grade, Marksheet, PaperDetails, StudentInfo, ValidationError,
};
use tracing::info;
use uuid::Uuid;

use crate::ledger::ScoreLedger;

/// Raised when finalization starts with unmarked questions. The caller may
/// surface it and retry with an explicit acknowledgement, which scores the
/// listed questions as zero.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{unmarked_count} unmarked question(s): {}", .unmarked_labels.join(", "))]
pub struct IncompleteGradingWarning {
    pub unmarked_count: usize,
    pub unmarked_labels: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum FinishError {
    #[error(transparent)]
    Incomplete(#[from] IncompleteGradingWarning),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Clone)]
pub struct MarksheetBuilder {
    evaluated_by: String,
}

impl MarksheetBuilder {
    pub fn new(evaluated_by: impl Into<String>) -> Self {
        Self { evaluated_by: evaluated_by.into() }
    }

    pub fn anonymous() -> Self {
        Self::new("anonymous")
    }

    pub fn check_complete(ledger: &ScoreLedger) -> Result<(), IncompleteGradingWarning> {
        let unmarked_labels = ledger.unmarked_labels();
        if unmarked_labels.is_empty() {
            return Ok(());
        }
        Err(IncompleteGradingWarning { unmarked_count: unmarked_labels.len(), unmarked_labels })
    }

    /// Builds the final marksheet. Unless `allow_incomplete` acknowledges the
    /// warning, every question must be marked; student and paper details are
    /// validated field by field before anything is computed.
    pub fn build(
        &self,
        ledger: &ScoreLedger,
        student: &StudentInfo,
        paper: &PaperDetails,
        allow_incomplete: bool,
    ) -> Result<Marksheet, FinishError> {
        if !allow_incomplete {
            Self::check_complete(ledger)?;
        }
        student.validate()?;
        paper.validate()?;

        let evaluation: Vec<EvaluationRow> = ledger
            .questions()
            .iter()
            .enumerate()
            .map(|(index, question)| EvaluationRow {
                question_no: index as u32 + 1,
                max_marks: question.max_marks(),
                awarded_marks: question.awarded().unwrap_or(0.0),
            })
            .collect();

        let total_max_marks = ledger.total_max_marks();
        let total_obtained_marks = ledger.total_obtained_marks();
        let percentage = sheet_model::percentage(total_obtained_marks, total_max_marks);
        let grade = Grade::from_percentage(percentage);

        info!(roll_no = %student.roll_no, percentage, grade = %grade, "marksheet finalized");
        Ok(Marksheet {
            id: Uuid::new_v4(),
            student: student.clone(),
            paper: paper.clone(),
            evaluation,
            total_max_marks,
            total_obtained_marks,
            percentage,
            grade,
            evaluated_by: self.evaluated_by.clone(),
            evaluated_at: sheet_model::unix_time_now(),
        })
    }
}
