//! The question ledger: one row per question, a selection cursor, and the
//! award bookkeeping that number stamps and manual entry both feed.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Declares one question before grading starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSeed {
    /// Row identity from the seeding workflow; generated when absent.
    pub id: Option<String>,
    pub label: String,
    pub max_marks: f32,
}

impl QuestionSeed {
    pub fn new(label: impl Into<String>, max_marks: f32) -> Self {
        Self { id: None, label: label.into(), max_marks }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("a ledger needs at least one question")]
    Empty,
    #[error("question {label:?} has a non-positive maximum")]
    InvalidMaxMarks { label: String },
}

#[derive(Debug, Clone)]
pub struct Question {
    id: String,
    label: String,
    max_marks: f32,
    awarded: Option<f32>,
}

impl Question {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn max_marks(&self) -> f32 {
        self.max_marks
    }

    /// `None` until the question has been marked at least once.
    pub fn awarded(&self) -> Option<f32> {
        self.awarded
    }

    pub fn is_marked(&self) -> bool {
        self.awarded.is_some()
    }
}

/// What one award did: which row it marked and where the cursor moved.
/// `question_no` and `advanced_to` are 1-based, matching the row labels.
#[derive(Debug, Clone, PartialEq)]
pub struct AwardReceipt {
    pub question_no: u32,
    pub label: String,
    pub awarded: f32,
    pub max_marks: f32,
    pub advanced_to: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ScoreLedger {
    questions: Vec<Question>,
    selected: usize,
}

impl ScoreLedger {
    pub fn from_seeds(seeds: Vec<QuestionSeed>) -> Result<Self, LedgerError> {
        if seeds.is_empty() {
            return Err(LedgerError::Empty);
        }

        let mut questions = Vec::with_capacity(seeds.len());
        for seed in seeds {
            if !(seed.max_marks > 0.0) {
                return Err(LedgerError::InvalidMaxMarks { label: seed.label });
            }
            questions.push(Question {
                id: seed.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
                label: seed.label,
                max_marks: seed.max_marks,
                awarded: None,
            });
        }

        Ok(Self { questions, selected: 0 })
    }

    /// Convenience for papers where every question carries the same maximum:
    /// rows labelled `Q1` through `Qn`.
    pub fn uniform(count: u32, max_marks: f32) -> Result<Self, LedgerError> {
        let seeds =
            (1..=count).map(|n| QuestionSeed::new(format!("Q{n}"), max_marks)).collect();
        Self::from_seeds(seeds)
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// 0-based row index of the cursor.
    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected_question(&self) -> &Question {
        &self.questions[self.selected]
    }

    /// Moves the cursor only. Awarded marks are untouched, so clicking around
    /// the ledger can never change a score. Returns false when `index` is out
    /// of range.
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.questions.len() {
            return false;
        }
        self.selected = index;
        true
    }

    /// Awards `value` to the selected question, clamped to `[0, max_marks]`,
    /// then advances the cursor unless it already sits on the last row.
    /// Re-awarding a marked question overwrites its previous marks.
    pub fn award_selected(&mut self, value: f32) -> AwardReceipt {
        let index = self.selected;
        let question = &mut self.questions[index];

        // NaN from a free-form entry field awards zero.
        let awarded =
            if value.is_finite() { value.clamp(0.0, question.max_marks) } else { 0.0 };
        question.awarded = Some(awarded);

        let receipt_label = question.label.clone();
        let max_marks = question.max_marks;
        let advanced_to = if index + 1 < self.questions.len() {
            self.selected = index + 1;
            Some(self.selected as u32 + 1)
        } else {
            None
        };

        debug!(question = %receipt_label, awarded, "marks awarded");
        AwardReceipt {
            question_no: index as u32 + 1,
            label: receipt_label,
            awarded,
            max_marks,
            advanced_to,
        }
    }

    pub fn total_max_marks(&self) -> f32 {
        self.questions.iter().map(Question::max_marks).sum()
    }

    pub fn total_obtained_marks(&self) -> f32 {
        self.questions.iter().filter_map(Question::awarded).sum()
    }

    pub fn unmarked_labels(&self) -> Vec<String> {
        self.questions
            .iter()
            .filter(|question| !question.is_marked())
            .map(|question| question.label.clone())
            .collect()
    }

    pub fn unmarked_count(&self) -> usize {
        self.questions.iter().filter(|question| !question.is_marked()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.questions.iter().all(Question::is_marked)
    }
}
