use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentInfo {
    pub name: String,
    pub roll_no: String,
    pub class_name: Option<String>,
}

impl StudentInfo {
    pub fn new(name: impl Into<String>, roll_no: impl Into<String>) -> Self {
        Self { name: name.into(), roll_no: roll_no.into(), class_name: None }
    }

    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "student name" });
        }
        if self.roll_no.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "roll number" });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperDetails {
    pub title: String,
    pub subject: Option<String>,
}

impl PaperDetails {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), subject: None }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "paper name" });
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("required field `{field}` is empty")]
    MissingField { field: &'static str },
}

impl ValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            Self::MissingField { field } => field,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRow {
    pub question_no: u32,
    pub max_marks: f32,
    pub awarded_marks: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    #[serde(rename = "B+")]
    BPlus,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_percentage(percentage: f32) -> Self {
        match percentage {
            p if p >= 90.0 => Self::APlus,
            p if p >= 80.0 => Self::A,
            p if p >= 70.0 => Self::BPlus,
            p if p >= 60.0 => Self::B,
            p if p >= 50.0 => Self::C,
            p if p >= 40.0 => Self::D,
            _ => Self::F,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::APlus => "A+",
            Self::A => "A",
            Self::BPlus => "B+",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn percentage(obtained: f32, max: f32) -> f32 {
    if max <= 0.0 {
        return 0.0;
    }

    obtained / max * 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marksheet {
    pub id: Uuid,
    pub student: StudentInfo,
    pub paper: PaperDetails,
    pub evaluation: Vec<EvaluationRow>,
    pub total_max_marks: f32,
    pub total_obtained_marks: f32,
    pub percentage: f32,
    pub grade: Grade,
    pub evaluated_by: String,
    pub evaluated_at: i64,
}

impl Marksheet {
    pub fn question_count(&self) -> usize {
        self.evaluation.len()
    }
}

pub fn unix_time_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}
