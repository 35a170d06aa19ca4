//! Annotation records.
//!
//! Every mark an evaluator makes on a page is captured as one [`Annotation`]:
//! an append-only event with a kind, geometry, color, and page association.
//! Records never mutate; undo removes the newest record on a page. Raster
//! pixels composited for a record are a separate concern handled by the
//! overlay, which is why removing a stroke record does not un-draw its ink.

use serde::{Deserialize, Serialize};

/// Unique identifier for an annotation record, UUID v4.
pub type AnnotationId = uuid::Uuid;

/// Page-local coordinate in overlay pixel space: origin at the top-left of
/// the rendered page, x to the right, y downward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PagePoint {
    pub x: f32,
    pub y: f32,
}

impl PagePoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &PagePoint) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// RGBA color carried by each record and used for compositing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }
}

impl Color {
    pub const RED: Color = Color { r: 220, g: 38, b: 38, a: 255 };
    pub const GREEN: Color = Color { r: 22, g: 163, b: 74, a: 255 };
    pub const BLUE: Color = Color { r: 37, g: 99, b: 235, a: 255 };
    pub const ORANGE: Color = Color { r: 234, g: 138, b: 0, a: 255 };
    pub const YELLOW: Color = Color { r: 250, g: 204, b: 21, a: 255 };
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0, a: 255 };
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255, a: 255 };
}

/// The values a NUMBER stamp can carry. Grading practice allows fractional
/// credit of a quarter or half mark plus whole marks up to ten; keeping the
/// set closed means an out-of-range stamp value cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumberValue {
    Zero,
    Quarter,
    Half,
    One,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
}

impl NumberValue {
    pub const ALL: [NumberValue; 13] = [
        NumberValue::Zero,
        NumberValue::Quarter,
        NumberValue::Half,
        NumberValue::One,
        NumberValue::Two,
        NumberValue::Three,
        NumberValue::Four,
        NumberValue::Five,
        NumberValue::Six,
        NumberValue::Seven,
        NumberValue::Eight,
        NumberValue::Nine,
        NumberValue::Ten,
    ];

    pub fn as_f32(self) -> f32 {
        match self {
            Self::Zero => 0.0,
            Self::Quarter => 0.25,
            Self::Half => 0.5,
            Self::One => 1.0,
            Self::Two => 2.0,
            Self::Three => 3.0,
            Self::Four => 4.0,
            Self::Five => 5.0,
            Self::Six => 6.0,
            Self::Seven => 7.0,
            Self::Eight => 8.0,
            Self::Nine => 9.0,
            Self::Ten => 10.0,
        }
    }

    /// The text drawn inside the stamped badge.
    pub fn label(self) -> &'static str {
        match self {
            Self::Zero => "0",
            Self::Quarter => "\u{00bc}",
            Self::Half => "\u{00bd}",
            Self::One => "1",
            Self::Two => "2",
            Self::Three => "3",
            Self::Four => "4",
            Self::Five => "5",
            Self::Six => "6",
            Self::Seven => "7",
            Self::Eight => "8",
            Self::Nine => "9",
            Self::Ten => "10",
        }
    }

    pub fn from_f32(value: f32) -> Option<Self> {
        Self::ALL.iter().copied().find(|candidate| candidate.as_f32() == value)
    }
}

/// Kind and geometry of one recorded mark.
///
/// Point-stamped kinds carry the stamp center; path kinds carry the sampled
/// pointer path; `Underline` carries its two endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnnotationKind {
    Tick { at: PagePoint },
    Cross { at: PagePoint },
    Partial { at: PagePoint },
    Stroke { points: Vec<PagePoint>, width: f32 },
    Highlight { points: Vec<PagePoint>, width: f32 },
    Underline { from: PagePoint, to: PagePoint },
    Comment { at: PagePoint, text: String },
    NumberStamp { at: PagePoint, value: NumberValue },
}

impl AnnotationKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tick { .. } => "tick",
            Self::Cross { .. } => "cross",
            Self::Partial { .. } => "partial",
            Self::Stroke { .. } => "stroke",
            Self::Highlight { .. } => "highlight",
            Self::Underline { .. } => "underline",
            Self::Comment { .. } => "comment",
            Self::NumberStamp { .. } => "numberStamp",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: AnnotationId,
    /// 1-based page number the record belongs to.
    pub page_no: u32,
    pub kind: AnnotationKind,
    pub color: Color,
    /// Creation time, unix seconds.
    pub created_at: i64,
}

impl Annotation {
    pub fn new(page_no: u32, kind: AnnotationKind, color: Color) -> Self {
        Self {
            id: AnnotationId::new_v4(),
            page_no,
            kind,
            color,
            created_at: sheet_model::unix_time_now(),
        }
    }
}
