//! Pointer and touch input shapes.
//!
//! Drawing logic consumes only [`PointerEvent`]. Touch input from a tablet or
//! phone surface is translated through [`pointer_from_touch`] into the same
//! shape, so the engine never knows which input source produced an event.

use crate::annotation::PagePoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    /// Pointer left the page surface mid-gesture. Ends a path like `Up`.
    Leave,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub x: f32,
    pub y: f32,
    pub phase: PointerPhase,
}

impl PointerEvent {
    pub fn down(x: f32, y: f32) -> Self {
        Self { x, y, phase: PointerPhase::Down }
    }

    pub fn moved(x: f32, y: f32) -> Self {
        Self { x, y, phase: PointerPhase::Move }
    }

    pub fn up(x: f32, y: f32) -> Self {
        Self { x, y, phase: PointerPhase::Up }
    }

    pub fn leave(x: f32, y: f32) -> Self {
        Self { x, y, phase: PointerPhase::Leave }
    }

    pub fn point(&self) -> PagePoint {
        PagePoint::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchPhase {
    Started,
    Moved,
    Ended,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchEvent {
    pub x: f32,
    pub y: f32,
    pub phase: TouchPhase,
}

pub fn pointer_from_touch(touch: TouchEvent) -> PointerEvent {
    let phase = match touch.phase {
        TouchPhase::Started => PointerPhase::Down,
        TouchPhase::Moved => PointerPhase::Move,
        TouchPhase::Ended => PointerPhase::Up,
        TouchPhase::Cancelled => PointerPhase::Leave,
    };

    PointerEvent { x: touch.x, y: touch.y, phase }
}
