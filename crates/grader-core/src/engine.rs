//! The annotation tool state machine: one armed tool, one in-flight drag,
//! and the drawing plus record-keeping each pointer gesture produces.

use ab_glyph::FontVec;
use tracing::debug;

use crate::annotation::{Annotation, AnnotationKind, Color, NumberValue, PagePoint};
use crate::input::{PointerEvent, PointerPhase};
use crate::overlay;
use crate::page_store::PageBuffer;

/// Active annotation tool. Exactly one is armed at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Select,
    Pen,
    Eraser,
    Highlight,
    Underline,
    Tick,
    Cross,
    Partial,
    Comment,
    Number,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub pen_width: f32,
    pub eraser_width: f32,
    pub highlight_width: f32,
    pub highlight_alpha: u8,
    pub underline_width: f32,
    pub stamp_size: f32,
    pub badge_radius: f32,
    pub tick_color: Color,
    pub cross_color: Color,
    pub partial_color: Color,
    pub comment_color: Color,
    pub highlight_color: Color,
    pub badge_color: Color,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pen_width: 3.0,
            eraser_width: 18.0,
            highlight_width: 14.0,
            highlight_alpha: 110,
            underline_width: 3.0,
            stamp_size: 28.0,
            badge_radius: 16.0,
            tick_color: Color::GREEN,
            cross_color: Color::RED,
            partial_color: Color::ORANGE,
            comment_color: Color::BLUE,
            highlight_color: Color::YELLOW,
            badge_color: Color::RED,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pen_width(mut self, width: f32) -> Self {
        self.pen_width = width;
        self
    }

    pub fn with_eraser_width(mut self, width: f32) -> Self {
        self.eraser_width = width;
        self
    }

    pub fn with_highlight_width(mut self, width: f32) -> Self {
        self.highlight_width = width;
        self
    }

    pub fn with_stamp_size(mut self, size: f32) -> Self {
        self.stamp_size = size;
        self
    }

    pub fn with_badge_radius(mut self, radius: f32) -> Self {
        self.badge_radius = radius;
        self
    }
}

#[derive(Debug, Clone)]
enum DragState {
    Idle,
    Path { points: Vec<PagePoint> },
    Line { from: PagePoint, to: PagePoint },
}

/// What a pointer event did, so callers know whether to refresh the view,
/// open a text prompt, or forward an awarded value to the ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Nothing happened (SELECT tool, stray move, unarmed number stamp).
    Idle,
    /// A drag is in flight; path tools have composited up to this point.
    PathProgress,
    /// A finished gesture put ink and a record on the page.
    Committed,
    /// A number badge was stamped; the value should be awarded.
    NumberStamped { value: NumberValue },
    /// The comment tool wants text for this spot.
    TextRequested { at: PagePoint },
}

/// Translates pointer gestures into overlay ink and annotation records,
/// dispatching on the armed [`Tool`].
pub struct AnnotationEngine {
    tool: Tool,
    color: Color,
    number_value: Option<NumberValue>,
    config: EngineConfig,
    drag: DragState,
    font: Option<FontVec>,
}

impl Default for AnnotationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnotationEngine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            tool: Tool::Select,
            color: Color::RED,
            number_value: None,
            config,
            drag: DragState::Idle,
            font: overlay::load_system_font(),
        }
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    /// Arms `tool`. Any in-flight drag is abandoned: ink already painted
    /// stays on the overlay but no record is committed for it.
    pub fn set_tool(&mut self, tool: Tool) {
        if tool == self.tool {
            return;
        }
        self.drag = DragState::Idle;
        self.tool = tool;
        debug!(?tool, "tool armed");
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub fn number_value(&self) -> Option<NumberValue> {
        self.number_value
    }

    pub fn set_number_value(&mut self, value: NumberValue) {
        self.number_value = Some(value);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Feeds one pointer event through the armed tool against the current
    /// page buffer. `page_no` tags any record the gesture commits.
    pub fn handle_pointer(
        &mut self,
        event: PointerEvent,
        page_no: u32,
        buffer: &mut PageBuffer,
    ) -> EngineEvent {
        match event.phase {
            PointerPhase::Down => self.begin_drag(event.point(), page_no, buffer),
            PointerPhase::Move => self.update_drag(event.point(), buffer),
            PointerPhase::Up | PointerPhase::Leave => {
                self.finish_drag(event.point(), page_no, buffer)
            }
        }
    }

    /// Resolves a pending [`EngineEvent::TextRequested`] with the entered
    /// text. Blank text commits nothing, same as cancelling the prompt.
    pub fn commit_comment(
        &mut self,
        at: PagePoint,
        text: impl Into<String>,
        page_no: u32,
        buffer: &mut PageBuffer,
    ) -> EngineEvent {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return EngineEvent::Idle;
        }

        let color = self.config.comment_color;
        buffer.edit().stamp_comment_marker(at, self.config.stamp_size, color);
        buffer.push_record(Annotation::new(
            page_no,
            AnnotationKind::Comment { at, text: trimmed.to_string() },
            color,
        ));
        EngineEvent::Committed
    }

    fn begin_drag(&mut self, at: PagePoint, page_no: u32, buffer: &mut PageBuffer) -> EngineEvent {
        match self.tool {
            Tool::Select => EngineEvent::Idle,
            Tool::Pen | Tool::Eraser | Tool::Highlight => {
                self.drag = DragState::Path { points: vec![at] };
                self.draw_segment(at, at, buffer);
                EngineEvent::PathProgress
            }
            // Underline previews nothing; the line lands once on release.
            Tool::Underline => {
                self.drag = DragState::Line { from: at, to: at };
                EngineEvent::PathProgress
            }
            Tool::Tick => {
                buffer.edit().stamp_tick(at, self.config.stamp_size, self.config.tick_color);
                buffer.push_record(Annotation::new(
                    page_no,
                    AnnotationKind::Tick { at },
                    self.config.tick_color,
                ));
                EngineEvent::Committed
            }
            Tool::Cross => {
                buffer.edit().stamp_cross(at, self.config.stamp_size, self.config.cross_color);
                buffer.push_record(Annotation::new(
                    page_no,
                    AnnotationKind::Cross { at },
                    self.config.cross_color,
                ));
                EngineEvent::Committed
            }
            Tool::Partial => {
                buffer.edit().stamp_partial(at, self.config.stamp_size, self.config.partial_color);
                buffer.push_record(Annotation::new(
                    page_no,
                    AnnotationKind::Partial { at },
                    self.config.partial_color,
                ));
                EngineEvent::Committed
            }
            Tool::Comment => EngineEvent::TextRequested { at },
            Tool::Number => {
                let Some(value) = self.number_value else {
                    debug!("number stamp ignored, no value armed");
                    return EngineEvent::Idle;
                };

                let color = self.config.badge_color;
                buffer.edit().stamp_badge(
                    at,
                    self.config.badge_radius,
                    color,
                    value.label(),
                    self.font.as_ref(),
                );
                buffer.push_record(Annotation::new(
                    page_no,
                    AnnotationKind::NumberStamp { at, value },
                    color,
                ));
                EngineEvent::NumberStamped { value }
            }
        }
    }

    fn update_drag(&mut self, at: PagePoint, buffer: &mut PageBuffer) -> EngineEvent {
        let segment = match &mut self.drag {
            DragState::Idle => return EngineEvent::Idle,
            DragState::Path { points } => {
                let last = points.last().copied();
                points.push(at);
                last.map(|from| (from, at))
            }
            DragState::Line { to, .. } => {
                *to = at;
                None
            }
        };

        if let Some((from, to)) = segment {
            self.draw_segment(from, to, buffer);
        }
        EngineEvent::PathProgress
    }

    fn finish_drag(&mut self, at: PagePoint, page_no: u32, buffer: &mut PageBuffer) -> EngineEvent {
        let drag = std::mem::replace(&mut self.drag, DragState::Idle);
        match drag {
            DragState::Idle => EngineEvent::Idle,
            DragState::Path { mut points } => {
                if let Some(last) = points.last().copied() {
                    if last != at {
                        points.push(at);
                        self.draw_segment(last, at, buffer);
                    }
                }

                let record = match self.tool {
                    Tool::Pen => Some((
                        AnnotationKind::Stroke { points, width: self.config.pen_width },
                        self.color,
                    )),
                    Tool::Eraser => Some((
                        AnnotationKind::Stroke { points, width: self.config.eraser_width },
                        Color::WHITE,
                    )),
                    Tool::Highlight => Some((
                        AnnotationKind::Highlight { points, width: self.config.highlight_width },
                        self.config.highlight_color.with_alpha(self.config.highlight_alpha),
                    )),
                    _ => None,
                };

                match record {
                    Some((kind, color)) => {
                        buffer.push_record(Annotation::new(page_no, kind, color));
                        EngineEvent::Committed
                    }
                    None => EngineEvent::Idle,
                }
            }
            DragState::Line { from, .. } => {
                if from == at {
                    return EngineEvent::Idle;
                }

                buffer.edit().brush_segment(from, at, self.color, self.config.underline_width);
                buffer.push_record(Annotation::new(
                    page_no,
                    AnnotationKind::Underline { from, to: at },
                    self.color,
                ));
                EngineEvent::Committed
            }
        }
    }

    fn draw_segment(&self, from: PagePoint, to: PagePoint, buffer: &mut PageBuffer) {
        match self.tool {
            Tool::Pen => buffer.edit().brush_segment(from, to, self.color, self.config.pen_width),
            Tool::Eraser => buffer.edit().erase_segment(from, to, self.config.eraser_width),
            Tool::Highlight => {
                let color = self.config.highlight_color.with_alpha(self.config.highlight_alpha);
                buffer.edit().highlight_segment(from, to, color, self.config.highlight_width);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::page_store::PageStore;
    use image::{Rgba, RgbaImage};

    fn store_with_one_page() -> PageStore {
        let raster = RgbaImage::from_pixel(120, 120, Rgba([255, 255, 255, 255]));
        let mut store = PageStore::new();
        store.load(Document::new(vec![raster]));
        store
    }

    fn drag(engine: &mut AnnotationEngine, store: &mut PageStore, path: &[(f32, f32)]) {
        let buffer = store.buffer_mut().expect("buffer should exist");
        let Some(((first, rest), (last_x, last_y))) = path.split_first().zip(path.last().copied())
        else {
            return;
        };

        engine.handle_pointer(PointerEvent::down(first.0, first.1), 1, buffer);
        for (x, y) in rest {
            engine.handle_pointer(PointerEvent::moved(*x, *y), 1, buffer);
        }
        engine.handle_pointer(PointerEvent::up(last_x, last_y), 1, buffer);
    }

    #[test]
    fn pen_drag_commits_one_stroke_record() {
        let mut engine = AnnotationEngine::new();
        let mut store = store_with_one_page();
        engine.set_tool(Tool::Pen);

        drag(&mut engine, &mut store, &[(10.0, 10.0), (25.0, 25.0), (40.0, 30.0)]);

        let buffer = store.buffer().expect("buffer");
        assert_eq!(buffer.records().len(), 1);
        assert!(buffer.overlay().ink_count() > 0);
        match &buffer.records()[0].kind {
            AnnotationKind::Stroke { points, width } => {
                assert_eq!(points.len(), 3);
                assert_eq!(*width, engine.config().pen_width);
            }
            other => panic!("unexpected record: {other:?}"),
        }
    }

    #[test]
    fn eraser_pass_removes_pen_ink() {
        let mut engine = AnnotationEngine::new();
        let mut store = store_with_one_page();

        engine.set_tool(Tool::Pen);
        drag(&mut engine, &mut store, &[(20.0, 20.0), (60.0, 60.0)]);
        assert!(store.buffer().expect("buffer").overlay().ink_count() > 0);

        engine.set_tool(Tool::Eraser);
        drag(&mut engine, &mut store, &[(20.0, 20.0), (60.0, 60.0)]);

        let buffer = store.buffer().expect("buffer");
        assert_eq!(buffer.overlay().ink_count(), 0);
        assert_eq!(buffer.records().len(), 2);
    }

    #[test]
    fn underline_lands_once_on_release() {
        let mut engine = AnnotationEngine::new();
        let mut store = store_with_one_page();
        engine.set_tool(Tool::Underline);

        let buffer = store.buffer_mut().expect("buffer");
        engine.handle_pointer(PointerEvent::down(10.0, 50.0), 1, buffer);
        engine.handle_pointer(PointerEvent::moved(40.0, 55.0), 1, buffer);
        assert_eq!(buffer.overlay().ink_count(), 0);

        engine.handle_pointer(PointerEvent::up(80.0, 50.0), 1, buffer);
        assert!(buffer.overlay().ink_count() > 0);
        match &buffer.records()[0].kind {
            AnnotationKind::Underline { from, to } => {
                assert_eq!(*from, PagePoint::new(10.0, 50.0));
                assert_eq!(*to, PagePoint::new(80.0, 50.0));
            }
            other => panic!("unexpected record: {other:?}"),
        }
    }

    #[test]
    fn zero_length_underline_is_dropped() {
        let mut engine = AnnotationEngine::new();
        let mut store = store_with_one_page();
        engine.set_tool(Tool::Underline);

        let buffer = store.buffer_mut().expect("buffer");
        engine.handle_pointer(PointerEvent::down(30.0, 30.0), 1, buffer);
        let event = engine.handle_pointer(PointerEvent::up(30.0, 30.0), 1, buffer);

        assert_eq!(event, EngineEvent::Idle);
        assert_eq!(buffer.records().len(), 0);
        assert_eq!(buffer.overlay().ink_count(), 0);
    }

    #[test]
    fn symbol_tools_stamp_on_press() {
        for (tool, name) in
            [(Tool::Tick, "tick"), (Tool::Cross, "cross"), (Tool::Partial, "partial")]
        {
            let mut engine = AnnotationEngine::new();
            let mut store = store_with_one_page();
            engine.set_tool(tool);

            let buffer = store.buffer_mut().expect("buffer");
            let event = engine.handle_pointer(PointerEvent::down(60.0, 60.0), 1, buffer);

            assert_eq!(event, EngineEvent::Committed);
            assert_eq!(buffer.records().len(), 1);
            assert_eq!(buffer.records()[0].kind.name(), name);
            assert!(buffer.overlay().ink_count() > 0);
        }
    }

    #[test]
    fn number_tool_without_a_value_is_inert() {
        let mut engine = AnnotationEngine::new();
        let mut store = store_with_one_page();
        engine.set_tool(Tool::Number);

        let buffer = store.buffer_mut().expect("buffer");
        let event = engine.handle_pointer(PointerEvent::down(60.0, 60.0), 1, buffer);

        assert_eq!(event, EngineEvent::Idle);
        assert_eq!(buffer.records().len(), 0);
        assert_eq!(buffer.overlay().ink_count(), 0);
    }

    #[test]
    fn number_tool_stamps_a_badge_and_reports_the_value() {
        let mut engine = AnnotationEngine::new();
        let mut store = store_with_one_page();
        engine.set_tool(Tool::Number);
        engine.set_number_value(NumberValue::Half);

        let buffer = store.buffer_mut().expect("buffer");
        let event = engine.handle_pointer(PointerEvent::down(60.0, 60.0), 1, buffer);

        assert_eq!(event, EngineEvent::NumberStamped { value: NumberValue::Half });
        assert_eq!(buffer.records()[0].kind.name(), "numberStamp");
        assert!(buffer.overlay().ink_count() > 0);
    }

    #[test]
    fn comment_tool_prompts_then_commits_text() {
        let mut engine = AnnotationEngine::new();
        let mut store = store_with_one_page();
        engine.set_tool(Tool::Comment);

        let buffer = store.buffer_mut().expect("buffer");
        let at = PagePoint::new(40.0, 40.0);
        let event = engine.handle_pointer(PointerEvent::down(at.x, at.y), 1, buffer);
        assert_eq!(event, EngineEvent::TextRequested { at });
        assert_eq!(buffer.records().len(), 0);

        let event = engine.commit_comment(at, "show working", 1, buffer);
        assert_eq!(event, EngineEvent::Committed);
        match &buffer.records()[0].kind {
            AnnotationKind::Comment { text, .. } => assert_eq!(text, "show working"),
            other => panic!("unexpected record: {other:?}"),
        }
    }

    #[test]
    fn blank_comment_text_commits_nothing() {
        let mut engine = AnnotationEngine::new();
        let mut store = store_with_one_page();
        engine.set_tool(Tool::Comment);

        let buffer = store.buffer_mut().expect("buffer");
        let at = PagePoint::new(40.0, 40.0);
        engine.handle_pointer(PointerEvent::down(at.x, at.y), 1, buffer);
        let event = engine.commit_comment(at, "   ", 1, buffer);

        assert_eq!(event, EngineEvent::Idle);
        assert_eq!(buffer.records().len(), 0);
    }

    #[test]
    fn switching_tools_abandons_the_drag() {
        let mut engine = AnnotationEngine::new();
        let mut store = store_with_one_page();
        engine.set_tool(Tool::Pen);

        let buffer = store.buffer_mut().expect("buffer");
        engine.handle_pointer(PointerEvent::down(10.0, 10.0), 1, buffer);
        engine.handle_pointer(PointerEvent::moved(20.0, 20.0), 1, buffer);
        engine.set_tool(Tool::Tick);

        let event = engine.handle_pointer(PointerEvent::up(30.0, 30.0), 1, buffer);
        assert_eq!(event, EngineEvent::Idle);
        assert_eq!(buffer.records().len(), 0);
    }

    #[test]
    fn select_tool_ignores_the_pointer() {
        let mut engine = AnnotationEngine::new();
        let mut store = store_with_one_page();

        drag(&mut engine, &mut store, &[(10.0, 10.0), (50.0, 50.0)]);

        let buffer = store.buffer().expect("buffer");
        assert_eq!(buffer.records().len(), 0);
        assert_eq!(buffer.overlay().ink_count(), 0);
    }
}
