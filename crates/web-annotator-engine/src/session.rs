//! The in-page agent.
//!
//! A [`Session`] owns everything that was module-level state in a content
//! script: the mode, colors and brush size, the stroke being drawn, the
//! overlay canvas, the page's annotation store and the document itself.
//! Input arrives as [`Event`]s that are handled one at a time to completion,
//! so nothing here needs locking.

use std::collections::VecDeque;

use crate::anchoring::{TextAnchorPoint, TextPosition, text_between};
use crate::canvas::{Canvas, DrawCommand};
use crate::dom::{Dom, NodeId};
use crate::markup::{self, ReapplyReport};
use crate::messages::{MessageError, Mode, Request, Response, parse_request};
use crate::models::{AnnotationSet, Color, DrawingStroke, HighlightAnnotation, Point, Preferences};
use crate::storage::{StorageBackend, StorageError};
use crate::store::{AnchorStore, StoreError};

/// A live selection, as two boundary points in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub start: TextPosition<NodeId>,
    pub end: TextPosition<NodeId>,
}

impl Selection {
    pub fn new(start: TextPosition<NodeId>, end: TextPosition<NodeId>) -> Self {
        Self { start, end }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    PointerDown(Point),
    PointerMove(Point),
    PointerUp,
    SelectionReleased(Selection),
    MessageReceived(Request),
    Resized { width: u32, height: u32 },
}

/// Something the user must be told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    StorageFull,
}

impl Notice {
    pub fn message(&self) -> &'static str {
        match self {
            Notice::StorageFull => "Could not save annotations. Storage limit reached.",
        }
    }
}

/// What happened to a released selection.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome {
    Ignored,
    /// The selection touches an existing highlight.
    Nested,
    /// No anchor could be built for a boundary.
    Unanchorable,
    Created(String),
}

#[derive(Debug)]
struct StrokeInProgress {
    stroke: DrawingStroke,
    last: Point,
}

pub struct Session<S> {
    dom: Dom,
    store: AnchorStore<S>,
    mode: Mode,
    highlight_color: Color,
    draw_color: Color,
    brush_size: f64,
    viewport: (u32, u32),
    canvas: Option<Canvas>,
    drawing: Option<StrokeInProgress>,
    notices: Vec<Notice>,
}

impl<S: StorageBackend> Session<S> {
    pub fn new(dom: Dom, backend: S, page_url: &str, viewport: (u32, u32)) -> Self {
        let defaults = Preferences::default();
        Self {
            dom,
            store: AnchorStore::new(backend, page_url),
            mode: Mode::default(),
            highlight_color: defaults.highlight_color,
            draw_color: defaults.draw_color,
            brush_size: defaults.brush_size,
            viewport,
            canvas: None,
            drawing: None,
            notices: Vec::new(),
        }
    }

    /// Restores the page's annotations: markers are re-painted and, when
    /// there are strokes, the canvas is created and redrawn.
    pub fn load(&mut self) -> Result<ReapplyReport, StorageError> {
        if !self.store.load()? {
            log::debug!("No stored annotations for {}", self.store.key());
            return Ok(ReapplyReport::default());
        }
        let report = self.reapply_highlights();
        if !self.store.drawings().is_empty() {
            let strokes = self.store.drawings().to_vec();
            self.canvas_mut().redraw_all(&strokes);
        }
        log::info!(
            "Restored {} highlights ({} skipped) and {} strokes",
            report.applied.len(),
            report.skipped.len(),
            self.store.drawings().len()
        );
        Ok(report)
    }

    /// Unwraps and re-applies every stored highlight.
    pub fn reapply_highlights(&mut self) -> ReapplyReport {
        match markup::reapply_all(&mut self.dom, self.store.highlights()) {
            Ok(report) => report,
            Err(e) => {
                log::error!("Failed to reapply highlights: {e}");
                ReapplyReport::default()
            }
        }
    }

    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    pub fn dom_mut(&mut self) -> &mut Dom {
        &mut self.dom
    }

    pub fn store(&self) -> &AnchorStore<S> {
        &self.store
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn highlight_color(&self) -> &Color {
        &self.highlight_color
    }

    pub fn draw_color(&self) -> &Color {
        &self.draw_color
    }

    pub fn brush_size(&self) -> f64 {
        self.brush_size
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing.is_some()
    }

    pub fn canvas(&self) -> Option<&Canvas> {
        self.canvas.as_ref()
    }

    /// Canvas commands issued since the last call, for the host to paint.
    /// Empty while no canvas exists.
    pub fn take_draw_commands(&mut self) -> Vec<DrawCommand> {
        self.canvas
            .as_mut()
            .map(Canvas::take_commands)
            .unwrap_or_default()
    }

    /// Notices raised since the last call.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn canvas_mut(&mut self) -> &mut Canvas {
        let (width, height) = self.viewport;
        self.canvas.get_or_insert_with(|| Canvas::new(width, height))
    }

    /// Handles one event to completion. Only requests that expect a reply
    /// produce a [`Response`].
    pub fn handle(&mut self, event: Event) -> Option<Response> {
        match event {
            Event::PointerDown(point) => self.start_stroke(point),
            Event::PointerMove(point) => self.extend_stroke(point),
            Event::PointerUp => self.finish_stroke(),
            Event::SelectionReleased(selection) => {
                self.highlight_selection(selection);
            }
            Event::MessageReceived(request) => return self.handle_request(request),
            Event::Resized { width, height } => self.resize(width, height),
        }
        None
    }

    /// Raw channel entry point: parses a request, handles it, and
    /// serializes the reply if there is one.
    pub fn handle_message(&mut self, raw: &str) -> Result<Option<String>, MessageError> {
        let request = parse_request(raw).inspect_err(|e| log::warn!("Dropping message: {e}"))?;
        self.handle_request(request)
            .map(|response| serde_json::to_string(&response))
            .transpose()
            .map_err(MessageError::from)
    }

    pub fn handle_request(&mut self, request: Request) -> Option<Response> {
        match request {
            Request::SetMode(mode) => {
                self.mode = mode;
                self.canvas_mut().set_mode(mode);
                None
            }
            Request::SetHighlightColor(color) => {
                self.highlight_color = color;
                None
            }
            Request::SetDrawColor(color) => {
                self.draw_color = color;
                None
            }
            Request::SetBrushSize(size) => {
                self.brush_size = size;
                None
            }
            Request::ClearAnnotations => {
                self.clear_all();
                Some(Response::success())
            }
            Request::GetAnnotations => Some(Response::Data {
                data: self.store.snapshot(),
            }),
            Request::ImportAnnotations(set) => {
                self.import(set);
                Some(Response::success())
            }
        }
    }

    /// Turns a released selection into a stored, painted highlight.
    pub fn highlight_selection(&mut self, selection: Selection) -> SelectionOutcome {
        if self.mode != Mode::Select || self.is_drawing() || selection.is_collapsed() {
            return SelectionOutcome::Ignored;
        }
        if [selection.start.node, selection.end.node]
            .into_iter()
            .any(|n| markup::closest_marker(&self.dom, n).is_some())
        {
            log::debug!("Selection touches an existing highlight; not nesting");
            return SelectionOutcome::Nested;
        }

        let (Some(start), Some(end)) = (
            TextAnchorPoint::from_position(&self.dom, selection.start),
            TextAnchorPoint::from_position(&self.dom, selection.end),
        ) else {
            log::error!("Could not create a path for the selection");
            return SelectionOutcome::Unanchorable;
        };
        let text = text_between(&self.dom, selection.start, selection.end);
        let highlight = HighlightAnnotation::new(self.highlight_color.clone(), start, end, text);
        let id = highlight.id.clone();

        if let Err(e) = markup::apply(&mut self.dom, &highlight) {
            log::error!("Error applying highlight {id}: {e}");
        }
        let result = self.store.append_highlight(highlight);
        self.report_store_result(result);
        SelectionOutcome::Created(id)
    }

    fn start_stroke(&mut self, point: Point) {
        if !self.canvas.as_ref().is_some_and(Canvas::is_interactive) {
            return;
        }
        self.drawing = Some(StrokeInProgress {
            stroke: DrawingStroke {
                color: self.draw_color.clone(),
                stroke_width: self.brush_size,
                points: vec![point],
            },
            last: point,
        });
    }

    fn extend_stroke(&mut self, point: Point) {
        let Some(drawing) = self.drawing.as_mut() else {
            return;
        };
        let from = drawing.last;
        drawing.stroke.points.push(point);
        drawing.last = point;
        let (color, width) = (drawing.stroke.color.clone(), drawing.stroke.stroke_width);
        self.canvas_mut().draw_segment(from, point, &color, width);
    }

    fn finish_stroke(&mut self) {
        let Some(drawing) = self.drawing.take() else {
            return;
        };
        if drawing.stroke.is_drawable() {
            let result = self.store.append_stroke(drawing.stroke);
            self.report_store_result(result);
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
        let strokes = self.store.drawings().to_vec();
        if let Some(canvas) = self.canvas.as_mut() {
            canvas.resize(width, height, &strokes);
        }
    }

    fn clear_all(&mut self) {
        if let Err(e) = markup::clear_markers(&mut self.dom) {
            log::error!("Failed to remove highlight markers: {e}");
        }
        if let Some(canvas) = self.canvas.as_mut() {
            canvas.clear();
        }
        if let Err(e) = self.store.clear() {
            log::error!("Failed to remove stored annotations: {e}");
        }
    }

    /// Replaces the stored set. Markers are not re-painted here; the page is
    /// expected to reload.
    fn import(&mut self, set: AnnotationSet) {
        log::info!(
            "Importing {} highlights and {} strokes",
            set.highlights.len(),
            set.drawings.len()
        );
        let result = self.store.replace(set);
        self.report_store_result(result);
    }

    fn report_store_result(&mut self, result: Result<(), StoreError>) {
        if let Err(e) = result {
            log::error!("Error saving annotations: {e}");
            if e.is_quota_exceeded() {
                self.notices.push(Notice::StorageFull);
            }
        }
    }
}

/// FIFO of pending events, drained into a session one at a time.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Handles every queued event in order and returns the responses.
    pub fn run<S: StorageBackend>(&mut self, session: &mut Session<S>) -> Vec<Response> {
        let mut responses = Vec::new();
        while let Some(event) = self.events.pop_front() {
            responses.extend(session.handle(event));
        }
        responses
    }
}

impl Extend<Event> for EventQueue {
    fn extend<I: IntoIterator<Item = Event>>(&mut self, iter: I) {
        self.events.extend(iter);
    }
}
