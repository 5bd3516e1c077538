//! Overlay drawing surface.
//!
//! The canvas records what it would paint as [`DrawCommand`]s instead of
//! rasterizing, so hosts can replay them onto a real 2D context and tests
//! can inspect them. Stroke coordinates are used exactly as stored: after
//! a resize, older strokes land at the same pixel positions in the new
//! viewport, which is expected drift rather than something to correct.

use crate::messages::Mode;
use crate::models::{Color, DrawingStroke, Point};

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear {
        width: u32,
        height: u32,
    },
    /// One live segment while the pointer is held down.
    Segment {
        from: Point,
        to: Point,
        color: Color,
        width: f64,
    },
    /// A stored stroke replayed in full.
    Polyline {
        points: Vec<Point>,
        color: Color,
        width: f64,
    },
}

#[derive(Debug, Clone)]
pub struct Canvas {
    width: u32,
    height: u32,
    visible: bool,
    commands: Vec<DrawCommand>,
}

impl Canvas {
    /// A hidden canvas covering the viewport.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            visible: false,
            commands: Vec::new(),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether the canvas is shown and takes pointer input.
    pub fn is_interactive(&self) -> bool {
        self.visible
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.visible = mode == Mode::Draw;
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Drains the commands issued since the last call.
    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn clear(&mut self) {
        self.commands.push(DrawCommand::Clear {
            width: self.width,
            height: self.height,
        });
    }

    pub fn draw_segment(&mut self, from: Point, to: Point, color: &Color, width: f64) {
        self.commands.push(DrawCommand::Segment {
            from,
            to,
            color: color.clone(),
            width,
        });
    }

    /// Clears and replays every stroke with at least two points.
    pub fn redraw_all(&mut self, strokes: &[DrawingStroke]) {
        self.clear();
        for stroke in strokes.iter().filter(|s| s.is_drawable()) {
            self.commands.push(DrawCommand::Polyline {
                points: stroke.points.clone(),
                color: stroke.color.clone(),
                width: stroke.stroke_width,
            });
        }
    }

    /// Adopts the new viewport size and repaints from stored coordinates.
    pub fn resize(&mut self, width: u32, height: u32, strokes: &[DrawingStroke]) {
        self.width = width;
        self.height = height;
        self.redraw_all(strokes);
    }
}
