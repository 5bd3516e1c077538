use std::fmt;

use serde::{Deserialize, Serialize};

use crate::anchoring::{StructuralPath, TextAnchorPoint};

/// A CSS color string, usually `#rrggbb`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(String);

impl Color {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Color {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A persisted text highlight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "HighlightRecord", into = "HighlightRecord")]
pub struct HighlightAnnotation {
    pub id: String,
    pub color: Color,
    pub start: TextAnchorPoint,
    pub end: TextAnchorPoint,
    /// Plain text captured when the highlight was made.
    pub text: String,
}

impl HighlightAnnotation {
    /// A new highlight with a fresh `hl-` id.
    pub fn new(color: Color, start: TextAnchorPoint, end: TextAnchorPoint, text: String) -> Self {
        Self {
            id: format!("hl-{}", uuid::Uuid::new_v4().simple()),
            color,
            start,
            end,
            text,
        }
    }
}

/// Flat on-disk shape of a highlight, shared with exported files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", rename = "highlight")]
struct HighlightRecord {
    id: String,
    color: Color,
    start_path: StructuralPath,
    start_offset: usize,
    end_path: StructuralPath,
    end_offset: usize,
    #[serde(default)]
    text: String,
}

impl From<HighlightRecord> for HighlightAnnotation {
    fn from(record: HighlightRecord) -> Self {
        Self {
            id: record.id,
            color: record.color,
            start: TextAnchorPoint::new(record.start_path, record.start_offset),
            end: TextAnchorPoint::new(record.end_path, record.end_offset),
            text: record.text,
        }
    }
}

impl From<HighlightAnnotation> for HighlightRecord {
    fn from(highlight: HighlightAnnotation) -> Self {
        Self {
            id: highlight.id,
            color: highlight.color,
            start_path: highlight.start.path,
            start_offset: highlight.start.offset,
            end_path: highlight.end.path,
            end_offset: highlight.end.offset,
            text: highlight.text,
        }
    }
}

/// A point in viewport pixels, serialized as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point(pub f64, pub f64);

impl Point {
    pub fn x(&self) -> f64 {
        self.0
    }

    pub fn y(&self) -> f64 {
        self.1
    }
}

/// A finished free-hand stroke. Points stay in the coordinate space they
/// were captured in; they are never rescaled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "draw")]
pub struct DrawingStroke {
    pub color: Color,
    #[serde(rename = "size")]
    pub stroke_width: f64,
    pub points: Vec<Point>,
}

impl DrawingStroke {
    /// Only strokes with at least two points are kept.
    pub fn is_drawable(&self) -> bool {
        self.points.len() >= 2
    }
}

/// Everything stored for one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationSet {
    #[serde(default)]
    pub highlights: Vec<HighlightAnnotation>,
    #[serde(default)]
    pub drawings: Vec<DrawingStroke>,
}

impl AnnotationSet {
    pub fn is_empty(&self) -> bool {
        self.highlights.is_empty() && self.drawings.is_empty()
    }
}
