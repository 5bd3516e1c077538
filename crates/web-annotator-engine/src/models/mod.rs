pub mod annotation;
pub mod preferences;

pub use annotation::{AnnotationSet, Color, DrawingStroke, HighlightAnnotation, Point};
pub use preferences::{
    DEFAULT_BRUSH_SIZE, DEFAULT_DRAW_COLOR, DEFAULT_HIGHLIGHT_COLOR, PREFERENCES_KEY, Preferences,
};
