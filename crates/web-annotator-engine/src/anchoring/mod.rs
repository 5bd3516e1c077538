//! # Anchor resolution
//!
//! Anchors let a highlight survive a page reload. A live boundary point
//! (text node + local offset) is turned into a structure-based reference:
//!
//! ```text
//! text node "world" @ 2   ──measure──▶  (<p>, 8)  ──encode──▶  "html > body > p" @ 8
//! ```
//!
//! and back again when the page is loaded:
//!
//! ```text
//! "html > body > p" @ 8   ──decode──▶  <p>  ──locate──▶  text node @ local offset
//! ```
//!
//! - **`path`**: element ⇄ [`StructuralPath`] (child-combinator selector)
//! - **`locator`**: element + cumulative offset ⇄ text node + local offset
//!
//! Both halves are pure functions over [`DocumentTree`], so they can be
//! exercised against synthetic trees.

pub mod locator;
pub mod path;

pub use locator::{TextPosition, locate, measure, measure_within, text_between};
pub use path::{PathParseError, PathSegment, StructuralPath, decode, encode};

use serde::{Deserialize, Serialize};

use crate::dom::DocumentTree;

/// A durable text position: an element path plus the cumulative character
/// offset under that element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextAnchorPoint {
    pub path: StructuralPath,
    pub offset: usize,
}

impl TextAnchorPoint {
    pub fn new(path: StructuralPath, offset: usize) -> Self {
        Self { path, offset }
    }

    /// Builds an anchor from a live boundary point.
    pub fn from_position<T: DocumentTree>(
        tree: &T,
        position: TextPosition<T::NodeId>,
    ) -> Option<Self> {
        let (element, offset) = measure(tree, position.node, position.offset)?;
        let path = encode(tree, element)?;
        Some(Self { path, offset })
    }

    /// Relocates the anchor in the current tree. `None` when the element is
    /// gone or no longer holds any text.
    pub fn resolve<T: DocumentTree>(&self, tree: &T) -> Option<TextPosition<T::NodeId>> {
        let element = decode(tree, &self.path)?;
        locate(tree, element, self.offset)
    }
}
