//! Abstract document tree capability.
//!
//! Anchoring never talks to a rendering engine directly. Everything it needs
//! from a page is expressed by [`DocumentTree`] (read access) and
//! [`DocumentTreeMut`] (the handful of mutations markers require), so the
//! codec, locator and applier run the same against a live page adapter or
//! against the in-memory [`Dom`] used by tests and tooling.

mod arena;
mod parse;

pub use arena::{Dom, NodeId};
pub use parse::parse_markup;

use std::fmt::Debug;
use std::hash::Hash;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DomError {
    #[error("Node {0} is not a text node")]
    NotText(String),
    #[error("Node {0} is not an element")]
    NotElement(String),
    #[error("Node {node} is not a child of {parent}")]
    NotAChild { node: String, parent: String },
    #[error("Offset {offset} is past the end of a {len} character text node")]
    OffsetOutOfBounds { offset: usize, len: usize },
}

/// Read-only view of a document tree.
pub trait DocumentTree {
    type NodeId: Copy + Eq + Hash + Debug;

    /// The document element (`<html>`).
    fn root(&self) -> Self::NodeId;
    fn parent(&self, node: Self::NodeId) -> Option<Self::NodeId>;
    fn children(&self, node: Self::NodeId) -> &[Self::NodeId];
    /// Lowercase tag name, `None` for text nodes.
    fn tag_name(&self, node: Self::NodeId) -> Option<&str>;
    fn attribute(&self, node: Self::NodeId, name: &str) -> Option<&str>;
    /// Text content of a text node, `None` for elements.
    fn text(&self, node: Self::NodeId) -> Option<&str>;

    fn is_element(&self, node: Self::NodeId) -> bool {
        self.tag_name(node).is_some()
    }

    fn is_text(&self, node: Self::NodeId) -> bool {
        self.text(node).is_some()
    }

    /// Non-empty `id` attribute.
    fn element_id(&self, node: Self::NodeId) -> Option<&str> {
        self.attribute(node, "id").filter(|id| !id.is_empty())
    }

    fn has_class(&self, node: Self::NodeId, class: &str) -> bool {
        self.attribute(node, "class")
            .is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == class))
    }

    /// Nearest element ancestor, or the node itself when it is an element.
    fn element_of(&self, node: Self::NodeId) -> Option<Self::NodeId> {
        if self.is_element(node) {
            Some(node)
        } else {
            self.parent(node).filter(|p| self.is_element(*p))
        }
    }

    fn index_in_parent(&self, node: Self::NodeId) -> Option<usize> {
        let parent = self.parent(node)?;
        self.children(parent).iter().position(|c| *c == node)
    }

    /// Element children of the node's parent that precede it.
    fn preceding_element_siblings(&self, node: Self::NodeId) -> Vec<Self::NodeId> {
        let Some(parent) = self.parent(node) else {
            return Vec::new();
        };
        self.children(parent)
            .iter()
            .copied()
            .take_while(|c| *c != node)
            .filter(|c| self.is_element(*c))
            .collect()
    }

    /// `node` and everything below it, in document (pre-)order.
    fn descendants(&self, node: Self::NodeId) -> Vec<Self::NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// Text nodes under `node` in document order.
    fn text_nodes(&self, node: Self::NodeId) -> Vec<Self::NodeId> {
        self.descendants(node)
            .into_iter()
            .filter(|n| self.is_text(*n))
            .collect()
    }

    /// Concatenated text under `node`.
    fn text_content(&self, node: Self::NodeId) -> String {
        self.text_nodes(node)
            .into_iter()
            .filter_map(|n| self.text(n))
            .collect()
    }

    /// `node` or its nearest ancestor carrying `class`.
    fn closest_with_class(&self, node: Self::NodeId, class: &str) -> Option<Self::NodeId> {
        let mut current = Some(node);
        while let Some(n) = current {
            if self.has_class(n, class) {
                return Some(n);
            }
            current = self.parent(n);
        }
        None
    }

    /// Whether `node` sits below (or is) `ancestor`.
    fn is_inclusive_descendant(&self, node: Self::NodeId, ancestor: Self::NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }
}

/// Mutations needed to insert and remove highlight markers.
pub trait DocumentTreeMut: DocumentTree {
    /// Creates a detached element.
    fn create_element(&mut self, tag: &str) -> Self::NodeId;
    fn set_attribute(&mut self, node: Self::NodeId, name: &str, value: &str)
    -> Result<(), DomError>;
    /// Inserts `node` into `parent` before `reference`, or at the end when
    /// `reference` is `None`. `node` is detached from any previous parent.
    fn insert_before(
        &mut self,
        parent: Self::NodeId,
        node: Self::NodeId,
        reference: Option<Self::NodeId>,
    ) -> Result<(), DomError>;
    fn detach(&mut self, node: Self::NodeId);
    fn set_text(&mut self, node: Self::NodeId, text: &str) -> Result<(), DomError>;
    /// Splits a text node at a character offset. The original node keeps
    /// `[0, offset)`; the returned node holds the rest and follows it.
    fn split_text(&mut self, node: Self::NodeId, offset: usize) -> Result<Self::NodeId, DomError>;

    fn append_child(&mut self, parent: Self::NodeId, node: Self::NodeId) -> Result<(), DomError> {
        self.insert_before(parent, node, None)
    }

    /// Replaces `node` with its children.
    fn unwrap(&mut self, node: Self::NodeId) -> Result<(), DomError> {
        let Some(parent) = self.parent(node) else {
            return Ok(());
        };
        for child in self.children(node).to_vec() {
            self.insert_before(parent, child, Some(node))?;
        }
        self.detach(node);
        Ok(())
    }

    /// Merges adjacent text nodes and drops empty ones, recursively.
    fn normalize(&mut self, node: Self::NodeId) -> Result<(), DomError> {
        let mut previous_text: Option<Self::NodeId> = None;
        for child in self.children(node).to_vec() {
            match self.text(child).map(str::to_owned) {
                Some(text) if text.is_empty() => self.detach(child),
                Some(text) => match previous_text {
                    Some(prev) => {
                        let merged = format!("{}{text}", self.text(prev).unwrap_or_default());
                        self.set_text(prev, &merged)?;
                        self.detach(child);
                    }
                    None => previous_text = Some(child),
                },
                None => {
                    previous_text = None;
                    self.normalize(child)?;
                }
            }
        }
        Ok(())
    }
}
