use std::fmt;

use super::{DocumentTree, DocumentTreeMut, DomError};

/// Handle to a node in a [`Dom`]. Handles stay valid after a node is
/// detached; the node simply no longer has a parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// Arena-backed document tree.
///
/// Nodes are never freed; detaching a node only unlinks it, which keeps
/// every handed-out [`NodeId`] valid for the lifetime of the document.
#[derive(Debug, Clone)]
pub struct Dom {
    nodes: Vec<NodeData>,
    root: NodeId,
}

/// Elements serialized without a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom {
    /// An empty `<html><head></head><body></body></html>` document.
    pub fn new() -> Self {
        let mut dom = Self {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        let html = dom.create_element("html");
        let head = dom.create_element("head");
        let body = dom.create_element("body");
        dom.link(html, head);
        dom.link(html, body);
        dom.root = html;
        dom
    }

    /// The `<body>` element, falling back to the root.
    pub fn body(&self) -> NodeId {
        self.children(self.root)
            .iter()
            .copied()
            .find(|c| self.tag_name(*c) == Some("body"))
            .unwrap_or(self.root)
    }

    /// Creates a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    /// First element in document order whose `id` attribute equals `id`.
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|n| self.element_id(*n) == Some(id))
    }

    /// All elements with the given tag, in document order.
    pub fn elements_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|n| self.tag_name(*n) == Some(tag))
            .collect()
    }

    /// All elements carrying `class`, in document order.
    pub fn elements_by_class(&self, class: &str) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|n| self.has_class(*n, class))
            .collect()
    }

    /// Serializes `node` and its subtree as HTML.
    pub fn to_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    /// Serializes the children of `node` as HTML.
    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.write_html(*child, &mut out);
        }
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        match &self.data(node).kind {
            NodeKind::Text(text) => out.push_str(&html_escape::encode_text(text)),
            NodeKind::Element { tag, attributes } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&html_escape::encode_double_quoted_attribute(value));
                    out.push('"');
                }
                out.push('>');
                if is_void_element(tag) {
                    return;
                }
                for child in &self.data(node).children {
                    self.write_html(*child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    /// A document holding only a root element named `tag`.
    pub(crate) fn with_root(tag: &str) -> Self {
        let mut dom = Self {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        dom.root = dom.create_element(tag);
        dom
    }

    /// Nodes ever created in this document, attached or not.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            parent: None,
            children: Vec::new(),
            kind,
        });
        id
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    fn data(&self, node: NodeId) -> &NodeData {
        &self.nodes[node.0]
    }
}

impl DocumentTree for Dom {
    type NodeId = NodeId;

    fn root(&self) -> NodeId {
        self.root
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.data(node).parent
    }

    fn children(&self, node: NodeId) -> &[NodeId] {
        &self.data(node).children
    }

    fn tag_name(&self, node: NodeId) -> Option<&str> {
        match &self.data(node).kind {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.data(node).kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    fn text(&self, node: NodeId) -> Option<&str> {
        match &self.data(node).kind {
            NodeKind::Text(text) => Some(text),
            NodeKind::Element { .. } => None,
        }
    }
}

impl DocumentTreeMut for Dom {
    fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
        })
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        match &mut self.nodes[node.0].kind {
            NodeKind::Element { attributes, .. } => {
                match attributes.iter_mut().find(|(n, _)| n == name) {
                    Some((_, existing)) => *existing = value.to_string(),
                    None => attributes.push((name.to_string(), value.to_string())),
                }
                Ok(())
            }
            NodeKind::Text(_) => Err(DomError::NotElement(node.to_string())),
        }
    }

    fn insert_before(
        &mut self,
        parent: NodeId,
        node: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        if !self.is_element(parent) {
            return Err(DomError::NotElement(parent.to_string()));
        }
        if let Some(reference) = reference
            && self.parent(reference) != Some(parent)
        {
            return Err(DomError::NotAChild {
                node: reference.to_string(),
                parent: parent.to_string(),
            });
        }
        self.detach(node);
        let children = &mut self.nodes[parent.0].children;
        let index = reference
            .and_then(|r| children.iter().position(|c| *c == r))
            .unwrap_or(children.len());
        children.insert(index, node);
        self.nodes[node.0].parent = Some(parent);
        Ok(())
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != node);
        }
    }

    fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), DomError> {
        match &mut self.nodes[node.0].kind {
            NodeKind::Text(existing) => {
                *existing = text.to_string();
                Ok(())
            }
            NodeKind::Element { .. } => Err(DomError::NotText(node.to_string())),
        }
    }

    fn split_text(&mut self, node: NodeId, offset: usize) -> Result<NodeId, DomError> {
        let text = self
            .text(node)
            .ok_or_else(|| DomError::NotText(node.to_string()))?;
        let len = text.chars().count();
        if offset > len {
            return Err(DomError::OffsetOutOfBounds { offset, len });
        }
        let byte = text
            .char_indices()
            .nth(offset)
            .map_or(text.len(), |(i, _)| i);
        let (head, tail) = text.split_at(byte);
        let (head, tail) = (head.to_string(), tail.to_string());

        self.set_text(node, &head)?;
        let rest = self.create_text(&tail);
        if let Some(parent) = self.parent(node) {
            let next = self
                .index_in_parent(node)
                .and_then(|i| self.children(parent).get(i + 1).copied());
            self.insert_before(parent, rest, next)?;
        }
        Ok(rest)
    }
}
