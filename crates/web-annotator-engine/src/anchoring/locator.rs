use crate::dom::DocumentTree;

/// A concrete position inside the tree: a node plus a local offset. For a
/// text node the offset counts characters; for an element it is a child
/// index, as with DOM range boundary points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPosition<N> {
    pub node: N,
    pub offset: usize,
}

impl<N> TextPosition<N> {
    pub fn new(node: N, offset: usize) -> Self {
        Self { node, offset }
    }
}

fn char_len<T: DocumentTree>(tree: &T, node: T::NodeId) -> usize {
    tree.text(node).map_or(0, |t| t.chars().count())
}

/// Finds the text node holding cumulative character `offset` under
/// `element`.
///
/// The first text node whose range reaches `offset` wins, so a boundary
/// offset resolves to the end of the earlier node. Offsets past the end
/// clamp to the end of the last text node. `None` only when `element` has
/// no text nodes at all.
pub fn locate<T: DocumentTree>(
    tree: &T,
    element: T::NodeId,
    offset: usize,
) -> Option<TextPosition<T::NodeId>> {
    let nodes = tree.text_nodes(element);
    let mut before = 0;
    for node in &nodes {
        let len = char_len(tree, *node);
        if before + len >= offset {
            return Some(TextPosition::new(*node, offset - before));
        }
        before += len;
    }
    let last = *nodes.last()?;
    let len = char_len(tree, last);
    Some(TextPosition::new(last, offset.min(len)))
}

/// Inverse of [`locate`]: turns a boundary point into the nearest element
/// ancestor plus the cumulative character offset under it.
///
/// A text node is measured against its parent element; an element is
/// measured against itself, with `local` read as a child index.
pub fn measure<T: DocumentTree>(
    tree: &T,
    node: T::NodeId,
    local: usize,
) -> Option<(T::NodeId, usize)> {
    let root = tree.element_of(node)?;
    let offset = measure_within(tree, root, node, local)?;
    Some((root, offset))
}

/// Cumulative character offset of a boundary point relative to `root`.
/// `None` when the point is not inside `root`.
pub fn measure_within<T: DocumentTree>(
    tree: &T,
    root: T::NodeId,
    node: T::NodeId,
    local: usize,
) -> Option<usize> {
    if !tree.is_inclusive_descendant(node, root) {
        return None;
    }
    let before = text_len_until(tree, root, node);
    let within = if tree.is_text(node) {
        local.min(char_len(tree, node))
    } else {
        tree.children(node)
            .iter()
            .take(local)
            .flat_map(|child| tree.text_nodes(*child))
            .map(|n| char_len(tree, n))
            .sum()
    };
    Some(before + within)
}

/// Text length under `root` that precedes `node` in document order.
fn text_len_until<T: DocumentTree>(tree: &T, root: T::NodeId, node: T::NodeId) -> usize {
    tree.descendants(root)
        .into_iter()
        .take_while(|n| *n != node)
        .map(|n| char_len(tree, n))
        .sum()
}

/// Plain text between two boundary points, in document order.
pub fn text_between<T: DocumentTree>(
    tree: &T,
    start: TextPosition<T::NodeId>,
    end: TextPosition<T::NodeId>,
) -> String {
    let root = tree.root();
    let (Some(from), Some(to)) = (
        measure_within(tree, root, start.node, start.offset),
        measure_within(tree, root, end.node, end.offset),
    ) else {
        return String::new();
    };
    tree.text_content(root)
        .chars()
        .skip(from)
        .take(to.saturating_sub(from))
        .collect()
}
