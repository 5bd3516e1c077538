//! Highlight markers.
//!
//! A marker is a `<span>` wrapped around the highlighted text:
//!
//! ```html
//! <span class="web-annotator-highlight" style="background-color: #ffff00"
//!       data-highlight-id="hl-…">Hello world</span>
//! ```
//!
//! Markers go through exactly two states: absent and applied. The only way
//! back to absent is a full unwrap, which restores the original text nodes
//! (merged) so that offsets measured before any marker existed still hold.

use crate::anchoring::{TextAnchorPoint, TextPosition};
use crate::dom::{DocumentTree, DocumentTreeMut, DomError};
use crate::models::HighlightAnnotation;

pub const MARKER_CLASS: &str = "web-annotator-highlight";
pub const MARKER_ID_ATTRIBUTE: &str = "data-highlight-id";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ApplyError {
    #[error("Could not resolve the {which} anchor '{path}' @ {offset}")]
    Unresolved {
        which: &'static str,
        path: String,
        offset: usize,
    },
    #[error("Range is empty or inverted")]
    EmptyRange,
    #[error("Range partially selects an element")]
    PartialElement,
    #[error("Highlight {0} is already applied")]
    AlreadyApplied(String),
    #[error(transparent)]
    Dom(#[from] DomError),
}

/// Outcome of [`reapply_all`].
#[derive(Debug, Default)]
pub struct ReapplyReport {
    pub removed: usize,
    pub applied: Vec<String>,
    pub skipped: Vec<(String, ApplyError)>,
}

/// Every marker currently in the document, in document order.
pub fn markers<T: DocumentTree>(tree: &T) -> Vec<T::NodeId> {
    tree.descendants(tree.root())
        .into_iter()
        .filter(|n| tree.has_class(*n, MARKER_CLASS))
        .collect()
}

/// The marker at or above `node`, if any.
pub fn closest_marker<T: DocumentTree>(tree: &T, node: T::NodeId) -> Option<T::NodeId> {
    tree.closest_with_class(node, MARKER_CLASS)
}

fn resolve<T: DocumentTree>(
    tree: &T,
    anchor: &TextAnchorPoint,
    which: &'static str,
) -> Result<TextPosition<T::NodeId>, ApplyError> {
    anchor.resolve(tree).ok_or_else(|| ApplyError::Unresolved {
        which,
        path: anchor.path.to_string(),
        offset: anchor.offset,
    })
}

/// Wraps the highlight's range in a marker and returns the marker.
///
/// Nothing is touched, and no node is created, when an anchor cannot be
/// resolved or the range cannot be wrapped.
pub fn apply<T: DocumentTreeMut>(
    tree: &mut T,
    highlight: &HighlightAnnotation,
) -> Result<T::NodeId, ApplyError> {
    if markers(tree)
        .into_iter()
        .any(|m| tree.attribute(m, MARKER_ID_ATTRIBUTE) == Some(highlight.id.as_str()))
    {
        return Err(ApplyError::AlreadyApplied(highlight.id.clone()));
    }

    let start = resolve(tree, &highlight.start, "start")?;
    let end = resolve(tree, &highlight.end, "end")?;
    let range = WrapRange::check(tree, start, end)?;

    let marker = tree.create_element("span");
    tree.set_attribute(marker, "class", MARKER_CLASS)?;
    tree.set_attribute(
        marker,
        "style",
        &format!("background-color: {}", highlight.color),
    )?;
    tree.set_attribute(marker, MARKER_ID_ATTRIBUTE, &highlight.id)?;

    range.surround(tree, marker)?;
    Ok(marker)
}

fn char_len<T: DocumentTree>(tree: &T, node: T::NodeId) -> usize {
    tree.text(node).map_or(0, |t| t.chars().count())
}

/// Splits off the text after `offset`, unless that would leave an empty
/// node behind.
fn split_after<T: DocumentTreeMut>(
    tree: &mut T,
    node: T::NodeId,
    offset: usize,
) -> Result<(), DomError> {
    if offset < char_len(tree, node) {
        tree.split_text(node, offset)?;
    }
    Ok(())
}

/// Returns the node holding the text from `offset` on, splitting only
/// when `offset` is inside the node.
fn split_before<T: DocumentTreeMut>(
    tree: &mut T,
    node: T::NodeId,
    offset: usize,
) -> Result<T::NodeId, DomError> {
    if offset == 0 {
        Ok(node)
    } else {
        tree.split_text(node, offset)
    }
}

/// A text range that can be wrapped as a whole: both ends share a parent
/// and the start comes first.
#[derive(Debug, Clone, Copy)]
struct WrapRange<N> {
    parent: N,
    start: TextPosition<N>,
    end: TextPosition<N>,
}

impl<N: Copy + Eq> WrapRange<N> {
    fn check<T: DocumentTree<NodeId = N>>(
        tree: &T,
        start: TextPosition<N>,
        end: TextPosition<N>,
    ) -> Result<Self, ApplyError> {
        let start = skip_exhausted_start(tree, start, end.node);
        let parent = tree.parent(start.node).ok_or(ApplyError::PartialElement)?;

        if start.node == end.node {
            if start.offset >= end.offset {
                return Err(ApplyError::EmptyRange);
            }
        } else {
            if tree.parent(end.node) != Some(parent) {
                return Err(ApplyError::PartialElement);
            }
            let start_index = tree.index_in_parent(start.node).ok_or(ApplyError::PartialElement)?;
            let end_index = tree.index_in_parent(end.node).ok_or(ApplyError::PartialElement)?;
            if start_index > end_index {
                return Err(ApplyError::EmptyRange);
            }
        }
        Ok(Self { parent, start, end })
    }

    /// Moves the contents of the range into `wrapper`, which takes the
    /// range's place.
    fn surround<T: DocumentTreeMut<NodeId = N>>(
        self,
        tree: &mut T,
        wrapper: N,
    ) -> Result<(), DomError> {
        let Self { parent, start, end } = self;

        if start.node == end.node {
            split_after(tree, start.node, end.offset)?;
            let middle = split_before(tree, start.node, start.offset)?;
            tree.insert_before(parent, wrapper, Some(middle))?;
            return tree.append_child(wrapper, middle);
        }

        split_after(tree, end.node, end.offset)?;
        let first = if start.offset >= char_len(tree, start.node) {
            // Start sits at the very end of its node; the range begins with
            // the next sibling.
            tree.children(parent)
                .iter()
                .copied()
                .skip_while(|c| *c != start.node)
                .nth(1)
                .unwrap_or(end.node)
        } else {
            split_before(tree, start.node, start.offset)?
        };
        let contents: Vec<N> = tree
            .children(parent)
            .iter()
            .copied()
            .skip_while(|c| *c != first)
            .take_while(|c| *c != end.node)
            .chain(std::iter::once(end.node))
            .collect();
        tree.insert_before(parent, wrapper, Some(first))?;
        for node in contents {
            tree.append_child(wrapper, node)?;
        }
        Ok(())
    }
}

/// A start at the very end of a text node covers no text from it. While
/// that node sits under a different parent than the end, the range really
/// starts at the next text node in document order.
fn skip_exhausted_start<T: DocumentTree>(
    tree: &T,
    mut start: TextPosition<T::NodeId>,
    end_node: T::NodeId,
) -> TextPosition<T::NodeId> {
    let text_nodes = tree.text_nodes(tree.root());
    while start.node != end_node
        && start.offset >= char_len(tree, start.node)
        && tree.parent(start.node) != tree.parent(end_node)
    {
        let next = text_nodes
            .iter()
            .position(|n| *n == start.node)
            .and_then(|i| text_nodes.get(i + 1));
        match next {
            Some(next) => start = TextPosition::new(*next, 0),
            None => break,
        }
    }
    start
}

/// Removes every marker, keeping its contents, and merges the text it had
/// split. Returns how many markers were removed.
pub fn clear_markers<T: DocumentTreeMut>(tree: &mut T) -> Result<usize, DomError> {
    let found = markers(tree);
    for marker in &found {
        let Some(parent) = tree.parent(*marker) else {
            continue;
        };
        tree.unwrap(*marker)?;
        tree.normalize(parent)?;
    }
    Ok(found.len())
}

/// Unwraps every marker, then applies `highlights` in order. Running it
/// twice leaves the same markers as running it once.
pub fn reapply_all<T: DocumentTreeMut>(
    tree: &mut T,
    highlights: &[HighlightAnnotation],
) -> Result<ReapplyReport, DomError> {
    let mut report = ReapplyReport {
        removed: clear_markers(tree)?,
        ..ReapplyReport::default()
    };
    for highlight in highlights {
        match apply(tree, highlight) {
            Ok(_) => report.applied.push(highlight.id.clone()),
            Err(e) => {
                log::warn!("Skipping highlight {}: {e}", highlight.id);
                report.skipped.push((highlight.id.clone(), e));
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchoring::StructuralPath;
    use crate::dom::{Dom, parse_markup};
    use crate::models::Color;

    fn highlight(id: &str, path: &str, start: usize, end: usize) -> HighlightAnnotation {
        highlight_between(id, path, start, path, end)
    }

    fn highlight_between(
        id: &str,
        start_path: &str,
        start: usize,
        end_path: &str,
        end: usize,
    ) -> HighlightAnnotation {
        let start_path: StructuralPath = start_path.parse().unwrap();
        let end_path: StructuralPath = end_path.parse().unwrap();
        HighlightAnnotation {
            id: id.to_string(),
            color: Color::new("#ff0"),
            start: TextAnchorPoint::new(start_path, start),
            end: TextAnchorPoint::new(end_path, end),
            text: String::new(),
        }
    }

    fn body_html(dom: &Dom) -> String {
        dom.inner_html(dom.body())
    }

    #[test]
    fn test_apply_within_one_text_node() {
        let mut dom = parse_markup("<p>Hello world</p>").unwrap();

        apply(&mut dom, &highlight("hl-1", "html > body > p", 0, 5)).unwrap();

        insta::assert_snapshot!(
            body_html(&dom),
            @r#"<p><span class="web-annotator-highlight" style="background-color: #ff0" data-highlight-id="hl-1">Hello</span> world</p>"#
        );
    }

    #[test]
    fn test_apply_across_siblings_keeps_inner_elements() {
        let mut dom = parse_markup("<p>Hello <b>big</b> world</p>").unwrap();

        apply(&mut dom, &highlight("hl-1", "html > body > p", 2, 12)).unwrap();

        let marker = markers(&dom)[0];
        assert_eq!(dom.inner_html(marker), "llo <b>big</b> wo");
        assert_eq!(dom.text_content(dom.body()), "Hello big world");
    }

    #[test]
    fn test_apply_partial_element_is_rejected_untouched() {
        let mut dom = parse_markup("<p>Hello <b>big</b> world</p>").unwrap();
        let before = body_html(&dom);

        let err = apply(&mut dom, &highlight("hl-1", "html > body > p", 7, 12)).unwrap_err();

        assert_eq!(err, ApplyError::PartialElement);
        assert_eq!(body_html(&dom), before);
    }

    #[test]
    fn test_apply_starting_at_end_of_inner_element() {
        let mut dom = parse_markup("<p>Hello <b>big</b> world</p>").unwrap();

        // Offset 9 is the boundary after "big", which resolves inside <b>.
        let marker = apply(&mut dom, &highlight("hl-1", "html > body > p", 9, 12)).unwrap();

        assert_eq!(dom.inner_html(marker), " wo");
        insta::assert_snapshot!(
            body_html(&dom),
            @r#"<p>Hello <b>big</b><span class="web-annotator-highlight" style="background-color: #ff0" data-highlight-id="hl-1"> wo</span>rld</p>"#
        );
    }

    #[test]
    fn test_apply_from_end_of_text_into_inner_element() {
        let mut dom = parse_markup("<p>Hello <b>big</b> world</p>").unwrap();

        let marker = apply(&mut dom, &highlight("hl-1", "html > body > p", 6, 8)).unwrap();

        assert_eq!(dom.text_content(marker), "bi");
        assert_eq!(dom.tag_name(dom.parent(marker).unwrap()), Some("b"));
    }

    #[test]
    fn test_failed_apply_creates_no_nodes() {
        let mut dom = parse_markup("<p>Hello <b>big</b> world</p>").unwrap();
        let nodes = dom.node_count();

        let err = apply(&mut dom, &highlight("hl-1", "html > body > p", 7, 12)).unwrap_err();
        assert_eq!(err, ApplyError::PartialElement);
        let err = apply(&mut dom, &highlight("hl-2", "html > body > p", 4, 4)).unwrap_err();
        assert_eq!(err, ApplyError::EmptyRange);

        assert_eq!(dom.node_count(), nodes);
    }

    #[test]
    fn test_apply_unresolved_anchor_is_rejected_untouched() {
        let mut dom = parse_markup("<p>Hello</p>").unwrap();
        let before = body_html(&dom);

        let err = apply(&mut dom, &highlight("hl-1", "html > body > article > p", 0, 2)).unwrap_err();

        assert!(matches!(err, ApplyError::Unresolved { which: "start", .. }));
        assert_eq!(body_html(&dom), before);
    }

    #[test]
    fn test_apply_same_id_twice_is_rejected() {
        let mut dom = parse_markup("<p>Hello world</p>").unwrap();
        let h = highlight("hl-1", "html > body > p", 0, 5);
        apply(&mut dom, &h).unwrap();

        assert_eq!(
            apply(&mut dom, &h),
            Err(ApplyError::AlreadyApplied("hl-1".to_string()))
        );
        assert_eq!(markers(&dom).len(), 1);
    }

    #[test]
    fn test_apply_empty_range_is_rejected() {
        let mut dom = parse_markup("<p>Hello world</p>").unwrap();
        assert_eq!(
            apply(&mut dom, &highlight("hl-1", "html > body > p", 3, 3)),
            Err(ApplyError::EmptyRange)
        );
        assert!(markers(&dom).is_empty());
    }

    #[test]
    fn test_second_highlight_offsets_count_through_first_marker() {
        let mut dom = parse_markup("<p>Hello brave new world</p>").unwrap();
        apply(&mut dom, &highlight("hl-1", "html > body > p", 0, 5)).unwrap();

        apply(&mut dom, &highlight("hl-2", "html > body > p", 12, 15)).unwrap();

        let found = markers(&dom);
        assert_eq!(dom.text_content(found[0]), "Hello");
        assert_eq!(dom.text_content(found[1]), "new");
    }

    #[test]
    fn test_reapply_all_is_idempotent() {
        let mut dom = parse_markup("<p>one two</p><p>three four</p>").unwrap();
        let highlights = vec![
            highlight("hl-1", "html > body > p:nth-of-type(1)", 0, 3),
            highlight("hl-2", "html > body > p:nth-of-type(2)", 6, 10),
        ];

        let first = reapply_all(&mut dom, &highlights).unwrap();
        let once = body_html(&dom);
        let second = reapply_all(&mut dom, &highlights).unwrap();

        assert_eq!(first.applied, vec!["hl-1", "hl-2"]);
        assert_eq!(first.removed, 0);
        assert_eq!(second.removed, 2);
        assert_eq!(body_html(&dom), once);
        assert_eq!(markers(&dom).len(), 2);
    }

    #[test]
    fn test_reapply_all_skips_stale_anchor_and_continues() {
        let mut dom = parse_markup("<p>only paragraph</p>").unwrap();
        let highlights = vec![
            highlight("hl-stale", "html > body > p:nth-of-type(3)", 0, 3),
            highlight("hl-ok", "html > body > p", 0, 4),
        ];

        let report = reapply_all(&mut dom, &highlights).unwrap();

        assert_eq!(report.applied, vec!["hl-ok"]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].0, "hl-stale");
    }

    #[test]
    fn test_clear_markers_restores_merged_text() {
        let mut dom = parse_markup("<p>Hello world</p>").unwrap();
        apply(&mut dom, &highlight("hl-1", "html > body > p", 3, 8)).unwrap();
        let p = dom.elements_by_tag("p")[0];
        assert_eq!(dom.children(p).len(), 3);

        assert_eq!(clear_markers(&mut dom).unwrap(), 1);

        assert_eq!(body_html(&dom), "<p>Hello world</p>");
        assert_eq!(dom.children(p).len(), 1);
    }

    #[test]
    fn test_closest_marker_finds_enclosing_marker() {
        let mut dom = parse_markup("<p>Hello world</p>").unwrap();
        let marker = apply(&mut dom, &highlight("hl-1", "html > body > p", 0, 5)).unwrap();
        let inside = dom.text_nodes(marker)[0];
        let p = dom.elements_by_tag("p")[0];
        let outside = *dom.text_nodes(p).last().unwrap();

        assert_eq!(closest_marker(&dom, inside), Some(marker));
        assert_eq!(closest_marker(&dom, outside), None);
    }

    #[test]
    fn test_highlight_between_different_elements() {
        let mut dom = parse_markup("<p>one</p><p>two</p>").unwrap();
        let h = highlight_between(
            "hl-1",
            "html > body > p:nth-of-type(1)",
            1,
            "html > body > p:nth-of-type(2)",
            2,
        );
        assert_eq!(apply(&mut dom, &h), Err(ApplyError::PartialElement));
    }
}
