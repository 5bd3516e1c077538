use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::dom::DocumentTree;

/// Characters that would otherwise end an id inside a selector.
static ID_SPECIAL_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([:.\[\],=@>\\])").expect("valid id escape pattern"));

const NTH_OF_TYPE: &str = ":nth-of-type(";
const SEPARATOR: char = '>';

/// One step of a [`StructuralPath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    pub tag_name: String,
    /// 1-based position among same-tag siblings; `None` when unique.
    pub nth_of_type: Option<usize>,
    /// Set on an identified element, which always starts the path.
    pub id: Option<String>,
}

impl PathSegment {
    pub fn tag(tag_name: &str) -> Self {
        Self {
            tag_name: tag_name.to_string(),
            nth_of_type: None,
            id: None,
        }
    }

    pub fn nth(tag_name: &str, nth_of_type: usize) -> Self {
        Self {
            nth_of_type: Some(nth_of_type),
            ..Self::tag(tag_name)
        }
    }

    pub fn with_id(tag_name: &str, id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            ..Self::tag(tag_name)
        }
    }

    fn matches<T: DocumentTree>(&self, tree: &T, node: T::NodeId) -> bool {
        if tree.tag_name(node) != Some(self.tag_name.as_str()) {
            return false;
        }
        if let Some(id) = &self.id
            && tree.element_id(node) != Some(id.as_str())
        {
            return false;
        }
        match self.nth_of_type {
            Some(nth) => nth_of_type(tree, node) == nth,
            None => true,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag_name)?;
        if let Some(id) = &self.id {
            write!(f, "#{}", ID_SPECIAL_CHARS.replace_all(id, r"\$1"))?;
        }
        if let Some(nth) = self.nth_of_type {
            write!(f, "{NTH_OF_TYPE}{nth})")?;
        }
        Ok(())
    }
}

/// Root-to-element chain of segments identifying one element structurally.
///
/// The string form is a child-combinator selector such as
/// `html > body > div:nth-of-type(2) > p` or `section#intro > p`.
///
/// Deserializing never fails: stored text that does not parse is kept
/// verbatim, written back unchanged and matches no element.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct StructuralPath {
    segments: Vec<PathSegment>,
    unparsed: Option<String>,
}

impl StructuralPath {
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self {
            segments,
            unparsed: None,
        }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The original text of a stored path that could not be parsed.
    pub fn unparsed(&self) -> Option<&str> {
        self.unparsed.as_deref()
    }
}

impl fmt::Display for StructuralPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(raw) = &self.unparsed {
            return f.write_str(raw);
        }
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, " {SEPARATOR} ")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PathParseError {
    #[error("Empty structural path")]
    Empty,
    #[error("Empty segment at position {0}")]
    EmptySegment(usize),
    #[error("Invalid segment '{0}'")]
    InvalidSegment(String),
}

impl FromStr for StructuralPath {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(PathParseError::Empty);
        }
        split_unescaped(s, SEPARATOR)
            .into_iter()
            .enumerate()
            .map(|(i, raw)| {
                let raw = raw.trim();
                if raw.is_empty() {
                    Err(PathParseError::EmptySegment(i))
                } else {
                    parse_segment(raw)
                }
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }
}

impl From<String> for StructuralPath {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|e| {
            log::warn!("Keeping unreadable structural path '{value}': {e}");
            Self {
                segments: Vec::new(),
                unparsed: Some(value),
            }
        })
    }
}

impl From<StructuralPath> for String {
    fn from(path: StructuralPath) -> Self {
        path.to_string()
    }
}

fn split_unescaped(s: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            c if c == separator => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

fn parse_segment(raw: &str) -> Result<PathSegment, PathParseError> {
    let invalid = || PathParseError::InvalidSegment(raw.to_string());

    let (head, nth_of_type) = match split_nth_of_type(raw) {
        Some((head, n)) => (head, Some(n.trim().parse::<usize>().map_err(|_| invalid())?)),
        None => (raw, None),
    };
    if nth_of_type == Some(0) {
        return Err(invalid());
    }

    let (tag_name, id) = match head.split_once('#') {
        Some((tag, escaped_id)) => (tag, Some(unescape(escaped_id))),
        None => (head, None),
    };
    if tag_name.is_empty()
        || !tag_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        || id.as_deref() == Some("")
    {
        return Err(invalid());
    }

    Ok(PathSegment {
        tag_name: tag_name.to_ascii_lowercase(),
        nth_of_type,
        id,
    })
}

/// Splits a trailing `:nth-of-type(n)` into the head and `n`. A colon
/// escaped as part of an id does not start the suffix.
fn split_nth_of_type(raw: &str) -> Option<(&str, &str)> {
    let inner = raw.strip_suffix(')')?;
    let at = inner.rfind(NTH_OF_TYPE)?;
    let head = &inner[..at];
    let backslashes = head.chars().rev().take_while(|c| *c == '\\').count();
    (backslashes % 2 == 0).then(|| (head, &inner[at + NTH_OF_TYPE.len()..]))
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// 1-based position of `node` among element siblings with the same tag.
fn nth_of_type<T: DocumentTree>(tree: &T, node: T::NodeId) -> usize {
    let tag = tree.tag_name(node);
    1 + tree
        .preceding_element_siblings(node)
        .into_iter()
        .filter(|s| tree.tag_name(*s) == tag)
        .count()
}

fn has_same_tag_sibling<T: DocumentTree>(tree: &T, node: T::NodeId) -> bool {
    let Some(parent) = tree.parent(node) else {
        return false;
    };
    let tag = tree.tag_name(node);
    tree.children(parent)
        .iter()
        .any(|s| *s != node && tree.tag_name(*s) == tag)
}

/// Encodes `element` as a path from the root (or from the nearest
/// identified ancestor) down to the element.
///
/// Returns `None` when `node` is not an element.
pub fn encode<T: DocumentTree>(tree: &T, node: T::NodeId) -> Option<StructuralPath> {
    if !tree.is_element(node) {
        return None;
    }
    let mut segments = Vec::new();
    let mut current = Some(node);
    while let Some(el) = current.filter(|n| tree.is_element(*n)) {
        let tag = tree.tag_name(el)?;
        if let Some(id) = tree.element_id(el) {
            segments.push(PathSegment::with_id(tag, id));
            break;
        }
        segments.push(if has_same_tag_sibling(tree, el) {
            PathSegment::nth(tag, nth_of_type(tree, el))
        } else {
            PathSegment::tag(tag)
        });
        current = tree.parent(el);
    }
    segments.reverse();
    Some(StructuralPath::new(segments))
}

/// Resolves `path` against the live tree. The first element in document
/// order that satisfies every segment wins; `None` when nothing matches.
pub fn decode<T: DocumentTree>(tree: &T, path: &StructuralPath) -> Option<T::NodeId> {
    let last = path.segments.len().checked_sub(1)?;
    tree.descendants(tree.root())
        .into_iter()
        .find(|n| matches_from(tree, *n, &path.segments, last))
}

fn matches_from<T: DocumentTree>(
    tree: &T,
    node: T::NodeId,
    segments: &[PathSegment],
    index: usize,
) -> bool {
    if !segments[index].matches(tree, node) {
        return false;
    }
    if index == 0 {
        return true;
    }
    tree.parent(node)
        .is_some_and(|parent| matches_from(tree, parent, segments, index - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{DocumentTreeMut, parse_markup};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_only_child_paragraph_has_plain_path() {
        let dom = parse_markup("<p>Hello world</p>").unwrap();
        let p = dom.elements_by_tag("p")[0];

        let path = encode(&dom, p).unwrap();
        assert_eq!(path.to_string(), "html > body > p");
        assert_eq!(
            path.segments(),
            &[
                PathSegment::tag("html"),
                PathSegment::tag("body"),
                PathSegment::tag("p")
            ]
        );
    }

    #[test]
    fn test_second_sibling_gets_ordinal() {
        let dom = parse_markup("<p>one</p><p>two</p>").unwrap();
        let second = dom.elements_by_tag("p")[1];

        let path = encode(&dom, second).unwrap();
        assert_eq!(path.segments()[2], PathSegment::nth("p", 2));
        assert_eq!(path.to_string(), "html > body > p:nth-of-type(2)");
    }

    #[test]
    fn test_ordinal_counts_only_same_tag() {
        let dom = parse_markup("<h1>t</h1><div>a</div><p>x</p><div>b</div>").unwrap();
        let second_div = dom.elements_by_tag("div")[1];
        let p = dom.elements_by_tag("p")[0];

        assert_eq!(
            encode(&dom, second_div).unwrap().to_string(),
            "html > body > div:nth-of-type(2)"
        );
        assert_eq!(encode(&dom, p).unwrap().to_string(), "html > body > p");
    }

    #[test]
    fn test_identifier_short_circuits_ancestors() {
        let dom =
            parse_markup(r#"<div><section id="intro"><p>a</p><p>b</p></section></div>"#).unwrap();
        let p = dom.elements_by_tag("p")[1];

        let path = encode(&dom, p).unwrap();
        assert_eq!(path.to_string(), "section#intro > p:nth-of-type(2)");
        assert_eq!(path.segments()[0].id.as_deref(), Some("intro"));
    }

    #[test]
    fn test_encode_text_node_is_none() {
        let dom = parse_markup("<p>text</p>").unwrap();
        let text = dom.text_nodes(dom.root())[0];
        assert_eq!(encode(&dom, text), None);
    }

    #[test]
    fn test_round_trip_for_every_element() {
        let dom = parse_markup(
            r#"<div><p>a</p><p>b<em>c</em><em>d</em></p></div><div id="x.y"><ul><li>1</li><li>2</li><li>3</li></ul></div><p>tail</p>"#,
        )
        .unwrap();

        for node in dom.descendants(dom.root()) {
            if dom.is_element(node) {
                let path = encode(&dom, node).unwrap();
                assert_eq!(decode(&dom, &path), Some(node), "path {path}");
                let reparsed: StructuralPath = path.to_string().parse().unwrap();
                assert_eq!(reparsed, path);
            }
        }
    }

    #[test]
    fn test_decode_missing_subtree_is_none() {
        let mut dom = parse_markup("<div><p>one</p></div><div><p>two</p></div>").unwrap();
        let target = dom.elements_by_tag("div")[1];
        let path = encode(&dom, dom.elements_by_tag("p")[1]).unwrap();

        dom.detach(target);

        assert_eq!(decode(&dom, &path), None);
    }

    #[test]
    fn test_decode_first_match_wins_on_drift() {
        let dom = parse_markup("<div><p>a</p></div><div><p>b</p></div>").unwrap();
        let path: StructuralPath = "html > body > div > p".parse().unwrap();
        assert_eq!(decode(&dom, &path), Some(dom.elements_by_tag("p")[0]));
    }

    #[test]
    fn test_escaped_id_round_trips_through_string() {
        let path = StructuralPath::new(vec![
            PathSegment::with_id("div", "a:b.c[0]"),
            PathSegment::tag("span"),
        ]);
        let text = path.to_string();
        assert_eq!(text, r"div#a\:b\.c\[0\] > span");
        assert_eq!(text.parse::<StructuralPath>().unwrap(), path);
    }

    #[test]
    fn test_id_resembling_ordinal_round_trips() {
        let path = StructuralPath::new(vec![
            PathSegment::with_id("div", "x:nth-of-type(2)"),
            PathSegment::tag("p"),
        ]);
        let text = path.to_string();
        assert_eq!(text, r"div#x\:nth-of-type(2) > p");
        assert_eq!(text.parse::<StructuralPath>().unwrap(), path);

        let ordinal: StructuralPath = r"li#x\:nth-of-type(2):nth-of-type(3)".parse().unwrap();
        assert_eq!(ordinal.segments()[0].id.as_deref(), Some("x:nth-of-type(2)"));
        assert_eq!(ordinal.segments()[0].nth_of_type, Some(3));
    }

    #[test]
    fn test_id_with_ordinal_decodes_to_element() {
        let dom = parse_markup(r#"<div id="x:nth-of-type(2)"><p>a</p></div>"#).unwrap();
        let p = dom.elements_by_tag("p")[0];

        let path = encode(&dom, p).unwrap();
        let reparsed: StructuralPath = path.to_string().parse().unwrap();

        assert_eq!(decode(&dom, &reparsed), Some(p));
    }

    #[test]
    fn test_unreadable_stored_path_is_kept_verbatim() {
        let dom = parse_markup("<p>a</p>").unwrap();

        let path: StructuralPath = serde_json::from_str(r#""a:hover""#).unwrap();

        assert_eq!(path.unparsed(), Some("a:hover"));
        assert!(path.is_empty());
        assert_eq!(decode(&dom, &path), None);
        assert_eq!(serde_json::to_string(&path).unwrap(), r#""a:hover""#);
    }

    #[test]
    fn test_serde_uses_selector_string() {
        let path: StructuralPath = "html > body > p:nth-of-type(3)".parse().unwrap();
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, r#""html > body > p:nth-of-type(3)""#);
        assert_eq!(serde_json::from_str::<StructuralPath>(&json).unwrap(), path);
    }

    #[rstest]
    #[case::empty("", PathParseError::Empty)]
    #[case::dangling_separator("html > ", PathParseError::EmptySegment(1))]
    #[case::zero_ordinal("p:nth-of-type(0)", PathParseError::InvalidSegment("p:nth-of-type(0)".into()))]
    #[case::bad_ordinal("p:nth-of-type(x)", PathParseError::InvalidSegment("p:nth-of-type(x)".into()))]
    #[case::empty_id("div#", PathParseError::InvalidSegment("div#".into()))]
    #[case::pseudo_class("a:hover", PathParseError::InvalidSegment("a:hover".into()))]
    fn test_invalid_selectors(#[case] input: &str, #[case] expected: PathParseError) {
        assert_eq!(input.parse::<StructuralPath>(), Err(expected));
    }
}
