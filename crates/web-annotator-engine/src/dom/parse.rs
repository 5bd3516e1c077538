//! Loads markup through `scraper`'s html5ever tree builder.
//!
//! Malformed input recovers the way a browser would: stray end tags are
//! dropped, unclosed elements are closed and fragments land in `<body>`.

use ego_tree::NodeRef;
use scraper::{Html, node::Element, node::Node};

use super::{DocumentTree, DocumentTreeMut, Dom, DomError, NodeId};

/// Parses `input` into a [`Dom`].
///
/// A full document keeps its own `<html>` element and attributes. Anything
/// else is treated as body content of a fresh document. Comments, doctypes
/// and processing instructions are skipped.
pub fn parse_markup(input: &str) -> Result<Dom, DomError> {
    let document = Html::parse_document(input);
    let html = document.root_element();

    let mut dom = Dom::with_root(html.value().name());
    let root = dom.root();
    copy_attributes(&mut dom, root, html.value())?;
    for child in html.children() {
        // Inter-tag whitespace between head and body.
        if let Node::Text(text) = child.value()
            && text.trim().is_empty()
        {
            continue;
        }
        copy_node(&mut dom, root, child)?;
    }
    Ok(dom)
}

fn copy_node(dom: &mut Dom, parent: NodeId, node: NodeRef<'_, Node>) -> Result<(), DomError> {
    match node.value() {
        Node::Text(text) => {
            let copy = dom.create_text(text);
            dom.append_child(parent, copy)?;
        }
        Node::Element(element) => {
            let copy = dom.create_element(element.name());
            copy_attributes(dom, copy, element)?;
            dom.append_child(parent, copy)?;
            for child in node.children() {
                copy_node(dom, copy, child)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn copy_attributes(dom: &mut Dom, node: NodeId, element: &Element) -> Result<(), DomError> {
    for (name, value) in element.attrs() {
        dom.set_attribute(node, name, value)?;
    }
    Ok(())
}
