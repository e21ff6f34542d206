//! Thin helpers over the kuchiki DOM.
//!
//! Nodes are reference counted, so moving a node between documents is just `append` or
//! `insert_before` on the target; both detach the node from its previous parent first.

use std::fmt::Write as _;

use anyhow::anyhow;
use html5ever::{namespace_url, ns, LocalName, QualName};
use kuchiki::traits::*;
use kuchiki::{Attribute, ExpandedName, NodeData, NodeRef};

/// Elements whose content is whitespace sensitive and must be written out verbatim.
const VERBATIM: [&str; 4] = ["pre", "textarea", "script", "style"];

const VOID: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

pub(crate) fn parse_document(html: &str) -> NodeRef {
    kuchiki::parse_html().one(html)
}

/// Parses an HTML snippet and returns its top-level nodes, detached from the parse tree.
pub(crate) fn parse_fragment(html: &str) -> anyhow::Result<Vec<NodeRef>> {
    let document = parse_document(html);
    let body = select_first(&document, "body")?
        .ok_or_else(|| anyhow!("html parser produced no <body>"))?;
    let nodes: Vec<NodeRef> = body.children().collect();
    for node in nodes.iter() {
        node.detach();
    }
    Ok(nodes)
}

pub(crate) fn select_all(node: &NodeRef, selectors: &str) -> anyhow::Result<Vec<NodeRef>> {
    Ok(node
        .select(selectors)
        .map_err(|()| anyhow!("invalid selector: {selectors}"))?
        .map(|element| element.as_node().clone())
        .collect())
}

pub(crate) fn select_first(node: &NodeRef, selectors: &str) -> anyhow::Result<Option<NodeRef>> {
    Ok(select_all(node, selectors)?.into_iter().next())
}

pub(crate) fn new_element(name: &str, attributes: &[(&str, &str)]) -> NodeRef {
    NodeRef::new_element(
        QualName::new(None, ns!(html), LocalName::from(name)),
        attributes.iter().map(|(name, value)| {
            (
                ExpandedName::new(ns!(), LocalName::from(*name)),
                Attribute {
                    prefix: None,
                    value: value.to_string(),
                },
            )
        }),
    )
}

pub(crate) fn tag_name(node: &NodeRef) -> Option<&str> {
    node.as_element().map(|element| &*element.name.local)
}

pub(crate) fn set_attribute(node: &NodeRef, name: &str, value: &str) {
    if let Some(element) = node.as_element() {
        element
            .attributes
            .borrow_mut()
            .insert(name, value.to_string());
    }
}

/// Replaces `node` with an element named `name` carrying the same attributes and children.
///
/// kuchiki element names are immutable, hence the rebuild. Returns the new element.
pub(crate) fn rename(node: &NodeRef, name: &str) -> Option<NodeRef> {
    let attributes = node.as_element()?.attributes.borrow().map.clone();
    let renamed = NodeRef::new_element(
        QualName::new(None, ns!(html), LocalName::from(name)),
        attributes,
    );
    for child in node.children().collect::<Vec<_>>() {
        renamed.append(child);
    }
    node.insert_before(renamed.clone());
    node.detach();
    Some(renamed)
}

/// Puts `node` inside `wrapper`, at the position `node` used to occupy.
pub(crate) fn wrap(node: &NodeRef, wrapper: NodeRef) {
    node.insert_before(wrapper.clone());
    wrapper.append(node.clone());
}

/// Inserts `nodes` as the first children of `parent`, keeping their order.
pub(crate) fn prepend_all(parent: &NodeRef, nodes: impl IntoIterator<Item = NodeRef>) {
    match parent.first_child() {
        Some(first) => nodes.into_iter().for_each(|node| first.insert_before(node)),
        None => nodes.into_iter().for_each(|node| parent.append(node)),
    }
}

pub(crate) fn clear(node: &NodeRef) {
    for child in node.children().collect::<Vec<_>>() {
        child.detach();
    }
}

pub(crate) fn is_blank_text(node: &NodeRef) -> bool {
    node.as_text()
        .map_or(false, |text| text.borrow().trim().is_empty())
}

/// The next sibling that is not whitespace-only text.
pub(crate) fn next_significant_sibling(node: &NodeRef) -> Option<NodeRef> {
    node.following_siblings().find(|sibling| !is_blank_text(sibling))
}

pub(crate) fn to_html(node: &NodeRef) -> anyhow::Result<String> {
    let mut buf = Vec::new();
    node.serialize(&mut buf)?;
    Ok(String::from_utf8(buf)?)
}

/// Serialises with one node per line, indented by one space per depth.
///
/// Whitespace-only text is dropped and other text trimmed, so the output of a re-parsed
/// pretty document is identical to the first one.
pub(crate) fn prettify(node: &NodeRef) -> anyhow::Result<String> {
    let mut out = String::new();
    write_pretty(node, 0, &mut out)?;
    Ok(out)
}

fn write_pretty(node: &NodeRef, depth: usize, out: &mut String) -> anyhow::Result<()> {
    let indent = " ".repeat(depth);
    match node.data() {
        NodeData::Document(_) | NodeData::DocumentFragment => {
            for child in node.children() {
                write_pretty(&child, depth, out)?;
            }
        }
        NodeData::Doctype(doctype) => writeln!(out, "<!DOCTYPE {}>", doctype.name)?,
        NodeData::Text(text) => {
            let text = text.borrow();
            let text = text.trim();
            if !text.is_empty() {
                writeln!(out, "{indent}{}", escape(text, false))?;
            }
        }
        NodeData::Comment(comment) => writeln!(out, "{indent}<!--{}-->", comment.borrow())?,
        NodeData::ProcessingInstruction(_) => {}
        NodeData::Element(element) => {
            let name: &str = &element.name.local;
            if VERBATIM.contains(&name) {
                writeln!(out, "{indent}{}", to_html(node)?)?;
                return Ok(());
            }

            write!(out, "{indent}<{name}")?;
            for (attr_name, attr) in element.attributes.borrow().map.iter() {
                let attr_name: &str = &attr_name.local;
                write!(out, " {attr_name}=\"{}\"", escape(&attr.value, true))?;
            }
            writeln!(out, ">")?;
            if VOID.contains(&name) {
                return Ok(());
            }
            for child in node.children() {
                write_pretty(&child, depth + 1, out)?;
            }
            writeln!(out, "{indent}</{name}>")?;
        }
    }
    Ok(())
}

fn escape(text: &str, attribute: bool) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '\u{a0}' => escaped.push_str("&nbsp;"),
            '"' if attribute => escaped.push_str("&quot;"),
            '<' if !attribute => escaped.push_str("&lt;"),
            '>' if !attribute => escaped.push_str("&gt;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_html(document: &NodeRef) -> String {
        let body = select_first(document, "body").unwrap().unwrap();
        body.children().map(|c| to_html(&c).unwrap()).collect()
    }

    #[test]
    fn fragment_nodes_are_detached() {
        let nodes = parse_fragment("<p>one</p><p>two</p>").unwrap();
        assert_eq!(nodes.len(), 2);
        assert!(nodes.iter().all(|n| n.parent().is_none()));
        assert_eq!(nodes[1].text_contents(), "two");
    }

    #[test]
    fn rename_keeps_attributes_and_children() {
        let document = parse_document(r#"<h1 class="x">Hello <em>you</em></h1>"#);
        let h1 = select_first(&document, "h1").unwrap().unwrap();
        rename(&h1, "h2").unwrap();
        assert_eq!(body_html(&document), r#"<h2 class="x">Hello <em>you</em></h2>"#);
    }

    #[test]
    fn wrap_and_prepend() {
        let document = parse_document("<div><p>a</p></div>");
        let p = select_first(&document, "p").unwrap().unwrap();
        wrap(&p, new_element("div", &[("class", "date")]));
        assert_eq!(
            body_html(&document),
            r#"<div><div class="date"><p>a</p></div></div>"#
        );

        let outer = select_first(&document, "div").unwrap().unwrap();
        prepend_all(&outer, parse_fragment("<i>1</i><i>2</i>").unwrap());
        assert!(body_html(&document).starts_with("<div><i>1</i><i>2</i><div class=\"date\">"));
    }

    #[test]
    fn prettify_is_stable() {
        let source = "<!DOCTYPE html><html><head><title>T &amp; U</title></head>\
            <body><div id=\"a\" class=\"b\"><p>Hi <b>there</b></p><br>\
            <pre>  keep\n   this</pre></div></body></html>";
        let once = prettify(&parse_document(source)).unwrap();
        let twice = prettify(&parse_document(&once)).unwrap();
        assert_eq!(once, twice);
        assert!(once.starts_with("<!DOCTYPE html>\n<html>\n <head>\n  <title>\n   T &amp; U\n"));
        assert!(once.contains("\n  <div class=\"b\" id=\"a\">\n"));
        assert!(once.contains("<pre>  keep\n   this</pre>"));
        assert!(!once.contains("</br>"));
    }
}
