//! Minimal element tree used as the preview surface.
//!
//! The preview is built as a tree of elements and text nodes, serialised to HTML for the
//! browser and inspected directly by the export pipeline and tests.

use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    tag: &'static str,
    attrs: Vec<(&'static str, String)>,
    children: Vec<Node>,
}

/// Elements that never have children or a closing tag.
const VOID_TAGS: &[&str] = &["img", "input", "br", "hr", "meta"];

impl Element {
    pub fn new(tag: &'static str) -> Self {
        Self {
            tag,
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    // ── Builders ────────────────────────────────────────────────────────────

    pub fn attr(mut self, name: &'static str, value: impl Into<String>) -> Self {
        let value = value.into();
        match self.attrs.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name, value)),
        }
        self
    }

    pub fn class(self, class: impl Into<String>) -> Self {
        self.attr("class", class)
    }

    pub fn child(mut self, node: impl Into<Node>) -> Self {
        self.children.push(node.into());
        self
    }

    /// Appends a text node. Empty strings still produce a node so text order is stable.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn children_from<I>(mut self, nodes: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Node>,
    {
        self.children.extend(nodes.into_iter().map(Into::into));
        self
    }

    // ── Reads ───────────────────────────────────────────────────────────────

    pub fn tag(&self) -> &'static str {
        self.tag
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.get_attr("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// All text nodes below this element, in document order.
    pub fn text_nodes(&self) -> Vec<&str> {
        let mut out = Vec::new();
        collect_text(self, &mut out);
        out
    }

    /// Concatenated text content, like the DOM's `textContent`.
    pub fn text_content(&self) -> String {
        self.text_nodes().concat()
    }

    /// Depth-first search, this element included.
    pub fn find(&self, pred: &dyn Fn(&Element) -> bool) -> Option<&Element> {
        if pred(self) {
            return Some(self);
        }
        self.children.iter().find_map(|child| match child {
            Node::Element(el) => el.find(pred),
            Node::Text(_) => None,
        })
    }

    pub fn find_all(&self, pred: &dyn Fn(&Element) -> bool) -> Vec<&Element> {
        let mut out = Vec::new();
        collect_matching(self, pred, &mut out);
        out
    }

    // ── Serialisation ───────────────────────────────────────────────────────

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        write_element(self, &mut out);
        out
    }
}

fn collect_text<'a>(el: &'a Element, out: &mut Vec<&'a str>) {
    for child in &el.children {
        match child {
            Node::Text(text) => out.push(text),
            Node::Element(inner) => collect_text(inner, out),
        }
    }
}

fn collect_matching<'a>(el: &'a Element, pred: &dyn Fn(&Element) -> bool, out: &mut Vec<&'a Element>) {
    if pred(el) {
        out.push(el);
    }
    for child in &el.children {
        if let Node::Element(inner) = child {
            collect_matching(inner, pred, out);
        }
    }
}

fn write_element(el: &Element, out: &mut String) {
    out.push('<');
    out.push_str(el.tag);
    for (name, value) in &el.attrs {
        // Writing into a String cannot fail.
        let _ = write!(out, " {name}=\"{}\"", escape(value));
    }
    out.push('>');

    if VOID_TAGS.contains(&el.tag) {
        return;
    }

    for child in &el.children {
        match child {
            Node::Text(text) => out.push_str(&escape(text)),
            Node::Element(inner) => write_element(inner, out),
        }
    }
    let _ = write!(out, "</{}>", el.tag);
}

/// Escapes text for use in both element content and double-quoted attributes.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn make_tree() -> Element {
        Element::new("section")
            .class("cv-section experience")
            .child(Element::new("h2").text("Experience"))
            .child(
                Element::new("ul")
                    .child(Element::new("li").attr("data-key", "#1").text("Shipped <X>"))
                    .child(Element::new("li").attr("data-key", "#2").text("Cut \"costs\"")),
            )
            .child(Element::new("img").attr("src", "logo.png"))
    }

    #[test]
    fn test_to_html_escapes_text_and_attributes() {
        let html = Element::new("p")
            .attr("title", "a \"quoted\" & <b>")
            .text("Babbage & Co <ltd>")
            .to_html();
        assert_eq!(
            html,
            "<p title=\"a &quot;quoted&quot; &amp; &lt;b&gt;\">Babbage &amp; Co &lt;ltd&gt;</p>"
        );
    }

    #[test]
    fn test_void_elements_have_no_closing_tag() {
        let html = make_tree().to_html();
        assert!(html.contains("<img src=\"logo.png\">"));
        assert!(!html.contains("</img>"));
        assert!(html.ends_with("</section>"));
    }

    #[test]
    fn test_text_nodes_in_document_order() {
        let tree = make_tree();
        assert_eq!(
            tree.text_nodes(),
            vec!["Experience", "Shipped <X>", "Cut \"costs\""]
        );
        assert_eq!(tree.text_content(), "ExperienceShipped <X>Cut \"costs\"");
    }

    #[test]
    fn test_attr_overwrites_existing_value() {
        let el = Element::new("div").class("a").class("b");
        assert_eq!(el.get_attr("class"), Some("b"));
        assert!(el.has_class("b"));
        assert!(!el.has_class("a"));
    }

    #[test]
    fn test_find_and_find_all() {
        let tree = make_tree();
        let second = tree
            .find(&|el| el.get_attr("data-key") == Some("#2"))
            .unwrap();
        assert_eq!(second.text_content(), "Cut \"costs\"");
        assert_eq!(tree.find_all(&|el| el.tag() == "li").len(), 2);
        assert!(tree.find(&|el| el.tag() == "table").is_none());
        assert!(tree.has_class("experience"));
    }
}
