//! A minimal XML element tree.
//!
//! The component framework that hosts the MUC engine decodes wire XML; this
//! type is the in-memory representation handed across that boundary. It
//! supports building, inspecting and serializing elements, deliberately not
//! parsing them.

use std::collections::BTreeMap;
use std::fmt;

/// A child node: either a nested element or character data.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Element(Element),
    Text(String),
}

/// An XML element: name, attributes and child nodes.
///
/// Attributes are kept sorted so serialization is deterministic, which keeps
/// assertions in tests stable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attrs: BTreeMap<String, String>,
    children: Vec<Node>,
}

impl Element {
    /// Create an element with the given name and no attributes or children.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Builder: set an attribute.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Builder: append a child element.
    pub fn child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Builder: append character data.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    /// The element name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up an attribute value.
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Set an attribute on an existing element.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(name.into(), value.into());
    }

    /// Remove an attribute, returning its previous value.
    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        self.attrs.remove(name)
    }

    /// The `xmlns` attribute, if set.
    pub fn xmlns(&self) -> Option<&str> {
        self.get_attr("xmlns")
    }

    /// Append a child element.
    pub fn push_child(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Iterate over child elements (skipping character data).
    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    /// First child element with the given name.
    pub fn find_child(&self, name: &str) -> Option<&Element> {
        self.children().find(|el| el.name == name)
    }

    /// First child element with the given name and `xmlns`.
    pub fn find_child_ns(&self, name: &str, xmlns: &str) -> Option<&Element> {
        self.children()
            .find(|el| el.name == name && el.xmlns() == Some(xmlns))
    }

    /// Whether a child with the given name and `xmlns` exists.
    pub fn has_child_ns(&self, name: &str, xmlns: &str) -> bool {
        self.find_child_ns(name, xmlns).is_some()
    }

    /// Remove every child element with the given name and `xmlns`.
    pub fn remove_child_ns(&mut self, name: &str, xmlns: &str) {
        self.children.retain(|node| match node {
            Node::Element(el) => !(el.name == name && el.xmlns() == Some(xmlns)),
            Node::Text(_) => true,
        });
    }

    /// Keep only child elements accepted by `keep`; character data survives.
    pub fn retain_children(&mut self, mut keep: impl FnMut(&Element) -> bool) {
        self.children.retain(|node| match node {
            Node::Element(el) => keep(el),
            Node::Text(_) => true,
        });
    }

    /// Concatenated direct character data of this element.
    pub fn cdata(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            if let Node::Text(text) = node {
                out.push_str(text);
            }
        }
        out
    }

    fn write_escaped(f: &mut fmt::Formatter<'_>, s: &str, attribute: bool) -> fmt::Result {
        for c in s.chars() {
            match c {
                '&' => f.write_str("&amp;")?,
                '<' => f.write_str("&lt;")?,
                '>' => f.write_str("&gt;")?,
                '"' if attribute => f.write_str("&quot;")?,
                '\'' if attribute => f.write_str("&apos;")?,
                c => fmt::Write::write_char(f, c)?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.name)?;
        for (name, value) in &self.attrs {
            write!(f, " {}=\"", name)?;
            Self::write_escaped(f, value, true)?;
            f.write_str("\"")?;
        }
        if self.children.is_empty() {
            return f.write_str("/>");
        }
        f.write_str(">")?;
        for node in &self.children {
            match node {
                Node::Element(el) => el.fmt(f)?,
                Node::Text(text) => Self::write_escaped(f, text, false)?,
            }
        }
        write!(f, "</{}>", self.name)
    }
}
