//! HTML parser – converts an HTML string into a simple DOM tree.
//!
//! Forgiving by construction: void elements never take children, `<style>`
//! and `<script>` bodies are raw text, stray closing tags are dropped and
//! unclosed elements end where an ancestor closes.

use std::collections::HashMap;

use crate::css::unescape_entities;

// ---------------------------------------------------------------------------
// DOM types
// ---------------------------------------------------------------------------

/// The tag name of an element, as far as the renderer cares.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Html,
    Head,
    Body,
    Title,
    Style,
    Script,
    Meta,
    Link,
    Div,
    P,
    /// `h1`–`h6`.
    Heading(u8),
    Ul,
    Ol,
    Li,
    Table,
    Tr,
    Td,
    Th,
    Img,
    Br,
    Hr,
    Pre,
    Span,
    Strong,
    Em,
    U,
    A,
    Code,
    /// Block-level container without special rendering (section, header…).
    Block(String),
    /// Anything else – treated as an inline wrapper.
    Unknown(String),
}

const GENERIC_BLOCKS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "caption",
    "center",
    "dd",
    "dl",
    "dt",
    "figcaption",
    "figure",
    "footer",
    "form",
    "header",
    "main",
    "nav",
    "section",
    "tbody",
    "tfoot",
    "thead",
];

impl Tag {
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        match lower.as_str() {
            "html" => Tag::Html,
            "head" => Tag::Head,
            "body" => Tag::Body,
            "title" => Tag::Title,
            "style" => Tag::Style,
            "script" => Tag::Script,
            "meta" => Tag::Meta,
            "link" => Tag::Link,
            "div" => Tag::Div,
            "p" => Tag::P,
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                Tag::Heading(lower.as_bytes()[1] - b'0')
            }
            "ul" => Tag::Ul,
            "ol" => Tag::Ol,
            "li" => Tag::Li,
            "table" => Tag::Table,
            "tr" => Tag::Tr,
            "td" => Tag::Td,
            "th" => Tag::Th,
            "img" => Tag::Img,
            "br" => Tag::Br,
            "hr" => Tag::Hr,
            "pre" => Tag::Pre,
            "span" => Tag::Span,
            "strong" | "b" => Tag::Strong,
            "em" | "i" => Tag::Em,
            "u" => Tag::U,
            "a" => Tag::A,
            "code" | "tt" | "kbd" | "samp" => Tag::Code,
            _ if GENERIC_BLOCKS.contains(&lower.as_str()) => Tag::Block(lower),
            _ => Tag::Unknown(lower),
        }
    }

    /// Elements that never have content or a closing tag.
    pub fn is_void(&self) -> bool {
        matches!(self, Tag::Meta | Tag::Link | Tag::Img | Tag::Br | Tag::Hr)
            || matches!(self, Tag::Unknown(n) if matches!(n.as_str(), "input" | "col" | "source" | "wbr" | "base" | "area" | "embed" | "param" | "track"))
    }

    /// Elements whose content is raw text, not markup.
    pub fn is_raw_text(&self) -> bool {
        matches!(self, Tag::Style | Tag::Script | Tag::Title)
    }

    /// Elements that produce nothing on the page.
    pub fn is_hidden(&self) -> bool {
        matches!(
            self,
            Tag::Head | Tag::Title | Tag::Style | Tag::Script | Tag::Meta | Tag::Link
        )
    }

    pub fn is_block(&self) -> bool {
        matches!(
            self,
            Tag::Html
                | Tag::Body
                | Tag::Div
                | Tag::P
                | Tag::Heading(_)
                | Tag::Ul
                | Tag::Ol
                | Tag::Li
                | Tag::Table
                | Tag::Tr
                | Tag::Td
                | Tag::Th
                | Tag::Img
                | Tag::Hr
                | Tag::Pre
                | Tag::Block(_)
        )
    }
}

/// A node in our DOM tree.
#[derive(Debug, Clone, PartialEq)]
pub enum DomNode {
    Element(ElementNode),
    Text(String),
}

/// An element node carrying tag, attributes, and children.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    pub tag: Tag,
    /// Attribute names are lower-cased.
    pub attributes: HashMap<String, String>,
    pub children: Vec<DomNode>,
}

impl ElementNode {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn inline_style(&self) -> Option<&str> {
        self.attr("style")
    }

    pub fn src(&self) -> Option<&str> {
        self.attr("src")
    }

    /// Concatenated text of all descendants (raw, whitespace untouched).
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

fn collect_text(nodes: &[DomNode], out: &mut String) {
    for node in nodes {
        match node {
            DomNode::Text(t) => out.push_str(t),
            DomNode::Element(e) if e.tag == Tag::Br => out.push('\n'),
            DomNode::Element(e) if !e.tag.is_hidden() => collect_text(&e.children, out),
            DomNode::Element(_) => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Parser – recursive descent over HTML
// ---------------------------------------------------------------------------

/// Parse an HTML string into a list of DOM nodes. Never fails.
pub fn parse_html(html: &str) -> Vec<DomNode> {
    let mut parser = Parser::new(html);
    let mut nodes = Vec::new();
    while !parser.eof() {
        nodes.extend(parser.parse_nodes());
        if parser.starts_with("</") {
            // Closing tag with no open element.
            parser.skip_closing_tag();
        }
    }
    nodes
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    /// Lower-cased names of the currently open elements.
    open: Vec<String>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            open: Vec::new(),
        }
    }

    fn parse_nodes(&mut self) -> Vec<DomNode> {
        let mut nodes = Vec::new();
        loop {
            if self.eof() {
                break;
            }
            if self.starts_with("</") {
                let name = self.peek_closing_name();
                if self.open.iter().any(|open| *open == name) {
                    break;
                }
                if self.open.is_empty() {
                    break;
                }
                log::debug!("dropping stray </{name}>");
                self.skip_closing_tag();
                continue;
            }
            if let Some(node) = self.parse_node() {
                nodes.push(node);
            }
        }
        nodes
    }

    fn parse_node(&mut self) -> Option<DomNode> {
        if self.starts_with("<!--") {
            self.skip_past("-->");
            return None;
        }
        if self.starts_with("<!") || self.starts_with("<?") {
            self.skip_past(">");
            return None;
        }
        let opens_tag = self.starts_with("<")
            && self.input[self.pos + 1..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic());
        if opens_tag {
            Some(self.parse_element())
        } else {
            self.parse_text()
        }
    }

    fn parse_text(&mut self) -> Option<DomNode> {
        let start = self.pos;
        // A lone '<' that does not open a tag is text.
        self.advance_char();
        while !self.eof() && !self.starts_with("<") {
            self.advance_char();
        }
        let text = &self.input[start..self.pos];
        Some(DomNode::Text(unescape_entities(text)))
    }

    fn parse_element(&mut self) -> DomNode {
        self.pos += 1; // '<'
        let name = self.parse_name();
        let tag = Tag::from_name(&name);
        let mut elem = ElementNode::new(tag);

        loop {
            self.skip_whitespace();
            if self.eof() || self.starts_with(">") || self.starts_with("/>") {
                break;
            }
            if self.starts_with("/") {
                self.pos += 1;
                continue;
            }
            match self.parse_attribute() {
                Some((key, value)) => {
                    elem.attributes.entry(key).or_insert(value);
                }
                None => self.advance_char(),
            }
        }

        let self_closed = self.starts_with("/>");
        if self_closed {
            self.pos += 2;
        } else if self.starts_with(">") {
            self.pos += 1;
        }
        if self_closed || elem.tag.is_void() {
            return DomNode::Element(elem);
        }

        let lower = name.to_ascii_lowercase();
        if elem.tag.is_raw_text() {
            let end = self.find_ci(&format!("</{lower}")).unwrap_or(self.input.len());
            let raw = &self.input[self.pos..end];
            if !raw.is_empty() {
                let text = if elem.tag == Tag::Title {
                    unescape_entities(raw)
                } else {
                    raw.to_string()
                };
                elem.children.push(DomNode::Text(text));
            }
            self.pos = end;
            if !self.eof() {
                self.skip_closing_tag();
            }
            return DomNode::Element(elem);
        }

        self.open.push(lower.clone());
        elem.children = self.parse_nodes();
        self.open.pop();

        // Only consume our own closing tag; an ancestor's one closes us
        // implicitly and is left for the ancestor.
        if self.starts_with("</") && self.peek_closing_name() == lower {
            self.skip_closing_tag();
        }
        DomNode::Element(elem)
    }

    fn parse_name(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.current_char() {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == ':' {
                self.advance_char();
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn parse_attribute(&mut self) -> Option<(String, String)> {
        let key = self.parse_name().to_ascii_lowercase();
        if key.is_empty() {
            return None;
        }
        self.skip_whitespace();
        if !self.starts_with("=") {
            return Some((key, String::new()));
        }
        self.pos += 1;
        self.skip_whitespace();
        Some((key, self.parse_attr_value()))
    }

    fn parse_attr_value(&mut self) -> String {
        for quote in ['"', '\''] {
            if self.current_char() == Some(quote) {
                self.pos += 1;
                let start = self.pos;
                let end = self.input[start..]
                    .find(quote)
                    .map_or(self.input.len(), |i| start + i);
                self.pos = (end + 1).min(self.input.len());
                return unescape_entities(&self.input[start..end]);
            }
        }
        let start = self.pos;
        while let Some(c) = self.current_char() {
            if c.is_whitespace() || c == '>' {
                break;
            }
            self.advance_char();
        }
        unescape_entities(&self.input[start..self.pos])
    }

    fn peek_closing_name(&self) -> String {
        self.input[self.pos + 2..]
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '-' || *c == '_' || *c == ':')
            .collect::<String>()
            .to_ascii_lowercase()
    }

    fn skip_closing_tag(&mut self) {
        self.skip_past(">");
    }

    fn skip_past(&mut self, marker: &str) {
        match self.input[self.pos..].find(marker) {
            Some(i) => self.pos += i + marker.len(),
            None => self.pos = self.input.len(),
        }
    }

    fn find_ci(&self, needle: &str) -> Option<usize> {
        self.input[self.pos..]
            .to_ascii_lowercase()
            .find(needle)
            .map(|i| self.pos + i)
    }

    fn skip_whitespace(&mut self) {
        while self.current_char().is_some_and(char::is_whitespace) {
            self.advance_char();
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance_char(&mut self) {
        if let Some(c) = self.current_char() {
            self.pos += c.len_utf8();
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience helpers
// ---------------------------------------------------------------------------

/// Find the `<body>` element and return its children, or all nodes outside
/// `<head>` if there is no `<body>`.
pub fn body_children(nodes: &[DomNode]) -> Vec<DomNode> {
    fn find_body(nodes: &[DomNode]) -> Option<&ElementNode> {
        nodes.iter().find_map(|node| match node {
            DomNode::Element(e) if e.tag == Tag::Body => Some(e),
            DomNode::Element(e) if e.tag == Tag::Html => find_body(&e.children),
            _ => None,
        })
    }
    if let Some(body) = find_body(nodes) {
        return body.children.clone();
    }
    let mut out = Vec::new();
    for node in nodes {
        match node {
            DomNode::Element(e) if e.tag == Tag::Html => out.extend(body_children(&e.children)),
            DomNode::Element(e) if e.tag.is_hidden() => {}
            other => out.push(other.clone()),
        }
    }
    out
}

/// Raw text of every `<style>` element, in document order.
pub fn stylesheets(nodes: &[DomNode]) -> Vec<String> {
    let mut out = Vec::new();
    for node in nodes {
        if let DomNode::Element(e) = node {
            if e.tag == Tag::Style {
                out.push(e.text_content());
            } else {
                out.extend(stylesheets(&e.children));
            }
        }
    }
    out
}
