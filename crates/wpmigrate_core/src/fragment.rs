use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::Html;

/// Deepest element nesting accepted from a post body. The walkers recurse per level.
pub const MAX_NESTING_DEPTH: usize = 256;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "plaintext",
];

/// Elements whose text never counts as visible content.
pub(crate) const NON_VISIBLE_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("fragment nesting exceeds {max} levels")]
    TooDeep { max: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentNode {
    Text(String),
    Element(ElementNode),
}

impl FragmentNode {
    pub fn text(value: impl Into<String>) -> Self {
        FragmentNode::Text(value.into())
    }

    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            FragmentNode::Element(element) => Some(element),
            FragmentNode::Text(_) => None,
        }
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        write_node(self, false, &mut out);
        out
    }
}

/// An element with its attributes in source order. Attribute names are unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementNode {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<FragmentNode>,
}

impl ElementNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: FragmentNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn is(&self, tag: &str) -> bool {
        self.tag.eq_ignore_ascii_case(tag)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Attribute value with surrounding whitespace removed; `None` when missing or blank.
    pub fn non_empty_attr(&self, name: &str) -> Option<&str> {
        self.attr(name).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self
            .attrs
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
        {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.attrs.push((name.to_string(), value.to_string())),
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|classes| classes.split_ascii_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    /// Descendant elements in document order, excluding `self`.
    pub fn descendants(&self) -> Descendants<'_> {
        let mut stack: Vec<&ElementNode> = Vec::new();
        push_child_elements(&self.children, &mut stack);
        Descendants { stack }
    }

    pub fn find_first(&self, tag: &str) -> Option<&ElementNode> {
        self.descendants().find(|el| el.is(tag))
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        if !is_non_visible(&self.tag) {
            for child in &self.children {
                collect_text(child, &mut out);
            }
        }
        out
    }

    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        write_element(self, &mut out);
        out
    }

    pub fn inner_html(&self) -> String {
        let raw = is_raw_text(&self.tag);
        let mut out = String::new();
        for child in &self.children {
            write_node(child, raw, &mut out);
        }
        out
    }

    /// Applies `f` to every descendant element named `tag`.
    pub fn for_each_descendant_mut(&mut self, tag: &str, f: &mut dyn FnMut(&mut ElementNode)) {
        for child in &mut self.children {
            if let FragmentNode::Element(element) = child {
                if element.is(tag) {
                    f(element);
                }
                element.for_each_descendant_mut(tag, f);
            }
        }
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a ElementNode>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a ElementNode;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        push_child_elements(&next.children, &mut self.stack);
        Some(next)
    }
}

fn push_child_elements<'a>(children: &'a [FragmentNode], stack: &mut Vec<&'a ElementNode>) {
    for child in children.iter().rev() {
        if let FragmentNode::Element(element) = child {
            stack.push(element);
        }
    }
}

/// The parsed body of one post: its top-level nodes in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    nodes: Vec<FragmentNode>,
}

impl Fragment {
    /// Parses a post body in body context, so stray `<html>`/`<body>` wrappers
    /// vanish and their children become top-level nodes. Comments are dropped.
    pub fn parse(html: &str) -> Result<Self, ParseError> {
        let document = Html::parse_fragment(html);
        let mut nodes = Vec::new();
        for child in document.tree.root().children() {
            convert_node(child, 0, &mut nodes)?;
        }
        Ok(Self::from_nodes(nodes))
    }

    pub fn from_nodes(nodes: Vec<FragmentNode>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[FragmentNode] {
        &self.nodes
    }

    /// Serializes the top-level nodes back to HTML, trimmed of surrounding whitespace.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            write_node(node, false, &mut out);
        }
        out.trim().to_string()
    }
}

fn convert_node(
    node: NodeRef<'_, Node>,
    depth: usize,
    out: &mut Vec<FragmentNode>,
) -> Result<(), ParseError> {
    if depth > MAX_NESTING_DEPTH {
        return Err(ParseError::TooDeep {
            max: MAX_NESTING_DEPTH,
        });
    }
    match node.value() {
        Node::Text(text) => {
            let text: &str = text;
            match out.last_mut() {
                Some(FragmentNode::Text(prev)) => prev.push_str(text),
                _ => out.push(FragmentNode::text(text)),
            }
        }
        Node::Element(element) => {
            let name = element.name().to_ascii_lowercase();
            // The fragment parser wraps everything in a synthetic <html>.
            if name == "html" && depth == 0 {
                for child in node.children() {
                    convert_node(child, depth, out)?;
                }
                return Ok(());
            }
            let mut converted = ElementNode::new(name);
            for (key, value) in element.attrs() {
                if converted.attr(key).is_none() {
                    converted.attrs.push((key.to_string(), value.to_string()));
                }
            }
            for child in node.children() {
                convert_node(child, depth + 1, &mut converted.children)?;
            }
            out.push(FragmentNode::Element(converted));
        }
        Node::Document | Node::Fragment => {
            for child in node.children() {
                convert_node(child, depth, out)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn collect_text(node: &FragmentNode, out: &mut String) {
    match node {
        FragmentNode::Text(text) => out.push_str(text),
        FragmentNode::Element(element) => {
            if is_non_visible(&element.tag) {
                return;
            }
            for child in &element.children {
                collect_text(child, out);
            }
        }
    }
}

fn write_node(node: &FragmentNode, raw_text: bool, out: &mut String) {
    match node {
        FragmentNode::Text(text) => {
            if raw_text {
                out.push_str(text);
            } else {
                escape_into(text, false, out);
            }
        }
        FragmentNode::Element(element) => write_element(element, out),
    }
}

fn write_element(element: &ElementNode, out: &mut String) {
    out.push('<');
    out.push_str(&element.tag);
    for (key, value) in &element.attrs {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        escape_into(value, true, out);
        out.push('"');
    }
    out.push('>');
    if VOID_ELEMENTS.contains(&element.tag.as_str()) {
        return;
    }
    out.push_str(&element.inner_html());
    out.push_str("</");
    out.push_str(&element.tag);
    out.push('>');
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            '"' if attribute => out.push_str("&quot;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

fn is_raw_text(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&tag)
}

fn is_non_visible(tag: &str) -> bool {
    NON_VISIBLE_ELEMENTS.contains(&tag)
}
