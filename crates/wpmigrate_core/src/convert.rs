use std::collections::HashMap;

use html2md::quotes::QuoteHandler;
use html2md::{StructuredPrinter, TagHandler, TagHandlerFactory};
use markup5ever_rcdom::{Handle, NodeData};

use crate::filename::base_name;

/// Generic HTML→Markdown engine applied to one subtree at a time.
pub trait Converter: Send + Sync {
    fn to_markdown(&self, html: &str) -> String;
}

/// `html2md` with paragraph, line-break, image and quote rules replaced so
/// that spacing stays deterministic.
#[derive(Debug, Default, Clone, Copy)]
pub struct Html2MdConverter;

impl Converter for Html2MdConverter {
    fn to_markdown(&self, html: &str) -> String {
        html2md::parse_html_custom(html, &custom_handlers())
    }
}

fn custom_handlers() -> HashMap<String, Box<dyn TagHandlerFactory>> {
    let mut handlers: HashMap<String, Box<dyn TagHandlerFactory>> = HashMap::new();
    handlers.insert("p".to_string(), Box::new(ParagraphHandlerFactory));
    handlers.insert("figcaption".to_string(), Box::new(ParagraphHandlerFactory));
    handlers.insert("br".to_string(), Box::new(LineBreakHandlerFactory));
    handlers.insert("img".to_string(), Box::new(ImageHandlerFactory));
    handlers.insert("blockquote".to_string(), Box::new(BlockquoteHandlerFactory));
    handlers
}

/// `![alt](src)` followed by a blank line. Alt falls back to the file's base
/// name; no `src` means no image.
pub fn image_markdown(alt: Option<&str>, src: Option<&str>) -> Option<String> {
    let src = src.map(str::trim).filter(|s| !s.is_empty())?;
    let alt = alt
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| base_name(src));
    Some(format!("![{}]({src})\n\n", escape_label(alt)))
}

/// `[Video: name](src)` followed by a blank line.
pub fn video_markdown(src: &str) -> String {
    format!("[Video: {}]({src})\n\n", escape_label(base_name(src)))
}

fn escape_label(label: &str) -> String {
    label.replace('[', "\\[").replace(']', "\\]")
}

/// Paragraph content collapses to its trimmed text; empty paragraphs vanish.
#[derive(Default)]
struct ParagraphHandler {
    start: usize,
}

impl TagHandler for ParagraphHandler {
    fn handle(&mut self, _tag: &Handle, printer: &mut StructuredPrinter) {
        self.start = printer.data.len();
    }

    fn after_handle(&mut self, printer: &mut StructuredPrinter) {
        if self.start > printer.data.len() || !printer.data.is_char_boundary(self.start) {
            return;
        }
        let content = printer.data[self.start..].trim().to_string();
        printer.data.truncate(self.start);
        if content.is_empty() {
            return;
        }
        if !printer.data.is_empty() && !printer.data.ends_with('\n') {
            printer.data.push_str("\n\n");
        }
        printer.data.push_str(&content);
        printer.data.push_str("\n\n");
    }
}

struct ParagraphHandlerFactory;

impl TagHandlerFactory for ParagraphHandlerFactory {
    fn instantiate(&self) -> Box<dyn TagHandler> {
        Box::new(ParagraphHandler::default())
    }
}

struct LineBreakHandler;

impl TagHandler for LineBreakHandler {
    fn handle(&mut self, _tag: &Handle, printer: &mut StructuredPrinter) {
        printer.data.push('\n');
    }

    fn after_handle(&mut self, _printer: &mut StructuredPrinter) {}
}

struct LineBreakHandlerFactory;

impl TagHandlerFactory for LineBreakHandlerFactory {
    fn instantiate(&self) -> Box<dyn TagHandler> {
        Box::new(LineBreakHandler)
    }
}

struct ImageHandler;

impl TagHandler for ImageHandler {
    fn handle(&mut self, tag: &Handle, printer: &mut StructuredPrinter) {
        let NodeData::Element { ref attrs, .. } = tag.data else {
            return;
        };
        let attrs = attrs.borrow();
        let find = |name: &str| {
            attrs
                .iter()
                .find(|a| &*a.name.local == name)
                .map(|a| a.value.to_string())
        };
        let Some(markdown) = image_markdown(find("alt").as_deref(), find("src").as_deref()) else {
            return;
        };
        // Link text cannot span a blank line.
        if printer.parent_chain.iter().any(|tag| tag == "a") {
            printer.data.push_str(markdown.trim_end());
        } else {
            printer.data.push_str(&markdown);
        }
    }

    fn after_handle(&mut self, _printer: &mut StructuredPrinter) {}
}

struct ImageHandlerFactory;

impl TagHandlerFactory for ImageHandlerFactory {
    fn instantiate(&self) -> Box<dyn TagHandler> {
        Box::new(ImageHandler)
    }
}

/// html2md's quote rule, minus the bare `>` lines it leaves after the last
/// quoted paragraph.
#[derive(Default)]
struct BlockquoteHandler {
    inner: QuoteHandler,
    start: usize,
}

impl TagHandler for BlockquoteHandler {
    fn handle(&mut self, tag: &Handle, printer: &mut StructuredPrinter) {
        self.start = printer.data.len();
        self.inner.handle(tag, printer);
    }

    fn after_handle(&mut self, printer: &mut StructuredPrinter) {
        self.inner.after_handle(printer);
        if self.start > printer.data.len() || !printer.data.is_char_boundary(self.start) {
            return;
        }
        let quote = printer.data.split_off(self.start);
        let mut lines: Vec<&str> = quote.trim_end().lines().collect();
        while lines
            .last()
            .is_some_and(|line| line.trim().chars().all(|c| c == '>'))
        {
            lines.pop();
        }
        printer.data.push_str(&lines.join("\n"));
        printer.data.push_str("\n\n");
    }
}

struct BlockquoteHandlerFactory;

impl TagHandlerFactory for BlockquoteHandlerFactory {
    fn instantiate(&self) -> Box<dyn TagHandler> {
        Box::new(BlockquoteHandler::default())
    }
}
