//! Content Transformer: rewritten fragment → Markdown, one top-level block at a time.
use wpmigrate_logging::migrate_trace;

use crate::convert::{image_markdown, video_markdown, Converter, Html2MdConverter};
use crate::fragment::{ElementNode, Fragment, FragmentNode, ParseError, NON_VISIBLE_ELEMENTS};

const GALLERY_CLASS: &str = "wp-block-gallery";
const VIDEO_CLASS: &str = "wp-block-video";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Gallery,
    Video,
    Paragraph,
    LineBreak,
    Image,
    Hidden,
    Generic,
}

fn classify(element: &ElementNode) -> Block {
    if element.has_class(GALLERY_CLASS) {
        Block::Gallery
    } else if element.is("video") || element.has_class(VIDEO_CLASS) {
        Block::Video
    } else if element.is("p") {
        Block::Paragraph
    } else if element.is("br") {
        Block::LineBreak
    } else if element.is("img") {
        Block::Image
    } else if NON_VISIBLE_ELEMENTS.contains(&element.tag.as_str()) {
        Block::Hidden
    } else {
        Block::Generic
    }
}

pub struct ContentTransformer {
    converter: Box<dyn Converter>,
}

impl Default for ContentTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentTransformer {
    pub fn new() -> Self {
        Self::with_converter(Box::new(Html2MdConverter))
    }

    pub fn with_converter(converter: Box<dyn Converter>) -> Self {
        Self { converter }
    }

    /// Converts every top-level node in order and joins the chunks.
    pub fn to_markdown(&self, fragment: &Fragment) -> String {
        let mut out = String::new();
        for node in fragment.nodes() {
            match node {
                FragmentNode::Text(text) => push_paragraph(&mut out, text),
                FragmentNode::Element(element) => self.push_element(&mut out, element),
            }
        }
        out.trim().to_string()
    }

    pub fn html_to_markdown(&self, html: &str) -> Result<String, ParseError> {
        Ok(self.to_markdown(&Fragment::parse(html)?))
    }

    fn push_element(&self, out: &mut String, element: &ElementNode) {
        let block = classify(element);
        migrate_trace!("converting <{}> as {:?}", element.tag, block);
        match block {
            Block::Gallery => {
                for image in element.descendants().filter(|el| el.is("img")) {
                    push_image(out, image);
                }
            }
            Block::Video => {
                if let Some(src) = video_source(element) {
                    out.push_str(&video_markdown(src));
                }
            }
            Block::Paragraph => {
                let content = self.converter.to_markdown(&element.inner_html());
                push_paragraph(out, &content);
            }
            Block::LineBreak => out.push('\n'),
            Block::Image => push_image(out, element),
            Block::Hidden => {}
            Block::Generic => {
                let converted = self.converter.to_markdown(&element.outer_html());
                if converted.trim().is_empty() {
                    // Container-only markup: keep the visible text rather than dropping it.
                    push_paragraph(out, &element.text_content());
                } else {
                    out.push_str(&converted);
                    if !converted.ends_with('\n') {
                        out.push('\n');
                    }
                }
            }
        }
    }
}

fn push_paragraph(out: &mut String, text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    out.push_str(text);
    out.push_str("\n\n");
}

fn push_image(out: &mut String, image: &ElementNode) {
    if let Some(markdown) = image_markdown(image.attr("alt"), image.attr("src")) {
        out.push_str(&markdown);
    }
}

/// The element's own `src`, else the first `<source>` that has one.
fn video_source(block: &ElementNode) -> Option<&str> {
    let video = if block.is("video") {
        block
    } else {
        block.find_first("video")?
    };
    video.non_empty_attr("src").or_else(|| {
        video
            .descendants()
            .filter(|el| el.is("source"))
            .find_map(|el| el.non_empty_attr("src"))
    })
}
