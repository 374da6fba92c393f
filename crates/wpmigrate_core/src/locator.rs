//! Media Locator: picks the best source for one media element, maps it to the
//! original upload and assigns its local destination.
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::filename::media_filename;
use crate::fragment::ElementNode;

pub const IMAGES_AREA: &str = "images";
pub const GALLERIES_AREA: &str = "galleries";
pub const VIDEOS_AREA: &str = "videos";

static SIZE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-\d+x\d+(?:-\d+)?$").expect("valid size suffix regex"));
static SCALED_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-scaled(?:-\d+)?$").expect("valid scaled suffix regex"));

const EMOJI_CLASS: &str = "wp-smiley";
const EMOJI_PATH: &str = "/s.w.org/images/core/emoji/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    GalleryImage,
    Video,
}

impl MediaKind {
    pub fn area(self) -> &'static str {
        match self {
            MediaKind::Image => IMAGES_AREA,
            MediaKind::GalleryImage => GALLERIES_AREA,
            MediaKind::Video => VIDEOS_AREA,
        }
    }
}

/// Where relocated media lives: `{static_root}/{area}/{slug}/{filename}` on disk,
/// `/{area}/{slug}/{filename}` in rewritten content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaLayout {
    static_root: PathBuf,
}

impl MediaLayout {
    pub fn new(static_root: impl Into<PathBuf>) -> Self {
        Self {
            static_root: static_root.into(),
        }
    }

    pub fn static_root(&self) -> &Path {
        &self.static_root
    }

    pub fn area_dirs(&self) -> Vec<PathBuf> {
        [IMAGES_AREA, GALLERIES_AREA, VIDEOS_AREA]
            .iter()
            .map(|area| self.static_root.join(area))
            .collect()
    }

    pub fn destination(&self, kind: MediaKind, slug: &str, filename: &str) -> PathBuf {
        self.static_root.join(kind.area()).join(slug).join(filename)
    }

    pub fn local_path(kind: MediaKind, slug: &str, filename: &str) -> String {
        format!("/{}/{slug}/{filename}", kind.area())
    }
}

/// Per-post inputs to media location.
#[derive(Debug, Clone, Copy)]
pub struct PostContext<'a> {
    pub slug: &'a str,
    /// Used to resolve relative media URLs; usually the post's permalink.
    pub base_url: Option<&'a Url>,
}

impl<'a> PostContext<'a> {
    pub fn new(slug: &'a str) -> Self {
        Self {
            slug,
            base_url: None,
        }
    }

    pub fn with_base(mut self, base_url: Option<&'a Url>) -> Self {
        self.base_url = base_url;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrcsetCandidate {
    pub url: String,
    pub width: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaReference {
    pub kind: MediaKind,
    pub src: Option<String>,
    pub srcset: Vec<SrcsetCandidate>,
    /// Widest candidate, resolved to an absolute URL.
    pub best_url: String,
    /// `best_url` with resize suffixes removed; this is what gets downloaded.
    pub canonical_url: String,
    pub filename: String,
    pub destination: PathBuf,
    pub local_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageDisposition {
    /// Platform emoji glyph: replace by its alt text, or drop it.
    Emoji { alt: Option<String> },
    Relocate(MediaReference),
    /// No usable remote source; leave the element untouched.
    Keep,
}

#[derive(Debug, Clone)]
pub struct MediaLocator {
    layout: MediaLayout,
}

impl MediaLocator {
    pub fn new(layout: MediaLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &MediaLayout {
        &self.layout
    }

    pub fn locate_image(
        &self,
        image: &ElementNode,
        post: &PostContext<'_>,
        in_gallery: bool,
    ) -> ImageDisposition {
        if is_emoji_icon(image.attr("class"), image.attr("src")) {
            let alt = image.non_empty_attr("alt").map(str::to_string);
            return ImageDisposition::Emoji { alt };
        }

        let src = image.non_empty_attr("src");
        let srcset = image.attr("srcset").map(parse_srcset).unwrap_or_default();
        let Some(best) = pick_best_source(src, &srcset) else {
            return ImageDisposition::Keep;
        };
        let Some(best_url) = resolve_media_url(&best, post.base_url) else {
            return ImageDisposition::Keep;
        };

        let kind = if in_gallery {
            MediaKind::GalleryImage
        } else {
            MediaKind::Image
        };
        let canonical_url = to_original_url(best_url.as_str());
        ImageDisposition::Relocate(self.reference(
            kind,
            post.slug,
            src.map(str::to_string),
            srcset,
            best_url.to_string(),
            canonical_url,
        ))
    }

    /// Videos are fetched as published; resize suffixes only apply to images.
    pub fn locate_video(&self, video: &ElementNode, post: &PostContext<'_>) -> Option<MediaReference> {
        let src = video.non_empty_attr("src").or_else(|| {
            video
                .descendants()
                .filter(|el| el.is("source"))
                .find_map(|el| el.non_empty_attr("src"))
        })?;
        let url = resolve_media_url(src, post.base_url)?;
        Some(self.reference(
            MediaKind::Video,
            post.slug,
            Some(src.to_string()),
            Vec::new(),
            url.to_string(),
            url.to_string(),
        ))
    }

    fn reference(
        &self,
        kind: MediaKind,
        slug: &str,
        src: Option<String>,
        srcset: Vec<SrcsetCandidate>,
        best_url: String,
        canonical_url: String,
    ) -> MediaReference {
        let filename = media_filename(&canonical_url);
        MediaReference {
            kind,
            src,
            srcset,
            destination: self.layout.destination(kind, slug, &filename),
            local_path: MediaLayout::local_path(kind, slug, &filename),
            best_url,
            canonical_url,
            filename,
        }
    }

    /// Moves `reference` to `filename` within the same area and slug.
    pub fn rename(&self, reference: MediaReference, slug: &str, filename: String) -> MediaReference {
        MediaReference {
            destination: self.layout.destination(reference.kind, slug, &filename),
            local_path: MediaLayout::local_path(reference.kind, slug, &filename),
            filename,
            ..reference
        }
    }
}

/// Parses `url 300w, url 1024w`. Entries without a `w` descriptor are skipped.
pub fn parse_srcset(srcset: &str) -> Vec<SrcsetCandidate> {
    srcset
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split_whitespace();
            let url = parts.next()?;
            let width = parts.next()?.strip_suffix('w')?.parse::<u32>().ok()?;
            Some(SrcsetCandidate {
                url: url.to_string(),
                width,
            })
        })
        .collect()
}

/// Widest `srcset` candidate (first one wins on equal width), else `src`.
pub fn pick_best_source(src: Option<&str>, srcset: &[SrcsetCandidate]) -> Option<String> {
    let mut best: Option<&SrcsetCandidate> = None;
    for candidate in srcset {
        if best.map(|b| candidate.width > b.width).unwrap_or(true) {
            best = Some(candidate);
        }
    }
    best.map(|c| c.url.clone())
        .or_else(|| src.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string))
}

/// Strips CMS resize suffixes (`-300x200`, `-scaled`, each optionally followed
/// by `-N`) from the filename stem, keeping directory, extension and query.
/// Unparsable input is returned unchanged. Idempotent.
pub fn to_original_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };
    let path = url.path().to_string();
    let (dir, base) = match path.rfind('/') {
        Some(idx) => path.split_at(idx + 1),
        None => ("", path.as_str()),
    };
    let (stem, ext) = match base.rfind('.') {
        Some(idx) if idx > 0 => base.split_at(idx),
        _ => (base, ""),
    };
    let stripped = strip_resize_suffixes(stem);
    if stripped == stem {
        return raw.to_string();
    }
    url.set_path(&format!("{dir}{stripped}{ext}"));
    url.to_string()
}

fn strip_resize_suffixes(stem: &str) -> &str {
    let mut current = stem;
    loop {
        let next = SIZE_SUFFIX
            .find(current)
            .or_else(|| SCALED_SUFFIX.find(current))
            .map(|m| &current[..m.start()])
            .unwrap_or(current);
        if next == current || next.is_empty() {
            return current;
        }
        current = next;
    }
}

pub fn is_emoji_icon(class: Option<&str>, src: Option<&str>) -> bool {
    class
        .map(|c| c.split_ascii_whitespace().any(|c| c == EMOJI_CLASS))
        .unwrap_or(false)
        || src.map(|s| s.contains(EMOJI_PATH)).unwrap_or(false)
}

/// Absolute http(s) URL for a media reference; `data:` URIs, fragments and
/// relative references without a base are not relocatable.
pub fn resolve_media_url(reference: &str, base: Option<&Url>) -> Option<Url> {
    let trimmed = reference.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let url = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => base?.join(trimmed).ok()?,
        Err(_) => return None,
    };
    matches!(url.scheme(), "http" | "https").then_some(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn image(src: &str, srcset: Option<&str>) -> ElementNode {
        let mut el = ElementNode::new("img").with_attr("src", src);
        if let Some(set) = srcset {
            el.set_attr("srcset", set);
        }
        el
    }

    #[test]
    fn srcset_picks_widest_candidate() {
        let set = parse_srcset("a.jpg 300w, b.jpg 1024w, c.jpg 768w");
        assert_eq!(pick_best_source(Some("src.jpg"), &set).as_deref(), Some("b.jpg"));
    }

    #[test]
    fn srcset_tie_keeps_first() {
        let set = parse_srcset("first.jpg 800w, second.jpg 800w");
        assert_eq!(pick_best_source(None, &set).as_deref(), Some("first.jpg"));
    }

    #[test]
    fn unparsable_srcset_falls_back_to_src() {
        let set = parse_srcset("foo 1x, bar 2x");
        assert!(set.is_empty());
        assert_eq!(pick_best_source(Some(" src.jpg "), &set).as_deref(), Some("src.jpg"));
        assert_eq!(pick_best_source(Some("  "), &set), None);
    }

    #[test]
    fn strips_size_and_scaled_suffixes() {
        assert_eq!(
            to_original_url("https://x/wp-content/uploads/a-300x200.jpg"),
            "https://x/wp-content/uploads/a.jpg"
        );
        assert_eq!(to_original_url("https://x/a-scaled.jpg"), "https://x/a.jpg");
        assert_eq!(to_original_url("https://x/a-1024x768-2.png"), "https://x/a.png");
        assert_eq!(to_original_url("https://x/a-scaled-1.jpg"), "https://x/a.jpg");
        assert_eq!(to_original_url("https://x/plain.jpg"), "https://x/plain.jpg");
    }

    #[test]
    fn stripping_is_idempotent() {
        for raw in [
            "https://x/a-300x200.jpg",
            "https://x/a-300x200-scaled.jpg",
            "https://x/a-scaled-300x200.jpg",
            "https://x/b-scaled-2.webp?ver=1",
        ] {
            let once = to_original_url(raw);
            assert_eq!(to_original_url(&once), once, "not idempotent for {raw}");
        }
    }

    #[test]
    fn keeps_stem_that_is_only_a_suffix() {
        assert_eq!(to_original_url("https://x/-300x200.jpg"), "https://x/-300x200.jpg");
    }

    #[test]
    fn unparsable_url_is_returned_unchanged() {
        assert_eq!(to_original_url("not a url-300x200.jpg"), "not a url-300x200.jpg");
    }

    #[test]
    fn gallery_images_route_to_gallery_area() {
        let locator = MediaLocator::new(MediaLayout::new("static"));
        let post = PostContext::new("2024-01-test");
        let el = image("https://x/g-150x150.jpg", None);
        let ImageDisposition::Relocate(reference) = locator.locate_image(&el, &post, true) else {
            panic!("expected relocation");
        };
        assert_eq!(reference.kind, MediaKind::GalleryImage);
        assert_eq!(reference.local_path, "/galleries/2024-01-test/g.jpg");
        assert_eq!(
            reference.destination,
            Path::new("static").join("galleries").join("2024-01-test").join("g.jpg")
        );
    }

    #[test]
    fn emoji_icons_are_not_relocated() {
        let locator = MediaLocator::new(MediaLayout::new("static"));
        let post = PostContext::new("s");
        let el = image("https://s.w.org/images/core/emoji/14.0.0/72x72/1f600.png", None)
            .with_attr("alt", "😀");
        assert_eq!(
            locator.locate_image(&el, &post, false),
            ImageDisposition::Emoji {
                alt: Some("😀".to_string())
            }
        );
        let bare = ElementNode::new("img")
            .with_attr("class", "wp-smiley")
            .with_attr("src", "https://cdn/x.png");
        assert_eq!(
            locator.locate_image(&bare, &post, false),
            ImageDisposition::Emoji { alt: None }
        );
    }

    #[test]
    fn relative_sources_need_a_base() {
        let locator = MediaLocator::new(MediaLayout::new("static"));
        let el = image("/wp-content/uploads/a-300x200.jpg", None);
        assert_eq!(
            locator.locate_image(&el, &PostContext::new("s"), false),
            ImageDisposition::Keep
        );

        let base = Url::parse("https://blog.example/2024/01/02/post/").unwrap();
        let post = PostContext::new("s").with_base(Some(&base));
        let ImageDisposition::Relocate(reference) = locator.locate_image(&el, &post, false) else {
            panic!("expected relocation");
        };
        assert_eq!(reference.canonical_url, "https://blog.example/wp-content/uploads/a.jpg");
    }

    #[test]
    fn data_uris_are_kept() {
        let locator = MediaLocator::new(MediaLayout::new("static"));
        let el = image("data:image/gif;base64,R0lGOD", None);
        assert_eq!(
            locator.locate_image(&el, &PostContext::new("s"), false),
            ImageDisposition::Keep
        );
    }

    #[test]
    fn video_uses_first_source_child_when_src_missing() {
        let locator = MediaLocator::new(MediaLayout::new("static"));
        let video = ElementNode::new("video")
            .with_child(crate::FragmentNode::Element(
                ElementNode::new("source").with_attr("src", "https://x/clip-300x200.mp4"),
            ));
        let reference = locator.locate_video(&video, &PostContext::new("s")).unwrap();
        assert_eq!(reference.kind, MediaKind::Video);
        assert_eq!(reference.canonical_url, "https://x/clip-300x200.mp4");
        assert_eq!(reference.local_path, "/videos/s/clip-300x200.mp4");
    }
}
