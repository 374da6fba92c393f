use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Once;

use pretty_assertions::assert_eq;
use wpmigrate_core::{
    ContentTransformer, DocumentRewriter, DownloadScheduler, Fragment, MediaLayout, PostContext,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(wpmigrate_logging::initialize_for_tests);
}

/// Records scheduled downloads with first-call-wins semantics.
#[derive(Default)]
struct RecordingScheduler {
    seen: RefCell<HashSet<String>>,
    scheduled: RefCell<Vec<(String, PathBuf)>>,
}

impl DownloadScheduler for RecordingScheduler {
    fn schedule(&self, url: &str, destination: &Path) -> bool {
        if !self.seen.borrow_mut().insert(url.to_string()) {
            return false;
        }
        self.scheduled
            .borrow_mut()
            .push((url.to_string(), destination.to_path_buf()));
        true
    }
}

fn migrate(html: &str, slug: &str, scheduler: &RecordingScheduler) -> String {
    let rewriter = DocumentRewriter::new(MediaLayout::new("static"));
    let fragment = Fragment::parse(html).unwrap();
    let rewritten = rewriter.rewrite(&fragment, &PostContext::new(slug), scheduler);
    ContentTransformer::new().to_markdown(&rewritten.fragment)
}

#[test]
fn end_to_end_image_between_paragraphs() {
    init_logging();
    let scheduler = RecordingScheduler::default();
    let html = r#"<p>Hello</p><img src="https://x/a-300x200.jpg" srcset="https://x/a-150x100.jpg 150w, https://x/a-300x200.jpg 300w"><p>World</p>"#;

    let markdown = migrate(html, "2024-01-test", &scheduler);

    assert_eq!(
        markdown,
        "Hello\n\n![a.jpg](/images/2024-01-test/a.jpg)\n\nWorld"
    );
    assert_eq!(
        scheduler.scheduled.borrow().as_slice(),
        &[(
            "https://x/a.jpg".to_string(),
            Path::new("static")
                .join("images")
                .join("2024-01-test")
                .join("a.jpg")
        )]
    );
}

#[test]
fn text_blocks_keep_document_order() {
    init_logging();
    let scheduler = RecordingScheduler::default();
    let html = "<p>one</p>two<h2>three</h2><p>four</p><div>five</div><blockquote>six</blockquote><p>seven</p>";

    let markdown = migrate(html, "s", &scheduler);

    let positions: Vec<usize> = ["one", "two", "three", "four", "five", "six", "seven"]
        .iter()
        .map(|word| markdown.find(word).unwrap_or_else(|| panic!("{word} missing in {markdown}")))
        .collect();
    let mut sorted = positions.clone();
    sorted.sort_unstable();
    assert_eq!(positions, sorted);
    assert!(scheduler.scheduled.borrow().is_empty());
}

#[test]
fn gallery_images_are_emitted_in_place() {
    init_logging();
    let scheduler = RecordingScheduler::default();
    let html = r#"<p>Before</p>
<figure class="wp-block-gallery has-nested-images">
  <figure class="wp-block-image"><img src="https://x/g1-1024x768.jpg" alt="First"></figure>
  <figure class="wp-block-image"><img src="https://x/g2-scaled.jpg"></figure>
  <figcaption>Caption text</figcaption>
</figure>
<p>After</p>"#;

    let markdown = migrate(html, "trip", &scheduler);

    assert_eq!(
        markdown,
        "Before\n\n![First](/galleries/trip/g1.jpg)\n\n![g2.jpg](/galleries/trip/g2.jpg)\n\nAfter"
    );
    let urls: Vec<String> = scheduler
        .scheduled
        .borrow()
        .iter()
        .map(|(url, _)| url.clone())
        .collect();
    assert_eq!(urls, vec!["https://x/g1.jpg", "https://x/g2.jpg"]);
}

#[test]
fn video_block_becomes_link_to_local_copy() {
    init_logging();
    let scheduler = RecordingScheduler::default();
    let html = r#"<figure class="wp-block-video"><video controls src="https://x/uploads/clip.mp4"></video></figure><p>Tail</p>"#;

    let markdown = migrate(html, "v", &scheduler);

    assert_eq!(markdown, "[Video: clip.mp4](/videos/v/clip.mp4)\n\nTail");
    assert_eq!(scheduler.scheduled.borrow().len(), 1);
}

#[test]
fn repeated_image_is_scheduled_once() {
    init_logging();
    let scheduler = RecordingScheduler::default();
    let html = r#"<img src="https://x/a-300x200.jpg"><p>mid</p><img src="https://x/a-1024x768.jpg">"#;

    let markdown = migrate(html, "s", &scheduler);

    assert_eq!(markdown.matches("(/images/s/a.jpg)").count(), 2);
    assert_eq!(scheduler.scheduled.borrow().len(), 1);
}

#[test]
fn linked_image_inside_figure_renders_as_image_link() {
    init_logging();
    let scheduler = RecordingScheduler::default();
    let html = r#"<figure class="wp-block-image"><a href="https://x/p.jpg"><img src="https://x/p-600x400.jpg" alt="Pier"></a><figcaption>At dusk</figcaption></figure>"#;

    let markdown = migrate(html, "s", &scheduler);

    assert_eq!(
        markdown,
        "[![Pier](/images/s/p.jpg)](/images/s/p.jpg)\n\nAt dusk"
    );
}

#[test]
fn sibling_generic_blocks_are_separated_by_one_newline() {
    init_logging();
    let scheduler = RecordingScheduler::default();
    let markdown = migrate("<span>a</span><span>b</span><p>c</p>", "s", &scheduler);
    assert_eq!(markdown, "a\nb\nc");
}

#[test]
fn emoji_icons_survive_as_characters() {
    init_logging();
    let scheduler = RecordingScheduler::default();
    let html = r#"<p>Great day <img draggable="false" role="img" class="emoji" alt="😎" src="https://s.w.org/images/core/emoji/15.0.3/72x72/1f60e.png"></p>"#;

    let markdown = migrate(html, "s", &scheduler);

    assert_eq!(markdown, "Great day 😎");
    assert!(scheduler.scheduled.borrow().is_empty());
}

#[test]
fn empty_paragraphs_and_whitespace_vanish() {
    init_logging();
    let scheduler = RecordingScheduler::default();
    let markdown = migrate("<p> </p>\n\n<p>Only</p>\n<p></p>", "s", &scheduler);
    assert_eq!(markdown, "Only");
}

#[test]
fn document_wrapper_tags_are_ignored() {
    init_logging();
    let fragment = Fragment::parse("<html><body><p>Inside</p></body></html>").unwrap();
    assert_eq!(fragment.nodes().len(), 1);
    assert!(fragment.nodes()[0].as_element().is_some_and(|el| el.is("p")));
    let markdown = ContentTransformer::new().to_markdown(&fragment);
    assert_eq!(markdown, "Inside");
}
