use std::fs;
use std::sync::Once;

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wpmigrate_engine::{
    load_feed, parse_feed, CategoryRef, FailureKind, FeedError, FetchSettings, PostRecord,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(wpmigrate_logging::initialize_for_tests);
}

const WORDPRESS_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"
    xmlns:content="http://purl.org/rss/1.0/modules/content/"
    xmlns:dc="http://purl.org/dc/elements/1.1/">
<channel>
  <title>Travel Notes</title>
  <link>https://blog.example</link>
  <description>Stories</description>
  <item>
    <title>Day at the lake</title>
    <link>https://blog.example/2024/01/05/day-at-the-lake/</link>
    <pubDate>Fri, 05 Jan 2024 09:15:00 +0000</pubDate>
    <dc:creator><![CDATA[anna]]></dc:creator>
    <category domain="category"><![CDATA[Trips]]></category>
    <category domain="post_tag"><![CDATA[lake]]></category>
    <description><![CDATA[Short summary]]></description>
    <content:encoded><![CDATA[<p>Full text</p>]]></content:encoded>
  </item>
  <item>
    <title>Summary only</title>
    <link>https://blog.example/summary-only/</link>
    <pubDate>Sat, 06 Jan 2024 10:00:00 +0000</pubDate>
    <description><![CDATA[<p>Just the summary</p>]]></description>
  </item>
</channel>
</rss>"#;

#[test]
fn wordpress_items_become_post_records() {
    init_logging();
    let feed = parse_feed(WORDPRESS_FEED).unwrap();

    assert_eq!(feed.title, "Travel Notes");
    assert_eq!(feed.posts.len(), 2);
    assert_eq!(
        feed.posts[0],
        PostRecord {
            title: "Day at the lake".to_string(),
            link: "https://blog.example/2024/01/05/day-at-the-lake/".to_string(),
            published: "Fri, 05 Jan 2024 09:15:00 +0000".to_string(),
            creator: "anna".to_string(),
            body_html: "<p>Full text</p>".to_string(),
            categories: vec![
                CategoryRef::new(Some("category"), "Trips"),
                CategoryRef::new(Some("post_tag"), "lake"),
            ],
        }
    );
    assert_eq!(feed.posts[1].body_html, "<p>Just the summary</p>");
}

#[test]
fn stray_ampersands_are_repaired() {
    init_logging();
    let broken = r#"<rss version="2.0"><channel><title>Tom & Jerry</title><link>https://b.example</link><description>d</description>
<item><title>Fish & Chips</title><link>https://b.example/fish/</link></item></channel></rss>"#;

    let feed = parse_feed(broken).unwrap();

    assert_eq!(feed.title, "Tom & Jerry");
    assert_eq!(feed.posts[0].title, "Fish & Chips");
}

#[test]
fn unrecoverable_feed_is_a_parse_error() {
    init_logging();
    let err = parse_feed("<html><body>not a feed</body></html>").unwrap_err();
    assert!(matches!(err, FeedError::Parse(_)), "{err:?}");
}

#[tokio::test]
async fn feed_is_read_from_file_with_view_source_prefix() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("feed.xml");
    fs::write(&file, WORDPRESS_FEED).unwrap();

    let source = format!("view-source:{}", file.display());
    let feed = load_feed(&source, &FetchSettings::default()).await.unwrap();

    assert_eq!(feed.posts.len(), 2);
}

#[tokio::test]
async fn feed_is_fetched_over_http_with_accept_header() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed/"))
        .and(header(
            "Accept",
            "application/rss+xml, application/xml, text/xml",
        ))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(WORDPRESS_FEED, "application/rss+xml"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let feed = load_feed(&format!("{}/feed/", server.uri()), &FetchSettings::default())
        .await
        .unwrap();

    assert_eq!(feed.posts[0].creator, "anna");
}

#[tokio::test]
async fn http_error_status_fails_feed_loading() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let err = load_feed(&format!("{}/feed/", server.uri()), &FetchSettings::default())
        .await
        .unwrap_err();

    match err {
        FeedError::Fetch(fetch) => assert_eq!(fetch.kind, FailureKind::HttpStatus(410)),
        other => panic!("unexpected error: {other:?}"),
    }
}
