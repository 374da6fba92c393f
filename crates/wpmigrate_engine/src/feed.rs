//! Feed acquisition: local file or HTTP, parsed with `rss`, with one repair retry.
use std::io;
use std::path::{Path, PathBuf};

use reqwest::header::ACCEPT;
use rss::Channel;
use thiserror::Error;
use wpmigrate_logging::{migrate_debug, migrate_warn};

use crate::fetch::{build_client, map_reqwest_error, FetchSettings};
use crate::sanitize::sanitize_xml;
use crate::{FailureKind, FetchError, PostRecord};

const FEED_ACCEPT: &str = "application/rss+xml, application/xml, text/xml";
const VIEW_SOURCE_PREFIX: &str = "view-source:";

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("cannot read feed file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot fetch feed: {0}")]
    Fetch(#[from] FetchError),
    #[error("failed to parse feed: {0}")]
    Parse(#[from] rss::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    pub title: String,
    pub posts: Vec<PostRecord>,
}

/// Loads `source`, which is either a path to an existing file or a URL.
/// A pasted `view-source:` prefix is ignored.
pub async fn load_feed(source: &str, settings: &FetchSettings) -> Result<Feed, FeedError> {
    let source = normalize_source(source);
    let text = if Path::new(source).is_file() {
        migrate_debug!("reading feed from file {source}");
        let bytes = tokio::fs::read(source)
            .await
            .map_err(|source_err| FeedError::Read {
                path: PathBuf::from(source),
                source: source_err,
            })?;
        String::from_utf8_lossy(&bytes).into_owned()
    } else {
        migrate_debug!("fetching feed from {source}");
        fetch_feed_text(source, settings).await?
    };
    parse_feed(&text)
}

pub(crate) fn normalize_source(source: &str) -> &str {
    let source = source.trim();
    source.strip_prefix(VIEW_SOURCE_PREFIX).unwrap_or(source)
}

async fn fetch_feed_text(url: &str, settings: &FetchSettings) -> Result<String, FetchError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
    let client = build_client(settings)?;
    let response = client
        .get(parsed)
        .header(ACCEPT, FEED_ACCEPT)
        .send()
        .await
        .map_err(map_reqwest_error)?;

    let status = response.status();
    if status.as_u16() >= 400 {
        return Err(FetchError::new(
            FailureKind::HttpStatus(status.as_u16()),
            status.to_string(),
        ));
    }
    response.text().await.map_err(map_reqwest_error)
}

/// Parses feed text; if that fails, repairs it and tries exactly once more.
pub fn parse_feed(text: &str) -> Result<Feed, FeedError> {
    let channel = match text.parse::<Channel>() {
        Ok(channel) => channel,
        Err(first) => {
            migrate_warn!("feed did not parse ({first}); retrying after repair");
            sanitize_xml(text).parse::<Channel>()?
        }
    };

    Ok(Feed {
        title: channel.title().trim().to_string(),
        posts: channel.items().iter().map(PostRecord::from_item).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::normalize_source;

    #[test]
    fn view_source_prefix_is_stripped() {
        assert_eq!(
            normalize_source("  view-source:https://example.com/feed/ "),
            "https://example.com/feed/"
        );
        assert_eq!(normalize_source("feed.xml"), "feed.xml");
    }
}
