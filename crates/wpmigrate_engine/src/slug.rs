use std::sync::LazyLock;

use chrono::{DateTime, Datelike, FixedOffset, Local, Utc};
use chrono_tz::Tz;
use regex::Regex;
use url::Url;
use wpmigrate_logging::migrate_warn;

pub const DEFAULT_TIME_ZONE: &str = "Europe/Berlin";

static NON_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9\-]+").expect("valid slug regex"));

const ZERO_WIDTH_JOINER: char = '\u{200D}';
const VARIATION_SELECTOR_16: char = '\u{FE0F}';

/// Parses an RSS `pubDate` (RFC 2822 family) or an RFC 3339 timestamp,
/// keeping the offset the feed used.
pub fn parse_pub_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
}

/// Zone that post dates are written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostZone {
    Named(Tz),
    /// Offset of the machine running the migration.
    Local,
}

impl Default for PostZone {
    fn default() -> Self {
        PostZone::Named(chrono_tz::Europe::Berlin)
    }
}

impl PostZone {
    /// Looks up an IANA zone name; unknown names fall back to local time.
    pub fn from_name(name: &str) -> Self {
        match name.trim().parse::<Tz>() {
            Ok(tz) => PostZone::Named(tz),
            Err(err) => {
                migrate_warn!("cannot load time zone {name:?} ({err}), using local time");
                PostZone::Local
            }
        }
    }

    /// The same instant, expressed with this zone's offset.
    pub fn convert(&self, date: &DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        match self {
            PostZone::Named(tz) => date.with_timezone(tz).fixed_offset(),
            PostZone::Local => date.with_timezone(&Local).fixed_offset(),
        }
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        self.convert(&Utc::now().fixed_offset())
    }
}

/// `YYYY-MM-tail` for a post.
///
/// Permalinks shaped like `/YYYY/MM/DD/tail/` supply all three parts.
/// Anything else takes year and month from `date` and the tail from the last
/// path segment.
pub fn post_slug(link: &Url, date: &DateTime<FixedOffset>) -> String {
    let segments = path_segments(link);
    if let [year, month, _day, tail, ..] = segments.as_slice() {
        if !year.is_empty() && !month.is_empty() && !tail.is_empty() {
            return format!("{year}-{month}-{}", slugify(tail));
        }
    }

    let tail = segments.last().map(String::as_str).unwrap_or_default();
    format!("{:04}-{:02}-{}", date.year(), date.month(), slugify(tail))
}

fn path_segments(link: &Url) -> Vec<String> {
    link.path()
        .trim_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            urlencoding::decode(segment)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| segment.to_string())
        })
        .collect()
}

/// Lowercase ASCII slug. Emoji are spelled out as `u<hex>`; other characters
/// outside `[a-z0-9-]` become dashes.
pub fn slugify(text: &str) -> String {
    let mut spelled = String::with_capacity(text.len());
    for c in text.chars() {
        if is_emoji(c) {
            spelled.push_str(&format!("u{:X}", c as u32));
        } else if c != ZERO_WIDTH_JOINER && c != VARIATION_SELECTOR_16 {
            spelled.push(c);
        }
    }
    let lowered = spelled.to_lowercase().replace(' ', "-");
    NON_SLUG
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

fn is_emoji(c: char) -> bool {
    matches!(
        c as u32,
        0x1F300..=0x1F5FF
            | 0x1F600..=0x1F64F
            | 0x1F680..=0x1F6FF
            | 0x1F700..=0x1F77F
            | 0x1F900..=0x1F9FF
            | 0x1FA70..=0x1FAFF
            | 0x2600..=0x26FF
            | 0x2700..=0x27BF
            | 0x1F1E6..=0x1F1FF
    )
}

/// The permalink path with a trailing slash, kept as a redirect alias.
pub fn alias_path(link: &Url) -> String {
    let path = link.path();
    if path.is_empty() {
        "/".to_string()
    } else if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}
