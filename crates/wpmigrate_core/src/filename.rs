use sha2::{Digest, Sha256};
use url::Url;

const PLACEHOLDER_STEM: &str = "media";
const MAX_FILENAME_LEN: usize = 120;

/// Local filename for a media URL: the decoded last path segment, made
/// filesystem- and URL-safe. URLs without a usable segment get
/// `media-{short_hash(url)}` so distinct sources never share a file.
pub fn media_filename(raw_url: &str) -> String {
    let segment = match Url::parse(raw_url) {
        Ok(url) => url
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string))
            .unwrap_or_default(),
        Err(_) => raw_url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    let decoded = urlencoding::decode(&segment)
        .map(|s| s.into_owned())
        .unwrap_or(segment);
    let sanitized = sanitize(&decoded);
    if sanitized.is_empty() {
        format!("{PLACEHOLDER_STEM}-{}", short_hash(raw_url))
    } else {
        sanitized
    }
}

/// `filename` with `-{short_hash(raw_url)}` inserted before its extension, for
/// sources whose names clash inside one post directory.
pub fn disambiguated_filename(filename: &str, raw_url: &str) -> String {
    let hash = short_hash(raw_url);
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}-{hash}.{ext}"),
        _ => format!("{filename}-{hash}"),
    }
}

/// Last path component of a URL or root-relative path, ignoring query and fragment.
pub fn base_name(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    path.trim_end_matches('/').rsplit('/').next().unwrap_or(path)
}

fn sanitize(input: &str) -> String {
    let mut cleaned = String::with_capacity(input.len());
    let mut prev_underscore = false;
    for c in input.chars() {
        let c = if is_forbidden(c) { '_' } else { c };
        // Collapse runs of replacement characters
        if c == '_' && prev_underscore {
            continue;
        }
        prev_underscore = c == '_';
        cleaned.push(c);
    }
    let mut trimmed = cleaned.trim_matches(&['_', ' ', '.'][..]).to_string();
    if trimmed.len() > MAX_FILENAME_LEN {
        let mut end = MAX_FILENAME_LEN;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        trimmed.truncate(end);
    }
    trimmed
}

fn is_forbidden(c: char) -> bool {
    c.is_whitespace()
        || matches!(c,
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '(' | ')' | '[' | ']' | '#' | '%'
            | '\0'..='\u{1F}'
        )
}

fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
