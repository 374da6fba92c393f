//! Text-level repairs for malformed feeds, applied before a second parse attempt.
use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static AMPERSAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]+;|#[xX][0-9a-fA-F]+;|[A-Za-z][A-Za-z0-9]*;)?")
        .expect("valid ampersand regex")
});

/// Both repairs in the order they must run.
pub fn sanitize_xml(text: &str) -> String {
    encode_stray_ampersands(&remove_invalid_xml_chars(text)).into_owned()
}

/// Drops characters outside the XML 1.0 `Char` production.
pub fn remove_invalid_xml_chars(text: &str) -> String {
    text.chars().filter(|&c| is_xml_char(c)).collect()
}

fn is_xml_char(c: char) -> bool {
    matches!(
        c as u32,
        0x9 | 0xA | 0xD | 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x10000..=0x10FFFF
    )
}

/// Escapes every `&` that does not open a well-formed entity reference.
pub fn encode_stray_ampersands(text: &str) -> Cow<'_, str> {
    AMPERSAND.replace_all(text, |caps: &Captures<'_>| match caps.get(1) {
        Some(entity) => format!("&{}", entity.as_str()),
        None => "&amp;".to_string(),
    })
}
