use std::collections::BTreeSet;

use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde_json::Value;

use crate::CategoryRef;

const TAG_DOMAIN: &str = "post_tag";
const DEFAULT_CATEGORIES: [&str; 2] = ["Uncategorized", "Allgemein"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontMatter {
    pub title: String,
    pub date: DateTime<FixedOffset>,
    pub draft: bool,
    pub tags: Vec<String>,
    pub aliases: Vec<String>,
    pub categories: Vec<String>,
}

impl FrontMatter {
    pub fn new(
        title: &str,
        date: DateTime<FixedOffset>,
        taxonomy: &[CategoryRef],
        aliases: Vec<String>,
    ) -> Self {
        let (tags, categories) = split_tags_and_categories(taxonomy);
        Self {
            title: title.trim().to_string(),
            date,
            draft: false,
            tags,
            aliases,
            categories,
        }
    }

    pub fn to_yaml(&self) -> String {
        let mut out = String::from("---\n");
        out.push_str(&format!("title: {}\n", quote(&self.title)));
        out.push_str(&format!(
            "date: {}\n",
            self.date.to_rfc3339_opts(SecondsFormat::Secs, false)
        ));
        out.push_str(&format!("draft: {}\n", self.draft));
        push_list(&mut out, "tags", &self.tags);
        push_list(&mut out, "aliases", &self.aliases);
        push_list(&mut out, "categories", &self.categories);
        out.push_str("---\n");
        out
    }
}

/// Front matter, the trimmed body and a final newline.
pub fn render_document(front_matter: &FrontMatter, body_markdown: &str) -> String {
    format!(
        "{frontmatter}{body}\n",
        frontmatter = front_matter.to_yaml(),
        body = body_markdown.trim()
    )
}

/// Splits feed categories into `(tags, categories)`, both sorted and unique.
pub fn split_tags_and_categories(taxonomy: &[CategoryRef]) -> (Vec<String>, Vec<String>) {
    let mut tags = BTreeSet::new();
    let mut categories = BTreeSet::new();
    for entry in taxonomy {
        let name = entry.name.replace('\u{a0}', " ").trim().to_string();
        if name.is_empty() || is_default_category(&name) {
            continue;
        }
        let is_tag = entry
            .domain
            .as_deref()
            .is_some_and(|domain| domain.eq_ignore_ascii_case(TAG_DOMAIN));
        if is_tag {
            tags.insert(name);
        } else {
            categories.insert(name);
        }
    }
    (tags.into_iter().collect(), categories.into_iter().collect())
}

fn is_default_category(name: &str) -> bool {
    DEFAULT_CATEGORIES
        .iter()
        .any(|default| default.eq_ignore_ascii_case(name))
}

// JSON strings are valid double-quoted YAML scalars.
fn quote(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

fn push_list(out: &mut String, key: &str, values: &[String]) {
    if values.is_empty() {
        out.push_str(&format!("{key}: []\n"));
        return;
    }
    out.push_str(&format!("{key}:\n"));
    for value in values {
        out.push_str(&format!("  - {}\n", quote(value)));
    }
}
