/// One category or tag attached to a post, with the taxonomy it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRef {
    pub domain: Option<String>,
    pub name: String,
}

impl CategoryRef {
    pub fn new(domain: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            domain: domain.map(str::to_string),
            name: name.into(),
        }
    }
}

/// Normalized feed item handed to the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostRecord {
    pub title: String,
    pub link: String,
    pub published: String,
    pub creator: String,
    pub body_html: String,
    pub categories: Vec<CategoryRef>,
}

impl PostRecord {
    pub(crate) fn from_item(item: &rss::Item) -> Self {
        let creator = item
            .dublin_core_ext()
            .and_then(|dc| dc.creators().first().cloned())
            .or_else(|| item.author().map(str::to_string))
            .unwrap_or_default();

        let categories = item
            .categories()
            .iter()
            .filter(|category| !category.name().trim().is_empty())
            .map(|category| CategoryRef::new(category.domain(), category.name().trim()))
            .collect();

        Self {
            title: item.title().unwrap_or_default().trim().to_string(),
            link: item.link().unwrap_or_default().trim().to_string(),
            published: item.pub_date().unwrap_or_default().trim().to_string(),
            creator: creator.trim().to_string(),
            body_html: preferred_body(item.content(), item.description()).to_string(),
            categories,
        }
    }
}

/// Full content wins unless it is blank.
fn preferred_body<'a>(content: Option<&'a str>, description: Option<&'a str>) -> &'a str {
    content
        .map(str::trim)
        .filter(|body| !body.is_empty())
        .or_else(|| description.map(str::trim))
        .unwrap_or_default()
}
