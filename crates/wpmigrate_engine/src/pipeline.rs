//! Per-run migration: feed posts in, Markdown files and relocated media out.
use std::path::PathBuf;

use thiserror::Error;
use url::Url;
use wpmigrate_core::{
    ContentTransformer, DocumentRewriter, Fragment, MediaLayout, ParseError, PostContext,
};
use wpmigrate_logging::{migrate_debug, migrate_info, migrate_warn};

use crate::download::{DownloadCoordinator, DownloadSettings};
use crate::frontmatter::{render_document, FrontMatter};
use crate::persist::{prepare_outputs, AtomicFileWriter, PersistError};
use crate::slug::{alias_path, parse_pub_date, post_slug, PostZone};
use crate::{DownloadSummary, PostRecord};

#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub content_dir: PathBuf,
    pub static_root: PathBuf,
    /// Number of posts to migrate; `0` means all of them.
    pub limit: usize,
    pub clean: bool,
    /// Zone for front-matter dates and the date part of slugs.
    pub timezone: PostZone,
    pub download: DownloadSettings,
}

impl MigrationConfig {
    pub fn new(content_dir: impl Into<PathBuf>, static_root: impl Into<PathBuf>) -> Self {
        Self {
            content_dir: content_dir.into(),
            static_root: static_root.into(),
            limit: 0,
            clean: true,
            timezone: PostZone::default(),
            download: DownloadSettings::default(),
        }
    }

    pub fn layout(&self) -> MediaLayout {
        MediaLayout::new(self.static_root.clone())
    }
}

#[derive(Debug, Error)]
pub enum PostError {
    #[error("invalid post link {link:?}: {source}")]
    InvalidLink {
        link: String,
        #[source]
        source: url::ParseError,
    },
    #[error("cannot parse post body: {0}")]
    Parse(#[from] ParseError),
    #[error("cannot write post: {0}")]
    Persist(#[from] PersistError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigratedPost {
    pub slug: String,
    pub path: PathBuf,
    pub markdown_len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedPost {
    pub index: usize,
    pub link: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub written: Vec<PathBuf>,
    pub failed_posts: Vec<FailedPost>,
    pub downloads: DownloadSummary,
}

impl MigrationReport {
    pub fn has_failures(&self) -> bool {
        !self.failed_posts.is_empty() || !self.downloads.failed.is_empty()
    }
}

pub struct Migrator {
    config: MigrationConfig,
    rewriter: DocumentRewriter,
    transformer: ContentTransformer,
    writer: AtomicFileWriter,
    coordinator: DownloadCoordinator,
}

impl Migrator {
    pub fn new(config: MigrationConfig, coordinator: DownloadCoordinator) -> Self {
        Self {
            rewriter: DocumentRewriter::new(config.layout()),
            transformer: ContentTransformer::new(),
            writer: AtomicFileWriter::new(config.content_dir.clone()),
            coordinator,
            config,
        }
    }

    /// Creates the output tree, emptying it first when cleaning is enabled.
    pub fn prepare(&self) -> Result<(), PersistError> {
        prepare_outputs(
            &self.config.content_dir,
            self.rewriter.locator().layout(),
            self.config.clean,
        )
    }

    /// Migrates one post. Downloads are only scheduled here; they finish by
    /// the time [`Migrator::run`] returns.
    pub fn migrate_post(&self, index: usize, post: &PostRecord) -> Result<MigratedPost, PostError> {
        let link = Url::parse(post.link.trim()).map_err(|source| PostError::InvalidLink {
            link: post.link.clone(),
            source,
        })?;
        let zone = self.config.timezone;
        let date = match parse_pub_date(&post.published) {
            Some(published) => zone.convert(&published),
            None => {
                migrate_warn!(
                    "post #{index}: unparsable pubDate {:?}, using current time",
                    post.published
                );
                zone.now()
            }
        };
        let slug = post_slug(&link, &date);
        migrate_debug!("post #{index}: {} -> slug {slug}", post.link);

        let fragment = Fragment::parse(&post.body_html)?;
        let context = PostContext::new(&slug).with_base(Some(&link));
        let rewritten = self.rewriter.rewrite(&fragment, &context, &self.coordinator);
        let markdown = self.transformer.to_markdown(&rewritten.fragment);

        let front_matter =
            FrontMatter::new(&post.title, date, &post.categories, vec![alias_path(&link)]);
        let document = render_document(&front_matter, &markdown);
        let path = self.writer.write(&format!("{slug}.md"), &document)?;

        migrate_info!(
            "✓ {} -> {} ({} chars)",
            post.title,
            path.display(),
            markdown.len()
        );
        Ok(MigratedPost {
            slug,
            path,
            markdown_len: markdown.len(),
        })
    }

    /// Migrates up to `limit` posts, then waits for every scheduled download.
    /// A failing post is logged and recorded; the run carries on.
    pub async fn run(&self, posts: &[PostRecord]) -> MigrationReport {
        let count = match self.config.limit {
            0 => posts.len(),
            limit => limit.min(posts.len()),
        };
        migrate_info!("migrating {count} of {} posts", posts.len());

        let mut report = MigrationReport::default();
        for (index, post) in posts.iter().take(count).enumerate() {
            match self.migrate_post(index, post) {
                Ok(migrated) => report.written.push(migrated.path),
                Err(err) => {
                    migrate_warn!("post #{index} ({}) failed: {err}", post.link);
                    report.failed_posts.push(FailedPost {
                        index,
                        link: post.link.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        report.downloads = self.coordinator.wait_all().await;
        migrate_info!(
            "done: {} posts written, {} failed; {} media downloaded, {} failed",
            report.written.len(),
            report.failed_posts.len(),
            report.downloads.succeeded,
            report.downloads.failed.len()
        );
        report
    }
}
