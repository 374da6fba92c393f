//! wpmigrate engine: feed loading, media downloads and output persistence.
mod download;
mod feed;
mod fetch;
mod frontmatter;
mod persist;
mod pipeline;
mod post;
mod sanitize;
mod slug;
mod types;

pub use download::{DownloadCoordinator, DownloadSettings, RetryPolicy, DEFAULT_CONCURRENCY};
pub use feed::{load_feed, parse_feed, Feed, FeedError};
pub use fetch::{FetchSettings, MediaBody, MediaFetcher, ReqwestFetcher, DEFAULT_USER_AGENT};
pub use frontmatter::{render_document, split_tags_and_categories, FrontMatter};
pub use persist::{ensure_output_dir, prepare_outputs, reset_dir, AtomicFileWriter, PersistError};
pub use pipeline::{FailedPost, MigratedPost, MigrationConfig, MigrationReport, Migrator, PostError};
pub use post::{CategoryRef, PostRecord};
pub use sanitize::{encode_stray_ampersands, remove_invalid_xml_chars, sanitize_xml};
pub use slug::{alias_path, parse_pub_date, post_slug, slugify, PostZone, DEFAULT_TIME_ZONE};
pub use types::{
    DownloadSummary, DownloadTask, FailedDownload, FailureKind, FetchError, TaskState,
};
