//! wpmigrate core: pure post-body transformation (no filesystem, no network).
mod convert;
mod filename;
mod fragment;
mod locator;
mod markdown;
mod rewrite;

pub use convert::{image_markdown, video_markdown, Converter, Html2MdConverter};
pub use filename::{base_name, disambiguated_filename, media_filename};
pub use fragment::{ElementNode, Fragment, FragmentNode, ParseError, MAX_NESTING_DEPTH};
pub use locator::{
    is_emoji_icon, parse_srcset, pick_best_source, resolve_media_url, to_original_url,
    ImageDisposition, MediaKind, MediaLayout, MediaLocator, MediaReference, PostContext,
    SrcsetCandidate, GALLERIES_AREA, IMAGES_AREA, VIDEOS_AREA,
};
pub use markdown::ContentTransformer;
pub use rewrite::{DocumentRewriter, DownloadScheduler, RewrittenDocument};
