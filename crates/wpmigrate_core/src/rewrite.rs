//! Document Rewriter: builds a copy of a post body with every relocatable media
//! pointer replaced by its local path, scheduling a download for each.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use wpmigrate_logging::{migrate_debug, migrate_trace};

use crate::filename::disambiguated_filename;
use crate::fragment::{ElementNode, Fragment, FragmentNode, ParseError};
use crate::locator::{ImageDisposition, MediaLayout, MediaLocator, MediaReference, PostContext};

const GALLERY_CLASS: &str = "wp-block-gallery";

/// Accepts download requests while a document is being rewritten.
///
/// Implementations must be idempotent per URL: the first call for a URL fixes
/// its destination and later calls are ignored. Returns whether a new download
/// was created.
pub trait DownloadScheduler {
    fn schedule(&self, url: &str, destination: &Path) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenDocument {
    pub fragment: Fragment,
    /// Every relocated reference in document order, duplicates included.
    pub media: Vec<MediaReference>,
}

impl RewrittenDocument {
    pub fn to_html(&self) -> String {
        self.fragment.to_html()
    }
}

#[derive(Debug, Clone)]
pub struct DocumentRewriter {
    locator: MediaLocator,
}

impl DocumentRewriter {
    pub fn new(layout: MediaLayout) -> Self {
        Self {
            locator: MediaLocator::new(layout),
        }
    }

    pub fn locator(&self) -> &MediaLocator {
        &self.locator
    }

    /// Rewrites `fragment` without touching it; the result is a new tree.
    pub fn rewrite(
        &self,
        fragment: &Fragment,
        post: &PostContext<'_>,
        scheduler: &dyn DownloadScheduler,
    ) -> RewrittenDocument {
        let mut walk = Walk {
            locator: &self.locator,
            post,
            scheduler,
            media: Vec::new(),
            claims: HashMap::new(),
        };
        let (nodes, _unclaimed) = walk.rewrite_nodes(fragment.nodes(), false);
        migrate_debug!(
            "rewrote fragment for {}: {} media references",
            post.slug,
            walk.media.len()
        );
        RewrittenDocument {
            fragment: Fragment::from_nodes(nodes),
            media: walk.media,
        }
    }

    /// Parses `html`, rewrites it and serializes the result.
    pub fn rewrite_html(
        &self,
        html: &str,
        post: &PostContext<'_>,
        scheduler: &dyn DownloadScheduler,
    ) -> Result<String, ParseError> {
        let fragment = Fragment::parse(html)?;
        Ok(self.rewrite(&fragment, post, scheduler).to_html())
    }
}

struct Walk<'a> {
    locator: &'a MediaLocator,
    post: &'a PostContext<'a>,
    scheduler: &'a dyn DownloadScheduler,
    media: Vec<MediaReference>,
    /// Destination -> canonical URL stored there.
    claims: HashMap<PathBuf, String>,
}

impl Walk<'_> {
    /// Returns the rewritten nodes plus the local path of the last relocated
    /// image not yet claimed by an enclosing link.
    fn rewrite_nodes(
        &mut self,
        nodes: &[FragmentNode],
        in_gallery: bool,
    ) -> (Vec<FragmentNode>, Option<String>) {
        let mut out = Vec::with_capacity(nodes.len());
        let mut unclaimed = None;
        for node in nodes {
            let (rewritten, link_target) = self.rewrite_node(node, in_gallery);
            out.extend(rewritten);
            if link_target.is_some() {
                unclaimed = link_target;
            }
        }
        (out, unclaimed)
    }

    fn rewrite_node(
        &mut self,
        node: &FragmentNode,
        in_gallery: bool,
    ) -> (Option<FragmentNode>, Option<String>) {
        let element = match node {
            FragmentNode::Text(_) => return (Some(node.clone()), None),
            FragmentNode::Element(element) => element,
        };

        if element.is("img") {
            return self.rewrite_image(element, in_gallery);
        }

        let in_gallery = in_gallery || element.has_class(GALLERY_CLASS);
        let (children, mut unclaimed) = self.rewrite_nodes(&element.children, in_gallery);
        let mut rewritten = ElementNode {
            tag: element.tag.clone(),
            attrs: element.attrs.clone(),
            children,
        };

        if rewritten.is("a") {
            if let Some(local) = unclaimed.take() {
                rewritten.set_attr("href", &local);
            }
        } else if rewritten.is("video") {
            self.rewrite_video(&mut rewritten);
        }

        (Some(FragmentNode::Element(rewritten)), unclaimed)
    }

    fn rewrite_image(
        &mut self,
        image: &ElementNode,
        in_gallery: bool,
    ) -> (Option<FragmentNode>, Option<String>) {
        match self.locator.locate_image(image, self.post, in_gallery) {
            ImageDisposition::Emoji { alt } => {
                migrate_trace!("replacing emoji icon with {:?}", alt);
                (alt.map(FragmentNode::Text), None)
            }
            ImageDisposition::Keep => (Some(FragmentNode::Element(image.clone())), None),
            ImageDisposition::Relocate(reference) => {
                let reference = self.claim(reference);
                let mut rewritten = image.clone();
                rewritten.remove_attr("srcset");
                rewritten.remove_attr("sizes");
                rewritten.set_attr("src", &reference.local_path);
                let local = reference.local_path.clone();
                self.schedule(reference);
                (Some(FragmentNode::Element(rewritten)), Some(local))
            }
        }
    }

    fn rewrite_video(&mut self, video: &mut ElementNode) {
        let Some(reference) = self.locator.locate_video(video, self.post) else {
            return;
        };
        let reference = self.claim(reference);
        let local = reference.local_path.clone();
        video.set_attr("src", &local);
        video.for_each_descendant_mut("source", &mut |source: &mut ElementNode| {
            source.set_attr("src", &local)
        });
        self.schedule(reference);
    }

    /// Gives `reference` a destination no other source in this post uses.
    fn claim(&mut self, reference: MediaReference) -> MediaReference {
        let reference = match self.claims.get(&reference.destination) {
            Some(owner) if *owner != reference.canonical_url => {
                let filename =
                    disambiguated_filename(&reference.filename, &reference.canonical_url);
                migrate_debug!(
                    "{} clashes with {owner} on {}; using {filename}",
                    reference.canonical_url,
                    reference.filename
                );
                self.locator.rename(reference, self.post.slug, filename)
            }
            _ => reference,
        };
        self.claims
            .entry(reference.destination.clone())
            .or_insert_with(|| reference.canonical_url.clone());
        reference
    }

    fn schedule(&mut self, reference: MediaReference) {
        let created = self
            .scheduler
            .schedule(&reference.canonical_url, &reference.destination);
        if !created {
            migrate_trace!("download already known: {}", reference.canonical_url);
        }
        self.media.push(reference);
    }
}
