//! Image inlining - embeds same-site images as content-id attachments.
//!
//! References found in `srcset="..."`, `src="..."` and CSS `url(...)` are
//! resolved against the site base URL. When one points at a file under the
//! site root, the file is handed to an [`AttachmentSink`] once per message
//! and every reference to it is rewritten to `cid:img<N>`.

use crate::config::{ImageOptions, SiteConfig};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Extensions embedded when the caller does not configure its own.
pub const ALLOWED_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "svg"];

// srcset="URL", e.g. <source> tags
static SRCSET_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)srcset="?([^"]*)"?"#).expect("valid srcset regex"));

// src="URL", e.g. <img> tags
static SRC_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)src="?([^"]*)"?"#).expect("valid src regex"));

// url(URL) and url("URL") inside CSS
static CSS_URL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)url\("?([^"()]*)"?\)"#).expect("valid css url regex"));

/// A file to attach to the message and reference by content id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub content_id: String,
    pub path: PathBuf,
    pub file_name: String,
}

/// Receives the images that must be attached to the message being built.
pub trait AttachmentSink {
    fn embed(&mut self, image: EmbeddedImage);
}

impl AttachmentSink for Vec<EmbeddedImage> {
    fn embed(&mut self, image: EmbeddedImage) {
        self.push(image);
    }
}

/// Read-only view of the site's files.
pub trait FileResolver {
    /// Map a path relative to the site root onto the filesystem.
    ///
    /// Returns `None` when no such file can be located under the root.
    fn resolve(&self, relative: &str) -> Option<PathBuf>;

    fn is_regular_file(&self, path: &Path) -> bool;
}

/// Resolves paths against a directory on the local filesystem.
///
/// Paths are canonicalised and must stay inside the root, so `..` segments
/// and symlinks cannot reach files outside the site.
#[derive(Debug, Clone)]
pub struct SiteRootResolver {
    root: PathBuf,
}

impl SiteRootResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl FileResolver for SiteRootResolver {
    fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let root = dunce::canonicalize(&self.root).ok()?;
        let candidate = dunce::canonicalize(root.join(relative.trim_start_matches('/'))).ok()?;
        candidate.starts_with(&root).then_some(candidate)
    }

    fn is_regular_file(&self, path: &Path) -> bool {
        fs::metadata(path).map(|meta| meta.is_file()).unwrap_or(false)
    }
}

/// Per-message state: which files are already attached, and under which
/// index.
struct EmbedContext<'s> {
    found: HashMap<PathBuf, usize>,
    next_index: usize,
    sink: &'s mut dyn AttachmentSink,
}

impl<'s> EmbedContext<'s> {
    fn new(sink: &'s mut dyn AttachmentSink) -> Self {
        Self {
            found: HashMap::new(),
            next_index: 0,
            sink,
        }
    }

    /// Index for `path`, attaching the file the first time it is seen.
    fn index_for(&mut self, path: PathBuf) -> usize {
        if let Some(index) = self.found.get(&path) {
            return *index;
        }

        self.next_index += 1;
        let index = self.next_index;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.sink.embed(EmbeddedImage {
            content_id: format!("img{index}"),
            path: path.clone(),
            file_name,
        });
        self.found.insert(path, index);
        index
    }
}

pub struct ImageInliner<'a, R> {
    origin: &'a str,
    extensions: &'a [String],
    resolver: R,
}

impl<'a, R: FileResolver> ImageInliner<'a, R> {
    pub fn new(site: &'a SiteConfig, options: &'a ImageOptions, resolver: R) -> Self {
        Self {
            origin: site.origin(),
            extensions: &options.extensions,
            resolver,
        }
    }

    /// Rewrite same-site image references in `html` to content ids,
    /// registering each distinct file with `sink` exactly once.
    ///
    /// The three patterns run one after another over the progressively
    /// rewritten body. Anything that cannot be embedded is left untouched.
    pub fn inline(&self, html: &str, sink: &mut dyn AttachmentSink) -> String {
        if self.origin.is_empty() {
            log::debug!("no site base URL configured; skipping image inlining");
            return html.to_string();
        }

        let mut context = EmbedContext::new(sink);
        let mut body = html.to_string();
        for pattern in [&*SRCSET_REGEX, &*SRC_REGEX, &*CSS_URL_REGEX] {
            body = pattern
                .replace_all(&body, |caps: &Captures| self.rewrite(caps, &mut context))
                .into_owned();
        }
        body
    }

    fn rewrite(&self, caps: &Captures, context: &mut EmbedContext<'_>) -> String {
        let whole = &caps[0];
        let reference = &caps[1];

        if !self.has_inlineable_extension(reference) {
            return whole.to_string();
        }

        let Some(local) = self.local_path(reference) else {
            log::debug!("not embedding {reference}: not a file on this site");
            return whole.to_string();
        };
        if !self.resolver.is_regular_file(&local) {
            log::debug!("not embedding {reference}: {} is not a regular file", local.display());
            return whole.to_string();
        }

        let index = context.index_for(local);
        whole.replace(reference, &format!("cid:img{index}"))
    }

    /// The part after the last `.` must be an allowed extension.
    fn has_inlineable_extension(&self, reference: &str) -> bool {
        let Some((_, extension)) = reference.rsplit_once('.') else {
            return false;
        };
        self.extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(extension))
    }

    fn local_path(&self, reference: &str) -> Option<PathBuf> {
        let url = normalize_url(reference, self.origin);
        let rest = url.strip_prefix(self.origin)?;
        if !(rest.is_empty() || rest.starts_with('/')) {
            return None;
        }
        self.resolver.resolve(rest.trim_start_matches('/'))
    }
}

/// Convenience wrapper: inline images for `site` using its filesystem root.
pub fn inline_images(
    html: &str,
    site: &SiteConfig,
    options: &ImageOptions,
    sink: &mut dyn AttachmentSink,
) -> String {
    ImageInliner::new(site, options, SiteRootResolver::new(&site.root)).inline(html, sink)
}

/// Make `reference` an absolute `https://` URL.
///
/// `http://` and scheme-less `://` references are upgraded; anything else is
/// taken as a path below `origin`.
pub fn normalize_url(reference: &str, origin: &str) -> String {
    if reference.is_empty() {
        return String::new();
    }

    let reference = reference.trim_matches('/');
    if reference.starts_with("https://") {
        reference.to_string()
    } else if let Some(rest) = reference.strip_prefix("http://") {
        format!("https://{rest}")
    } else if let Some(rest) = reference.strip_prefix("://") {
        format!("https://{rest}")
    } else {
        format!("{}/{reference}", origin.trim_end_matches('/'))
    }
}
