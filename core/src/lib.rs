pub mod alt_text;
pub mod config;
pub mod error;
pub mod images;
pub mod linkify;
pub mod paragraphs;
pub mod process;
pub mod sanitizer;
pub mod template;
pub mod tokenizer;


pub use alt_text::html_to_text;
pub use config::{ImageOptions, LinkifyOptions, MailMagicConfig, SiteConfig};
pub use error::{MailMagicError, Result};
pub use images::{
    inline_images, normalize_url, AttachmentSink, EmbeddedImage, FileResolver, ImageInliner,
    SiteRootResolver, ALLOWED_IMAGE_EXTENSIONS,
};
pub use linkify::{linkify, split_by_whitespace};
pub use paragraphs::wrap_paragraphs;
pub use process::{
    ContentType, MailProcessor, OutgoingMail, Recipient, UserDirectory, UserRecord,
};
pub use sanitizer::{deep_replace, sanitize_url, sanitize_url_with, DEFAULT_ALLOWED_SCHEMES};
pub use template::{MailTemplate, TemplateVars};
pub use tokenizer::{tokenize, Token, TokenKind, VerbatimTag, VerbatimTracker};

/// Turn a plain-text body into HTML: paragraphs first, then links.
pub fn htmlize(text: &str, options: &LinkifyOptions) -> String {
    linkify(&wrap_paragraphs(text), options)
}

/// [`htmlize`] for raw bytes. Input that is not valid UTF-8 is rejected
/// rather than guessed at.
pub fn htmlize_bytes(bytes: &[u8], options: &LinkifyOptions) -> Result<String> {
    let text = std::str::from_utf8(bytes).map_err(|err| {
        MailMagicError::InvalidInput(format!("body is not valid UTF-8: {err}"))
    })?;
    Ok(htmlize(text, options))
}
