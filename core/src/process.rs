//! Outgoing mail processing
//!
//! Plain-text mail is turned into an HTML message built from a template,
//! with the original text kept as the alternate body. HTML mail only gains a
//! plain-text alternate when it has none.

use crate::alt_text::html_to_text;
use crate::config::MailMagicConfig;
use crate::error::{MailMagicError, Result};
use crate::htmlize;
use crate::images::{AttachmentSink, EmbeddedImage, ImageInliner, SiteRootResolver};
use crate::template::{MailTemplate, TemplateVars};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentType {
    #[default]
    PlainText,
    Html,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl Recipient {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The display name, or the address when there is none.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.email,
        }
    }
}

/// A registered site user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub name: String,
    pub username: String,
    pub email: String,
}

/// Looks up registered users by email address.
pub trait UserDirectory {
    fn find_by_email(&self, email: &str) -> Option<UserRecord>;
}

impl UserDirectory for Vec<UserRecord> {
    fn find_by_email(&self, email: &str) -> Option<UserRecord> {
        let wanted = email.trim();
        if wanted.is_empty() {
            return None;
        }
        self.iter()
            .find(|user| user.email.trim().eq_ignore_ascii_case(wanted))
            .cloned()
    }
}

/// A message on its way out, as seen by the processor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMail {
    pub content_type: ContentType,
    pub subject: String,
    pub body: String,
    pub alt_body: String,
    pub recipients: Vec<Recipient>,
    pub embedded: Vec<EmbeddedImage>,
}

impl OutgoingMail {
    pub fn plain_text(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn html(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            content_type: ContentType::Html,
            ..Self::plain_text(subject, body)
        }
    }

    pub fn to(mut self, recipient: Recipient) -> Self {
        self.recipients.push(recipient);
        self
    }

    pub fn is_html(&self) -> bool {
        self.content_type == ContentType::Html
    }
}

impl AttachmentSink for OutgoingMail {
    fn embed(&mut self, image: EmbeddedImage) {
        self.embedded.push(image);
    }
}

pub struct MailProcessor {
    config: MailMagicConfig,
    users: Option<Box<dyn UserDirectory>>,
}

impl MailProcessor {
    pub fn new(config: MailMagicConfig) -> Self {
        Self {
            config,
            users: None,
        }
    }

    pub fn with_user_directory(mut self, users: impl UserDirectory + 'static) -> Self {
        self.users = Some(Box::new(users));
        self
    }

    /// Process `mail` in place. On failure the mail is restored to what it
    /// was before processing, so it can still be delivered as-is.
    pub fn process(&self, mail: &mut OutgoingMail) {
        let original = mail.clone();
        if let Err(err) = self.try_process(mail) {
            log::warn!("mail processing failed, sending unchanged: {err}");
            *mail = original;
        }
    }

    pub fn try_process(&self, mail: &mut OutgoingMail) -> Result<()> {
        if mail.is_html() {
            if self.config.html2text {
                add_alternate_text(mail);
            }
            return Ok(());
        }

        let template = self.load_template();
        if !template.has_content_placeholder() {
            return Err(MailMagicError::Template(format!(
                "template {} has no [CONTENT] or [CONTENT_HTMLIZED] placeholder",
                self.config.template
            )));
        }

        let body = std::mem::take(&mut mail.body);
        let vars = self.template_vars(mail, &body);
        mail.alt_body = body;
        mail.body = template.render(&vars);
        mail.content_type = ContentType::Html;

        if self.config.images.enabled {
            let resolver = SiteRootResolver::new(&self.config.site.root);
            let inliner = ImageInliner::new(&self.config.site, &self.config.images, resolver);
            let html = std::mem::take(&mut mail.body);
            mail.body = inliner.inline(&html, mail);
            log::debug!("embedded {} image(s)", mail.embedded.len());
        }

        Ok(())
    }

    fn template_vars(&self, mail: &OutgoingMail, body: &str) -> TemplateVars {
        let (name, email) = mail
            .recipients
            .first()
            .map(|recipient| (recipient.display_name().to_string(), recipient.email.clone()))
            .unwrap_or_default();

        let user = self
            .users
            .as_ref()
            .and_then(|users| users.find_by_email(&email))
            .unwrap_or(UserRecord {
                name,
                username: String::new(),
                email,
            });

        TemplateVars {
            subject: mail.subject.clone(),
            full_name: user.name,
            username: user.username,
            email: user.email,
            content: body.to_string(),
            content_htmlized: htmlize(body, &self.config.linkify),
            site_name: self.config.site.name.clone(),
            site_url: self.config.site.base_url.clone(),
        }
    }

    fn load_template(&self) -> MailTemplate {
        match &self.config.template_root {
            Some(root) => MailTemplate::load(root, &self.config.template),
            None => MailTemplate::fallback(),
        }
    }
}

/// Give HTML mail a plain-text alternate unless it already has one.
fn add_alternate_text(mail: &mut OutgoingMail) {
    if !mail.alt_body.trim().is_empty() {
        return;
    }
    mail.alt_body = html_to_text(&mail.body);
}
