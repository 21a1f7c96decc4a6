//! HTML mail templates with `[VARIABLE]` placeholders.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::fs;
use std::path::Path;

/// Template used when neither the configured file nor `default.html` exist.
pub const FALLBACK_TEMPLATE: &str = "<html>
<head>
\t<title>[SUBJECT]</title>
</head>
<body>
[CONTENT_HTMLIZED]
</body>
</html>";

const DEFAULT_TEMPLATE_NAME: &str = "default.html";

static PLACEHOLDER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([A-Z_]+)\]").expect("valid placeholder regex"));

/// Values substituted into a template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateVars {
    pub subject: String,
    pub full_name: String,
    pub username: String,
    pub email: String,
    /// The original plain-text body.
    pub content: String,
    /// The body after paragraph wrapping and linkification.
    pub content_htmlized: String,
    pub site_name: String,
    pub site_url: String,
}

impl TemplateVars {
    /// Value for a placeholder name, `None` if the name is not a variable.
    pub fn get(&self, name: &str) -> Option<&str> {
        let value = match name {
            "SUBJECT" => &self.subject,
            "FULLNAME" => &self.full_name,
            "USERNAME" => &self.username,
            "EMAIL" => &self.email,
            "CONTENT" => &self.content,
            "CONTENT_HTMLIZED" => &self.content_htmlized,
            "SITENAME" => &self.site_name,
            "SITEURL" => &self.site_url,
            _ => return None,
        };
        Some(value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailTemplate {
    source: String,
}

impl MailTemplate {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Load `name` from `root`.
    ///
    /// Falls back to `default.html` in the same directory, then to
    /// [`FALLBACK_TEMPLATE`]. Never fails.
    pub fn load(root: &Path, name: &str) -> Self {
        let mut path = root.join(name);
        if !path.is_file() {
            log::warn!(
                "mail template {} not found, using {DEFAULT_TEMPLATE_NAME}",
                path.display()
            );
            path = root.join(DEFAULT_TEMPLATE_NAME);
        }

        match fs::read_to_string(&path) {
            Ok(source) => Self::new(source),
            Err(err) => {
                log::warn!(
                    "cannot read mail template {}: {err}; using built-in template",
                    path.display()
                );
                Self::fallback()
            }
        }
    }

    pub fn fallback() -> Self {
        Self::new(FALLBACK_TEMPLATE)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether rendering would carry the message content at all.
    pub fn has_content_placeholder(&self) -> bool {
        self.source.contains("[CONTENT]") || self.source.contains("[CONTENT_HTMLIZED]")
    }

    /// Substitute every known `[NAME]` placeholder.
    ///
    /// Unknown placeholders are kept. Inserted values are not scanned again,
    /// so a subject containing `[EMAIL]` stays literal.
    pub fn render(&self, vars: &TemplateVars) -> String {
        PLACEHOLDER_REGEX
            .replace_all(&self.source, |caps: &Captures| {
                vars.get(&caps[1]).unwrap_or(&caps[0]).to_string()
            })
            .into_owned()
    }
}

impl Default for MailTemplate {
    fn default() -> Self {
        Self::fallback()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn vars() -> TemplateVars {
        TemplateVars {
            subject: "Welcome".into(),
            full_name: "Ada Lovelace".into(),
            username: "ada".into(),
            email: "ada@example.com".into(),
            content: "Hi".into(),
            content_htmlized: "<p>Hi</p>".into(),
            site_name: "Example".into(),
            site_url: "https://example.com/".into(),
        }
    }

    #[test]
    fn test_render_substitutes_all_variables() {
        let template = MailTemplate::new(
            "[SUBJECT]|[FULLNAME]|[USERNAME]|[EMAIL]|[CONTENT]|[CONTENT_HTMLIZED]|[SITENAME]|[SITEURL]",
        );
        assert_eq!(
            template.render(&vars()),
            "Welcome|Ada Lovelace|ada|ada@example.com|Hi|<p>Hi</p>|Example|https://example.com/"
        );
    }

    #[test]
    fn test_unknown_placeholders_are_kept() {
        let template = MailTemplate::new("[GREETING] [SUBJECT] [lowercase]");
        assert_eq!(template.render(&vars()), "[GREETING] Welcome [lowercase]");
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let mut vars = vars();
        vars.subject = "About [EMAIL]".into();
        let template = MailTemplate::new("<title>[SUBJECT]</title>");
        assert_eq!(template.render(&vars), "<title>About [EMAIL]</title>");
    }

    #[test]
    fn test_fallback_template_wraps_content() {
        let rendered = MailTemplate::fallback().render(&vars());
        assert!(rendered.contains("<title>Welcome</title>"));
        assert!(rendered.contains("<body>\n<p>Hi</p>\n</body>"));
    }

    #[test]
    fn test_content_placeholder_detection() {
        assert!(MailTemplate::fallback().has_content_placeholder());
        assert!(MailTemplate::new("<pre>[CONTENT]</pre>").has_content_placeholder());
        assert!(!MailTemplate::new("<p>[SUBJECT]</p>").has_content_placeholder());
    }

    #[test]
    fn test_load_named_template() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("fancy.html"), "<b>[SUBJECT]</b>").unwrap();
        fs::write(dir.path().join("default.html"), "plain [SUBJECT]").unwrap();

        let template = MailTemplate::load(dir.path(), "fancy.html");
        assert_eq!(template.source(), "<b>[SUBJECT]</b>");
    }

    #[test]
    fn test_load_missing_template_uses_default_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("default.html"), "plain [SUBJECT]").unwrap();

        let template = MailTemplate::load(dir.path(), "missing.html");
        assert_eq!(template.source(), "plain [SUBJECT]");
    }

    #[test]
    fn test_load_directory_name_uses_default_file() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("default.html"), "plain").unwrap();

        assert_eq!(MailTemplate::load(dir.path(), "nested").source(), "plain");
    }

    #[test]
    fn test_load_without_any_file_uses_builtin() {
        let dir = TempDir::new().unwrap();
        let template = MailTemplate::load(dir.path(), "default.html");
        assert_eq!(template, MailTemplate::fallback());
    }
}
