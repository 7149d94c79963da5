//! Outgoing email type and builder.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::MailError;
use crate::headers;

/// An outgoing email as handed to the pipeline.
///
/// Headers are kept as raw `Name: value` lines so they can be logged and
/// replayed unchanged. The body is plain text unless a `Content-Type:
/// text/html` header says otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Email {
    /// Primary recipients.
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub headers: Vec<String>,
    /// Files to attach, read when the message is sent.
    #[serde(default)]
    pub attachments: Vec<PathBuf>,
}

impl Email {
    pub fn builder() -> EmailBuilder {
        EmailBuilder::default()
    }

    pub fn is_html(&self) -> bool {
        headers::is_html(&headers::unify(&self.headers))
    }

    /// The message sent to confirm that transport settings work.
    ///
    /// `to` may hold several addresses separated by `;`.
    pub fn test_message(to: &str, site_name: &str, site_url: &str, html: bool) -> Result<Email, MailError> {
        let content = format!("This email proves that your settings are correct.\n{site_url}");

        let builder = Email::builder()
            .to_many(to.split(';').map(str::trim).filter(|r| !r.is_empty()))
            .subject(format!("Test email from {site_name}"))
            .header("x-test: mailwright");

        let builder = if html {
            builder.html(format!(
                concat!(
                    "<body>",
                    "<div style=\"text-align: center;margin-top: 5%;font-size: 4em;\">&#9989;</div>",
                    "<h1 style=\"font-family: sans-serif;text-align: center;font-size: 4em;\">This is a test email</h1>",
                    "<p style=\"font-family: sans-serif;text-align: center;font-size: 1em;\">{}</p>",
                    "</body>"
                ),
                content
            ))
        } else {
            builder.text(content)
        };

        builder.build()
    }
}

/// Builder for [`Email`].
#[derive(Debug, Default)]
pub struct EmailBuilder {
    to: Vec<String>,
    subject: String,
    body: String,
    headers: Vec<String>,
    attachments: Vec<PathBuf>,
}

impl EmailBuilder {
    /// Add a primary recipient.
    pub fn to(mut self, address: impl Into<String>) -> Self {
        self.to.push(address.into());
        self
    }

    /// Add multiple primary recipients.
    pub fn to_many(mut self, addresses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.to.extend(addresses.into_iter().map(Into::into));
        self
    }

    pub fn cc(self, address: impl AsRef<str>) -> Self {
        self.header(format!("Cc: {}", address.as_ref()))
    }

    pub fn bcc(self, address: impl AsRef<str>) -> Self {
        self.header(format!("Bcc: {}", address.as_ref()))
    }

    /// Set the sender. Transport settings may still override it.
    pub fn from(self, address: impl AsRef<str>) -> Self {
        self.header(format!("From: {}", address.as_ref()))
    }

    pub fn reply_to(self, address: impl AsRef<str>) -> Self {
        self.header(format!("Reply-To: {}", address.as_ref()))
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Plain text body.
    pub fn text(self, text: impl Into<String>) -> Self {
        self.body(text).header("Content-Type: text/plain")
    }

    /// HTML body.
    pub fn html(self, html: impl Into<String>) -> Self {
        self.body(html).header("Content-Type: text/html")
    }

    /// Body without touching the headers, e.g. when replaying a logged email.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Add a raw `Name: value` header line.
    pub fn header(mut self, line: impl Into<String>) -> Self {
        self.headers.push(line.into());
        self
    }

    pub fn headers(mut self, lines: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.headers.extend(lines.into_iter().map(Into::into));
        self
    }

    pub fn attachment(mut self, path: impl Into<PathBuf>) -> Self {
        self.attachments.push(path.into());
        self
    }

    pub fn attachments(mut self, paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        self.attachments.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Build the email. At least one recipient is required.
    pub fn build(self) -> Result<Email, MailError> {
        if self.to.is_empty() {
            return Err(MailError::Build("at least one recipient required".into()));
        }

        Ok(Email {
            to: self.to,
            subject: self.subject,
            body: self.body,
            headers: self.headers,
            attachments: self.attachments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_text_email() {
        let email = Email::builder()
            .from("sender@example.com")
            .to("user@example.com")
            .cc("cc@example.com")
            .subject("Hello")
            .text("Body text")
            .build()
            .unwrap();

        assert_eq!(email.to, vec!["user@example.com"]);
        assert_eq!(email.subject, "Hello");
        assert_eq!(email.body, "Body text");
        assert_eq!(
            email.headers,
            vec![
                "From: sender@example.com",
                "Cc: cc@example.com",
                "Content-Type: text/plain"
            ]
        );
        assert!(!email.is_html());
    }

    #[test]
    fn html_sets_content_type() {
        let email = Email::builder()
            .to("a@b.com")
            .subject("Test")
            .html("<p>Rich</p>")
            .attachment("/tmp/report.pdf")
            .build()
            .unwrap();

        assert!(email.is_html());
        assert_eq!(email.attachments, vec![PathBuf::from("/tmp/report.pdf")]);
    }

    #[test]
    fn build_requires_recipient() {
        let result = Email::builder().subject("Hi").text("Body").build();
        assert!(matches!(result, Err(MailError::Build(_))));
    }

    #[test]
    fn test_message_plain() {
        let email = Email::test_message(
            "one@example.com; two@example.com",
            "My Site",
            "https://example.com",
            false,
        )
        .unwrap();

        assert_eq!(email.to, vec!["one@example.com", "two@example.com"]);
        assert_eq!(email.subject, "Test email from My Site");
        assert!(email.body.ends_with("https://example.com"));
        assert!(email.headers.iter().any(|h| h.starts_with("x-test:")));
        assert!(!email.is_html());
    }

    #[test]
    fn test_message_html() {
        let email = Email::test_message("one@example.com", "My Site", "https://example.com", true).unwrap();

        assert!(email.is_html());
        assert!(email.body.starts_with("<body>"));
        assert!(email.body.contains("This is a test email"));
    }

    #[test]
    fn test_message_needs_a_recipient() {
        assert!(Email::test_message(" ; ", "Site", "https://example.com", false).is_err());
    }
}
