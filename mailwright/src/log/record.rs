use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{AttachmentRef, LogId};
use crate::headers;

/// One outbound email attempt.
///
/// A record without an id has never been persisted. The timestamp is fixed
/// when the record is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    id: Option<LogId>,
    subject: String,
    body: String,
    recipients: Vec<String>,
    headers: Vec<String>,
    headers_unified: String,
    attachments: Vec<AttachmentRef>,
    error: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    timestamp: OffsetDateTime,
}

impl LogRecord {
    pub fn builder() -> LogRecordBuilder {
        LogRecordBuilder::default()
    }

    pub fn id(&self) -> Option<LogId> {
        self.id
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn headers_unified(&self) -> &str {
        &self.headers_unified
    }

    pub fn attachments(&self) -> &[AttachmentRef] {
        &self.attachments
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }

    /// Values of any `From:` header lines.
    pub fn from(&self) -> Vec<&str> {
        headers::values(&self.headers, "From")
    }

    pub fn cc(&self) -> Vec<&str> {
        headers::values(&self.headers, "Cc")
    }

    pub fn bcc(&self) -> Vec<&str> {
        headers::values(&self.headers, "Bcc")
    }

    /// Headers as `(name, value)` pairs; value-less lines keep only a name.
    pub fn headers_as_pairs(&self) -> Vec<(&str, Option<&str>)> {
        self.headers.iter().map(|h| headers::split(h)).collect()
    }

    pub fn is_html(&self) -> bool {
        headers::is_html(&self.headers_unified)
    }

    /// Whether any recipient's address matches `email`, case-insensitively.
    pub fn is_addressed_to(&self, email: &str) -> bool {
        let wanted = headers::normalize_address(email);
        self.recipients
            .iter()
            .any(|r| headers::normalize_address(r) == wanted)
    }

    pub(crate) fn with_id(mut self, id: LogId) -> Self {
        self.id = Some(id);
        self
    }

    pub(crate) fn set_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }
}

/// Builder for [`LogRecord`].
#[derive(Debug, Default)]
pub struct LogRecordBuilder {
    id: Option<LogId>,
    subject: String,
    body: String,
    recipients: Vec<String>,
    headers: Vec<String>,
    attachments: Vec<AttachmentRef>,
    error: Option<String>,
    timestamp: Option<OffsetDateTime>,
}

impl LogRecordBuilder {
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipients.push(recipient.into());
        self
    }

    pub fn recipients(mut self, recipients: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.recipients.extend(recipients.into_iter().map(Into::into));
        self
    }

    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.headers.push(header.into());
        self
    }

    pub fn headers(mut self, headers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.headers.extend(headers.into_iter().map(Into::into));
        self
    }

    pub fn attachment(mut self, attachment: AttachmentRef) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn attachments(mut self, attachments: impl IntoIterator<Item = AttachmentRef>) -> Self {
        self.attachments.extend(attachments);
        self
    }

    /// Overrides the creation time, e.g. when importing older entries.
    pub fn timestamp(mut self, timestamp: OffsetDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub(crate) fn id(mut self, id: LogId) -> Self {
        self.id = Some(id);
        self
    }

    pub(crate) fn error(mut self, error: Option<String>) -> Self {
        self.error = error;
        self
    }

    pub fn build(self) -> LogRecord {
        LogRecord {
            id: self.id,
            subject: self.subject,
            body: self.body,
            recipients: self.recipients,
            headers_unified: headers::unify(&self.headers),
            headers: self.headers,
            attachments: self.attachments,
            error: self.error,
            timestamp: self.timestamp.unwrap_or_else(OffsetDateTime::now_utc),
        }
    }
}
