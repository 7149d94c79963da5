use askama::Template;
use mailwright::log::LogRecord;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

use crate::filters;

pub struct Row {
    pub id: String,
    pub date: String,
    pub status: &'static str,
    pub recipients: String,
    pub subject: String,
}

impl From<&LogRecord> for Row {
    fn from(record: &LogRecord) -> Self {
        Row {
            id: record.id().map(|id| id.to_string()).unwrap_or_default(),
            date: short_date(record),
            status: if record.error().is_some() { "failed" } else { "sent" },
            recipients: record.recipients().join(", "),
            subject: record.subject().to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "list.txt", escape = "none")]
pub struct ListTemplate {
    pub rows: Vec<Row>,
    pub page: u32,
    pub pages: u64,
    pub total: u64,
}

pub struct Header {
    pub name: String,
    pub value: String,
}

pub struct Attachment {
    pub name: String,
    pub path: String,
    pub exists: bool,
}

#[derive(Template)]
#[template(path = "entry.txt", escape = "none")]
pub struct EntryTemplate {
    pub id: String,
    pub date: String,
    pub recipients: String,
    pub from: String,
    pub cc: String,
    pub bcc: String,
    pub subject: String,
    pub html: bool,
    pub resent: bool,
    pub error: String,
    pub headers: Vec<Header>,
    pub attachments: Vec<Attachment>,
    pub body: String,
}

impl EntryTemplate {
    pub fn new(record: &LogRecord, resent: bool) -> Self {
        EntryTemplate {
            id: record.id().map(|id| id.to_string()).unwrap_or_default(),
            date: record
                .timestamp()
                .format(&Rfc3339)
                .unwrap_or_else(|_| short_date(record)),
            recipients: record.recipients().join(", "),
            from: record.from().join(", "),
            cc: record.cc().join(", "),
            bcc: record.bcc().join(", "),
            subject: record.subject().to_string(),
            html: record.is_html(),
            resent,
            error: record.error().unwrap_or_default().to_string(),
            headers: record
                .headers_as_pairs()
                .into_iter()
                .map(|(name, value)| Header {
                    name: name.to_string(),
                    value: value.unwrap_or_default().to_string(),
                })
                .collect(),
            attachments: record
                .attachments()
                .iter()
                .map(|a| Attachment {
                    name: a.basename().to_string(),
                    path: a.location().display().to_string(),
                    exists: a.exists(),
                })
                .collect(),
            body: record.body().to_string(),
        }
    }
}

fn short_date(record: &LogRecord) -> String {
    record
        .timestamp()
        .format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailwright::log::AttachmentRef;

    fn record() -> LogRecord {
        LogRecord::builder()
            .subject("Quarterly report")
            .body("<p>Numbers</p>")
            .recipients(["a@example.com", "b@example.com"])
            .headers(["From: site@example.com", "Content-Type: text/html"])
            .attachment(AttachmentRef::new("/nowhere/report.pdf"))
            .build()
    }

    #[test]
    fn renders_list() {
        let record = record();
        let output = ListTemplate {
            rows: vec![Row::from(&record)],
            page: 1,
            pages: 1,
            total: 1,
        }
        .render()
        .unwrap();

        assert!(output.contains("Quarterly report"));
        assert!(output.contains("a@example.com, b@example.com"));
        assert!(output.contains("sent"));
        assert!(output.contains("Page 1 of 1"));
    }

    #[test]
    fn renders_empty_list() {
        let output = ListTemplate {
            rows: Vec::new(),
            page: 1,
            pages: 1,
            total: 0,
        }
        .render()
        .unwrap();

        assert!(output.contains("No emails logged"));
    }

    #[test]
    fn renders_entry() {
        let output = EntryTemplate::new(&record(), true).render().unwrap();

        assert!(output.contains("site@example.com"));
        assert!(output.contains("HTML"));
        assert!(output.contains("Resent:      yes"));
        assert!(output.contains("report.pdf (missing)"));
        assert!(output.contains("<p>Numbers</p>"));
    }
}
