//! Digest content generator.
//!
//! Turns a notification snapshot into the subject and HTML body of an alert
//! email. Output depends only on the input set.

use chrono::{DateTime, Utc};
use std::fmt::Write;

use crate::notification::{NotificationItem, NotificationSet};

/// Subject prefix identifying the source site.
const SUBJECT_PREFIX: &str = "[myoshi.co]";

/// A composed alert email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailDigest {
    pub subject: String,
    pub body_html: String,
}

/// Builds [`EmailDigest`]s from notification sets.
pub struct DigestComposer;

impl DigestComposer {
    /// Compose the digest for the unread part of `set`.
    #[must_use]
    pub fn compose(set: &NotificationSet) -> EmailDigest {
        EmailDigest {
            subject: Self::subject(set.unread_count),
            body_html: Self::body(set),
        }
    }

    /// Subject line with singular/plural agreement.
    #[must_use]
    pub fn subject(unread_count: u64) -> String {
        let plural = if unread_count == 1 { "" } else { "s" };
        format!("{SUBJECT_PREFIX} You have {unread_count} unread notification{plural}")
    }

    fn body(set: &NotificationSet) -> String {
        let mut rows = String::new();
        for item in set.unread() {
            let _ = writeln!(
                rows,
                "<tr><td>{}</td><td>{}</td></tr>",
                Self::message_cell(item),
                item.created_at
                    .as_deref()
                    .map(format_timestamp)
                    .unwrap_or_default(),
            );
        }

        format!(
            r#"<h2>Unread Notifications ({count})</h2>
<table border="1" cellpadding="6" cellspacing="0">
<thead><tr><th>Message</th><th>Date</th></tr></thead>
<tbody>
{rows}</tbody>
</table>
"#,
            count = set.unread_count,
        )
    }

    fn message_cell(item: &NotificationItem) -> String {
        let mut cell = match &item.url {
            Some(url) => format!(
                r#"<a href="{}">{}</a>"#,
                html_escape(url),
                html_escape(&item.message)
            ),
            None => html_escape(&item.message),
        };
        if let Some(batch) = item.batch_count.filter(|&n| n > 1) {
            let _ = write!(cell, " &times;{batch}");
        }
        cell
    }
}

/// Render RFC 3339 timestamps uniformly; anything else passes through escaped.
fn format_timestamp(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => ts
            .with_timezone(&Utc)
            .format("%Y-%m-%d %H:%M UTC")
            .to_string(),
        Err(_) => html_escape(raw),
    }
}

/// Escape text for inclusion in HTML content or a quoted attribute.
fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
