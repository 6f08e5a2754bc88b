//! Article header synthesis
//!
//! Headers are synthesized from resolved article data in a fixed field
//! order; a field whose value cannot be resolved is omitted entirely
//! rather than emitted empty.

use crate::extension::ArticleData;

/// Fixed header emission order
const HEADER_FIELDS: [&str; 9] = [
    "From",
    "Newsgroups",
    "Subject",
    "Date",
    "Message-ID",
    "References",
    "Content-Type",
    "Content-Transfer-Encoding",
    "Xref",
];

/// Resolve one header field, None when the value is absent
#[must_use]
pub fn header_field(hostname: &str, article: &ArticleData, field: &str) -> Option<String> {
    match field {
        "from" => article.from.clone(),
        "newsgroups" => Some(article.group_name.clone()),
        "subject" => article.subject.clone(),
        "date" => Some(article.date.to_rfc2822()),
        "message-id" => Some(format!("<{}@{}>", article.source, hostname)),
        "references" => article
            .reply_to
            .map(|parent| format!("<{}@{}>", parent, hostname)),
        "content-type" => Some("text/html; charset=utf8".to_string()),
        "content-transfer-encoding" => Some("base64".to_string()),
        "xref" => Some(format!(
            "{} {}:{}",
            hostname, article.group_name, article.index
        )),
        _ => None,
    }
}

/// Synthesize the full header block as "Name: value" lines
#[must_use]
pub fn build_headers(hostname: &str, article: &ArticleData) -> Vec<String> {
    let mut result = Vec::with_capacity(HEADER_FIELDS.len());

    for field in HEADER_FIELDS {
        if let Some(content) = header_field(hostname, article, &field.to_lowercase()) {
            result.push(format!("{}: {}", field, content));
        }
    }

    result
}
