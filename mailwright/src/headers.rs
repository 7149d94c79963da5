//! Helpers for raw `Name: value` header lines.

/// Joins header lines into the single string kept for substring search.
pub fn unify(headers: &[String]) -> String {
    headers.join("\n")
}

/// Splits `"Name: value"` into its parts. Lines without a colon have no value.
pub fn split(line: &str) -> (&str, Option<&str>) {
    match line.split_once(':') {
        Some((name, value)) => (name.trim(), Some(value.trim())),
        None => (line.trim(), None),
    }
}

/// Every value of the header `name`, compared case-insensitively, in order.
pub fn values<'a>(headers: &'a [String], name: &str) -> Vec<&'a str> {
    headers
        .iter()
        .filter_map(|line| match split(line) {
            (n, Some(value)) if n.eq_ignore_ascii_case(name) => Some(value),
            _ => None,
        })
        .collect()
}

/// True when the unified headers declare an HTML body.
pub fn is_html(unified: &str) -> bool {
    unified
        .to_ascii_lowercase()
        .lines()
        .any(|line| {
            let (name, value) = split(line);
            name == "content-type" && value.is_some_and(|v| v.starts_with("text/html"))
        })
}

/// Address part of a recipient: `"Jane <jane@example.com>"` -> `jane@example.com`.
pub fn address_of(recipient: &str) -> &str {
    let recipient = recipient.trim();
    match (recipient.rfind('<'), recipient.rfind('>')) {
        (Some(start), Some(end)) if start < end => recipient[start + 1..end].trim(),
        _ => recipient,
    }
}

/// Normalised form used to match recipients for erasure.
pub fn normalize_address(recipient: &str) -> String {
    address_of(recipient).to_lowercase()
}
