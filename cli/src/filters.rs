use std::borrow::Borrow;

use askama::Result;

pub fn or_dash(s: impl AsRef<str>) -> Result<String> {
    let s = s.as_ref().trim();
    Ok(if s.is_empty() { "-".to_string() } else { s.to_string() })
}

pub fn yes_no(value: impl Borrow<bool>) -> Result<&'static str> {
    Ok(if *value.borrow() { "yes" } else { "no" })
}

/// Pads or clips to exactly `width` characters so table columns line up.
pub fn cell(s: impl AsRef<str>, width: usize) -> Result<String> {
    let s = s.as_ref();
    let count = s.chars().count();
    Ok(if count > width {
        let clipped: String = s.chars().take(width.saturating_sub(1)).collect();
        format!("{clipped}…")
    } else {
        format!("{s}{}", " ".repeat(width - count))
    })
}
