//! Text-level cleanup of backend output before JSON parsing.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref OBJECT_ID: Regex = Regex::new(r#"ObjectId\("(\w+)"\)"#).unwrap();
    static ref ISO_DATE: Regex = Regex::new(r#"ISODate\("([\w\-:.]+)"\)"#).unwrap();
    static ref NUMBER_LONG: Regex = Regex::new(r#"NumberLong\("?(-?\d+)"?\)"#).unwrap();
}

/// Rewrites the database shell's extended-JSON wrappers into tagged strings:
/// `ObjectId("x")` becomes `"ObjectId-x"`, `ISODate("x")` becomes
/// `"ISODate-x"` and `NumberLong("x")` / `NumberLong(x)` becomes
/// `"NumberLong-x"`. Applying it twice gives the same text as applying it once.
pub fn normalize_extended_json(text: &str) -> String {
    let text = OBJECT_ID.replace_all(text, r#""ObjectId-$1""#);
    let text = ISO_DATE.replace_all(&text, r#""ISODate-$1""#);
    NUMBER_LONG
        .replace_all(&text, r#""NumberLong-$1""#)
        .into_owned()
}

/// Cuts the outermost JSON object or array out of command output that may
/// carry banners or warnings around it.
pub fn extract_json_document(text: &str) -> Option<&str> {
    let start = text.find(|c| c == '{' || c == '[')?;
    let closing = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(closing)?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}
