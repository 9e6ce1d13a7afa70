use chrono::{NaiveDateTime, TimeZone, Utc};

/// The remote's textual timestamp format, e.g. "11 Feb 2026, 04:30AM".
const REMOTE_FORMAT: &str = "%d %b %Y, %I:%M%p";

/// Normalize a remote timestamp to RFC 3339 (UTC assumed). Returns None for
/// anything unparseable; a bad timestamp must never fail an upsert.
pub fn parse_remote_timestamp(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(raw, REMOTE_FORMAT)
        .ok()
        .map(|dt| Utc.from_utc_datetime(&dt).to_rfc3339())
}
