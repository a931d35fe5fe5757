//! RFC 1123 timestamps (`Mon, 11 Apr 2022 22:26:58 GMT`), the format the metadata
//! endpoint uses for `NotBefore`.

use chrono::{DateTime, ParseError, Utc};

const FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Formats a UTC timestamp as RFC 1123. The output is always 29 bytes.
#[must_use]
pub fn format(value: &DateTime<Utc>) -> String {
    value.format(FORMAT).to_string()
}

/// Parses an RFC 1123 timestamp. Obsolete zone names (`GMT`, `UT`) and numeric
/// offsets are accepted and normalized to UTC.
pub fn parse(value: &str) -> Result<DateTime<Utc>, ParseError> {
    DateTime::parse_from_rfc2822(value.trim()).map(|dt| dt.with_timezone(&Utc))
}

/// Serde adapter for optional timestamps.
///
/// Upstream sends an empty string when there is no scheduled start, so empty
/// strings, `null` and a missing field all decode as `None`. `None` is written
/// back as an empty string to keep the upstream shape.
pub mod option {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize as _, Deserializer, Serializer, de};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match *value {
            Some(ref dt) => serializer.serialize_str(&super::format(dt)),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => super::parse(text).map(Some).map_err(de::Error::custom),
        }
    }
}
