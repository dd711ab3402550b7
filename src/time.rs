//! Time helpers shared by the signing and policy code.

use chrono::{SecondsFormat, Utc};

use crate::{Error, Result};

/// All timestamps in this crate are UTC.
pub type DateTime = chrono::DateTime<Utc>;

/// Current time in UTC.
pub fn now() -> DateTime {
    Utc::now()
}

/// Render a timestamp the way SAS `st`/`se` fields and stored access
/// policies expect it: RFC3339 with second precision and a `Z` suffix,
/// e.g. `2026-08-27T12:00:00Z`.
pub fn format_rfc3339(t: DateTime) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Render a timestamp as an HTTP date for the `x-ms-date` header,
/// e.g. `Thu, 27 Aug 2026 12:00:00 GMT`.
pub fn format_http_date(t: DateTime) -> String {
    t.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parse an HTTP date such as the `Last-Modified` response header.
pub fn parse_http_date(s: &str) -> Result<DateTime> {
    chrono::DateTime::parse_from_rfc2822(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::unexpected(format!("invalid http date: {s}")).with_source(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t() -> DateTime {
        Utc.with_ymd_and_hms(2022, 3, 1, 8, 12, 34).unwrap()
    }

    #[test]
    fn test_format_rfc3339() {
        assert_eq!(format_rfc3339(t()), "2022-03-01T08:12:34Z");
    }

    #[test]
    fn test_format_http_date() {
        assert_eq!(format_http_date(t()), "Tue, 01 Mar 2022 08:12:34 GMT");
    }

    #[test]
    fn test_parse_http_date() {
        let parsed = parse_http_date("Tue, 01 Mar 2022 08:12:34 GMT").unwrap();
        assert_eq!(parsed, t());

        assert!(parse_http_date("not a date").is_err());
    }
}
