//! `Retry-After` header resolution.
//!
//! The header carries either a count of seconds or an HTTP-date. Only
//! 301, 429 and 503 responses are consulted. The retry engine never hands a
//! 301 to this parser (it is not a retriable status), and 500/504 are retried
//! without looking at the header.

use axum::http::{header::RETRY_AFTER, Response, StatusCode};
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};

/// HTTP-date layouts: IMF-fixdate, obsolete RFC 850, asctime.
const HTTP_DATE_FORMATS: [&str; 3] = [
    "%a, %d %b %Y %H:%M:%S GMT",
    "%A, %d-%b-%y %H:%M:%S GMT",
    "%a %b %e %H:%M:%S %Y",
];

/// Delay the server asks for before the next attempt.
///
/// Returns zero when the status does not carry the header, the header is
/// missing or unparsable, or the seconds value is negative. An HTTP-date
/// yields `date - now`, which is negative for dates in the past.
pub fn parse_retry_after<B>(response: &Response<B>, now: DateTime<Utc>) -> TimeDelta {
    match response.status() {
        StatusCode::MOVED_PERMANENTLY | StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => {}
        _ => return TimeDelta::zero(),
    }

    let Some(value) = response.headers().get(RETRY_AFTER).and_then(|v| v.to_str().ok()) else {
        return TimeDelta::zero();
    };
    let value = value.trim();
    if value.is_empty() {
        return TimeDelta::zero();
    }

    if let Ok(seconds) = value.parse::<i64>() {
        if seconds < 0 {
            return TimeDelta::zero();
        }
        return TimeDelta::try_seconds(seconds).unwrap_or(TimeDelta::MAX);
    }

    match parse_http_date(value) {
        Some(date) => date - now,
        None => TimeDelta::zero(),
    }
}

/// Parse an HTTP-date in any of the three accepted layouts.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    HTTP_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}
