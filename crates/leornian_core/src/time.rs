//! Timestamp helpers.
//!
//! Storage keeps UTC epoch milliseconds; formatted strings only appear at
//! the edges (RFC 3339 in API resources, ISO 8601 with an offset in exports).

use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};

/// UTC epoch milliseconds.
pub type EpochMs = i64;

/// Length of the "recently reviewed" window used by the drill.
pub const DAY_MS: EpochMs = 24 * 60 * 60 * 1000;

pub fn now_epoch_ms() -> EpochMs {
    Utc::now().timestamp_millis()
}

/// Converts epoch milliseconds to a UTC datetime.
///
/// Out-of-range values clamp to the Unix epoch instead of failing.
pub fn epoch_ms_to_datetime(value: EpochMs) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(value)
        .single()
        .unwrap_or_default()
}

/// Formats epoch milliseconds as RFC 3339 with millisecond precision.
pub fn epoch_ms_to_rfc3339(value: EpochMs) -> String {
    epoch_ms_to_datetime(value).to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Formats epoch milliseconds as an ISO 8601 UTC timestamp with an explicit
/// `+00:00` offset; the fraction is six digits and omitted when zero.
pub fn epoch_ms_to_isoformat(value: EpochMs) -> String {
    let datetime = epoch_ms_to_datetime(value);
    let pattern = if datetime.timestamp_subsec_micros() == 0 {
        "%Y-%m-%dT%H:%M:%S+00:00"
    } else {
        "%Y-%m-%dT%H:%M:%S%.6f+00:00"
    };
    datetime.format(pattern).to_string()
}

pub fn epoch_ms_to_date(value: EpochMs) -> NaiveDate {
    epoch_ms_to_datetime(value).date_naive()
}
