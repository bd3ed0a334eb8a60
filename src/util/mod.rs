use chrono::{SecondsFormat, Utc};

pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Current UTC time as RFC 3339 with millisecond precision (`...Z`).
pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}
