//! Store timestamp representation.
//!
//! Documents carry timestamps as RFC 3339 UTC strings with millisecond
//! precision. Caller-supplied `start_date`/`end_date` are normalized to the
//! same form before any handler runs.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;

use super::errors::{EngineError, EngineResult};

/// Payload fields normalized before dispatch.
pub const DATE_FIELDS: [&str; 2] = ["start_date", "end_date"];

pub fn to_store_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse the date formats callers send: RFC 3339, naive date-times and bare
/// dates (both read as UTC), or epoch milliseconds.
pub fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::String(s) => parse_date_str(s.trim()),
        _ => None,
    }
}

fn parse_date_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(s) {
        return Some(at.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Rewrite `start_date`/`end_date` in place. Empty values are left alone.
pub fn normalize_payload_dates(payload: &mut Value) -> EngineResult<()> {
    let Some(object) = payload.as_object_mut() else {
        return Ok(());
    };

    for field in DATE_FIELDS {
        let Some(value) = object.get_mut(field) else {
            continue;
        };
        if is_blank(value) {
            continue;
        }
        let at = parse_date(value).ok_or_else(|| {
            EngineError::PreconditionFailed(format!("{} is not a valid date", field))
        })?;
        *value = Value::String(to_store_timestamp(at));
    }

    Ok(())
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_supported_formats() {
        let mut payload = json!({
            "id": "r1",
            "start_date": "2021-05-24T19:37:41+02:00",
            "end_date": "2021-05-25"
        });

        normalize_payload_dates(&mut payload).unwrap();

        assert_eq!(payload["start_date"], "2021-05-24T17:37:41.000Z");
        assert_eq!(payload["end_date"], "2021-05-25T00:00:00.000Z");
        assert_eq!(payload["id"], "r1");
    }

    #[test]
    fn accepts_epoch_millis_and_naive_datetimes() {
        assert_eq!(
            parse_date(&json!(1621885061757_i64)).map(to_store_timestamp),
            Some("2021-05-24T19:37:41.757Z".to_string())
        );
        assert_eq!(
            parse_date(&json!("2021-05-24T19:37:41.5")).map(to_store_timestamp),
            Some("2021-05-24T19:37:41.500Z".to_string())
        );
    }

    #[test]
    fn blank_values_are_skipped() {
        let mut payload = json!({ "start_date": "", "end_date": null });
        normalize_payload_dates(&mut payload).unwrap();
        assert_eq!(payload, json!({ "start_date": "", "end_date": null }));
    }

    #[test]
    fn invalid_date_is_a_precondition_failure() {
        let mut payload = json!({ "start_date": "next tuesday" });
        let err = normalize_payload_dates(&mut payload).unwrap_err();
        assert!(matches!(err, EngineError::PreconditionFailed(_)));
        assert_eq!(err.to_string(), "start_date is not a valid date");
    }
}
