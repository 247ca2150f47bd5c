//! Timestamp normalisation and document assembly for outgoing actions
//! (§4.J step 2, §6 wire form).

use chrono::{DateTime, Utc};
use logalike_message::{Message, Value};

/// `YYYY-MM-dd'T'HH:mm:ss.SSSZ` with the offset as `±HHMM` (no colon) —
/// spec.md §6's literal wire form, verified against scenario 6
/// (`2015-09-30T12:31:21Z` → `2015-09-30T12:31:21.000+0000`).
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3f%z").to_string()
}

/// Builds the JSON document for one message: every timestamp field
/// normalised to the canonical wire form, with `@timestamp` synthesised
/// from `now` if the message doesn't carry one.
pub(crate) fn normalize_document(
    message: &Message,
    now: DateTime<Utc>,
) -> serde_json::Map<String, serde_json::Value> {
    let mut document = serde_json::Map::new();
    for (key, value) in message.fields() {
        let json_value = match value {
            Value::Timestamp(ts) => serde_json::Value::String(format_timestamp(*ts)),
            other => other.to_json(),
        };
        document.insert(key.to_string(), json_value);
    }
    document
        .entry("@timestamp".to_string())
        .or_insert_with(|| serde_json::Value::String(format_timestamp(now)));
    document
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn normalizes_existing_timestamp_to_canonical_wire_form() {
        let mut message = Message::new();
        let ts = Utc.with_ymd_and_hms(2015, 9, 30, 12, 31, 21).unwrap();
        message.put("@timestamp", Value::Timestamp(ts));

        let document = normalize_document(&message, Utc::now());
        assert_eq!(
            document.get("@timestamp").unwrap().as_str().unwrap(),
            "2015-09-30T12:31:21.000+0000"
        );
    }

    #[test]
    fn synthesizes_timestamp_when_absent() {
        let message = Message::new();
        let now = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let document = normalize_document(&message, now);
        assert_eq!(
            document.get("@timestamp").unwrap().as_str().unwrap(),
            "2020-01-01T00:00:00.000+0000"
        );
    }
}
