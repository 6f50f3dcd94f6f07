use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::error::ValidationError;
use crate::store::models::{EmailRecord, ResponsePayload, ResponseRecord, UNKNOWN_SURVEY};

/// Map a raw response document into a canonical record.
///
/// Deterministic given its inputs: `read_at` is the timestamp fallback
/// and `fallback_id` the id fallback (filename stem), both supplied by
/// the caller.
pub fn normalize_response(raw: &Value, fallback_id: &str, read_at: DateTime<Utc>) -> ResponseRecord {
    let (timestamp, synthetic_timestamp) = resolve_timestamp(raw, read_at);

    ResponseRecord {
        id: resolve_id(raw, fallback_id),
        timestamp,
        synthetic_timestamp,
        survey_title: string_field(raw, &["surveyTitle", "survey_title"])
            .unwrap_or_else(|| UNKNOWN_SURVEY.to_string()),
        results: normalize_payload(raw),
        ip: string_field(raw, &["ip"]),
        user_agent: string_field(raw, &["userAgent", "user_agent"]),
    }
}

/// Map a raw delivery document into a canonical email record, rejecting
/// any document without a non-empty recipient address.
pub fn normalize_email(
    raw: &Value,
    fallback_id: &str,
    read_at: DateTime<Utc>,
) -> Result<EmailRecord, ValidationError> {
    let id = resolve_id(raw, fallback_id);
    let recipient_email = string_field(raw, &["recipientEmail", "recipient_email", "email"])
        .ok_or(ValidationError::MissingRecipient { id: id.clone() })?;
    let (timestamp, synthetic_timestamp) = resolve_timestamp(raw, read_at);

    Ok(EmailRecord {
        id,
        recipient_email,
        survey_title: string_field(raw, &["surveyTitle", "survey_title"])
            .unwrap_or_else(|| UNKNOWN_SURVEY.to_string()),
        results: normalize_payload(raw),
        timestamp,
        synthetic_timestamp,
        ip: string_field(raw, &["ip"]),
        user_agent: string_field(raw, &["userAgent", "user_agent"]),
        method: string_field(raw, &["method"]),
    })
}

fn resolve_id(raw: &Value, fallback_id: &str) -> String {
    string_field(raw, &["id"]).unwrap_or_else(|| fallback_id.to_string())
}

/// Timestamp from the document, or `read_at` with the synthetic flag set
/// when nothing in the file parses to an instant.
fn resolve_timestamp(raw: &Value, read_at: DateTime<Utc>) -> (DateTime<Utc>, bool) {
    for name in ["timestamp", "createdAt", "created_at", "date"] {
        if let Some(parsed) = raw.get(name).and_then(parse_timestamp) {
            return (parsed, false);
        }
    }
    (read_at, true)
}

/// Accept the timestamp shapes seen across legacy files: RFC 3339,
/// space-separated date-time, bare date, and epoch seconds/milliseconds.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => {
            let text = text.trim();
            if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
                return Some(parsed.with_timezone(&Utc));
            }
            if let Ok(parsed) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
                return Some(parsed.and_utc());
            }
            if let Ok(parsed) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
                return parsed.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
            }
            None
        }
        Value::Number(number) => {
            let epoch = number.as_i64()?;
            if epoch.abs() >= 1_000_000_000_000 {
                DateTime::from_timestamp_millis(epoch)
            } else {
                DateTime::from_timestamp(epoch, 0)
            }
        }
        _ => None,
    }
}

fn normalize_payload(raw: &Value) -> ResponsePayload {
    let results = raw.get("results");

    // Legacy files carried score/percentage at the top level.
    let score = number_at(results, "score").or_else(|| number_at(Some(raw), "score"));
    let percentage =
        number_at(results, "percentage").or_else(|| number_at(Some(raw), "percentage"));

    let answers = results
        .and_then(|value| value.get("answers"))
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        })
        .unwrap_or_default();

    let categories = results
        .and_then(|value| value.get("categories"))
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(key, value)| as_number(value).map(|number| (key.clone(), number)))
                .collect()
        })
        .unwrap_or_default();

    ResponsePayload {
        score,
        percentage,
        answers,
        categories,
    }
}

fn number_at(container: Option<&Value>, name: &str) -> Option<f64> {
    container.and_then(|value| value.get(name)).and_then(as_number)
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64().filter(|parsed| parsed.is_finite()),
        // Legacy exports wrote numbers as strings, sometimes with a
        // decimal comma.
        Value::String(text) => text.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    }
}

fn string_field(raw: &Value, names: &[&str]) -> Option<String> {
    for name in names {
        match raw.get(*name) {
            Some(Value::String(text)) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
            Some(Value::Number(number)) => return Some(number.to_string()),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn read_at() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn empty_document_gets_all_defaults() {
        let record = normalize_response(&json!({}), "resp-42", read_at());

        assert_eq!(record.id, "resp-42");
        assert_eq!(record.survey_title, UNKNOWN_SURVEY);
        assert_eq!(record.timestamp, read_at());
        assert!(record.synthetic_timestamp);
        assert_eq!(record.results, ResponsePayload::default());
    }

    #[test]
    fn embedded_id_wins_over_filename() {
        let record = normalize_response(&json!({"id": "embedded"}), "file-stem", read_at());
        assert_eq!(record.id, "embedded");

        let numeric = normalize_response(&json!({"id": 17}), "file-stem", read_at());
        assert_eq!(numeric.id, "17");
    }

    #[test]
    fn timestamp_shapes_all_parse() {
        let cases = [
            json!({"timestamp": "2024-03-05T08:30:00Z"}),
            json!({"timestamp": "2024-03-05 08:30:00"}),
            json!({"createdAt": "2024-03-05T08:30:00+00:00"}),
            json!({"timestamp": 1709627400}),
            json!({"timestamp": 1709627400000i64}),
        ];
        for raw in &cases {
            let record = normalize_response(raw, "x", read_at());
            assert!(!record.synthetic_timestamp, "raw: {raw}");
            assert_eq!(
                record.timestamp.to_rfc3339(),
                "2024-03-05T08:30:00+00:00",
                "raw: {raw}"
            );
        }
    }

    #[test]
    fn unparseable_timestamp_is_synthetic() {
        let record = normalize_response(&json!({"timestamp": "soon"}), "x", read_at());
        assert!(record.synthetic_timestamp);
        assert_eq!(record.timestamp, read_at());
    }

    #[test]
    fn payload_reads_nested_then_legacy_top_level_fields() {
        let nested = normalize_response(
            &json!({"results": {"score": 12.5, "percentage": 85}}),
            "x",
            read_at(),
        );
        assert_eq!(nested.results.score, Some(12.5));
        assert_eq!(nested.results.percentage, Some(85.0));

        let legacy = normalize_response(&json!({"score": "7,5", "percentage": "72"}), "x", read_at());
        assert_eq!(legacy.results.score, Some(7.5));
        assert_eq!(legacy.results.percentage, Some(72.0));
    }

    #[test]
    fn non_numeric_category_entries_are_ignored() {
        let record = normalize_response(
            &json!({"results": {"categories": {"focus": 3.5, "broken": "n/a", "text": true}}}),
            "x",
            read_at(),
        );
        assert_eq!(record.results.categories.len(), 1);
        assert_eq!(record.results.categories.get("focus"), Some(&3.5));
    }

    #[test]
    fn email_without_recipient_is_rejected() {
        let raw = json!({"id": "e1", "surveyTitle": "V1"});
        let err = normalize_email(&raw, "e1", read_at()).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::MissingRecipient { ref id } if id == "e1"
        ));

        let blank = json!({"id": "e2", "recipientEmail": "   "});
        assert!(normalize_email(&blank, "e2", read_at()).is_err());
    }

    #[test]
    fn email_record_carries_delivery_metadata() {
        let raw = json!({
            "recipientEmail": "person@example.com",
            "surveyTitle": "Wellness 2024",
            "method": "smtp",
            "timestamp": "2024-03-05T08:30:00Z"
        });
        let record = normalize_email(&raw, "email-1", read_at()).unwrap();

        assert_eq!(record.id, "email-1");
        assert_eq!(record.recipient_email, "person@example.com");
        assert_eq!(record.survey_title, "Wellness 2024");
        assert_eq!(record.method.as_deref(), Some("smtp"));
        assert!(!record.synthetic_timestamp);
    }

    #[test]
    fn normalization_is_deterministic() {
        let raw = json!({"id": "r", "results": {"percentage": 50}});
        let first = normalize_response(&raw, "r", read_at());
        let second = normalize_response(&raw, "r", read_at());
        assert_eq!(first, second);
    }
}
