use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use rust_xlsxwriter::{Format, Workbook};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::error::ExportError;
use crate::store::models::{EmailRecord, ResponseRecord};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const FIXED_HEADERS: [&str; 5] = ["id", "timestamp", "surveyTitle", "score", "percentage"];

/// One deduplicated mailing-list entry. Metadata comes from the first
/// record seen for the address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailingEntry {
    pub email: String,
    pub survey_title: String,
    pub method: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Distinct category keys across the export set, in fixed (alphabetical)
/// column order.
fn category_columns(records: &[ResponseRecord]) -> Vec<String> {
    let mut keys: BTreeSet<&str> = BTreeSet::new();
    for record in records {
        for category in record.results.categories.keys() {
            keys.insert(category.as_str());
        }
    }
    keys.into_iter().map(str::to_string).collect()
}

/// Serialize the record snapshot as CSV: the fixed columns, then one
/// column per distinct category key. Missing values render as empty
/// cells, never as "null" text.
pub fn export_csv(records: &[ResponseRecord]) -> Result<String, ExportError> {
    if records.is_empty() {
        return Err(ExportError::NoData);
    }
    let categories = category_columns(records);

    let mut buffer = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut buffer);

        let mut headers: Vec<String> = FIXED_HEADERS.iter().map(|h| h.to_string()).collect();
        headers.extend(categories.iter().cloned());
        writer.write_record(&headers)?;

        for record in records {
            let mut row = vec![
                record.id.clone(),
                record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                record.survey_title.clone(),
                record
                    .results
                    .score
                    .map(|value| format!("{:.2}", value))
                    .unwrap_or_default(),
                record
                    .results
                    .percentage
                    .map(|value| format!("{:.2}", value))
                    .unwrap_or_default(),
            ];
            for category in &categories {
                row.push(
                    record
                        .results
                        .categories
                        .get(category)
                        .map(|value| format!("{:.2}", value))
                        .unwrap_or_default(),
                );
            }
            writer.write_record(&row)?;
        }
        writer.flush().map_err(ExportError::Io)?;
    }

    String::from_utf8(buffer).map_err(|err| {
        ExportError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    })
}

/// Serialize the record snapshot as pretty-printed JSON in the canonical
/// record shape; re-parsing the output yields the input sequence.
pub fn export_json(records: &[ResponseRecord]) -> Result<String, ExportError> {
    if records.is_empty() {
        return Err(ExportError::NoData);
    }
    Ok(serde_json::to_string_pretty(records)?)
}

/// Workbook variant of the CSV table: bold header row, native datetime
/// cells, numeric score cells.
pub fn export_xlsx(records: &[ResponseRecord], path: &Path) -> Result<(), ExportError> {
    if records.is_empty() {
        return Err(ExportError::NoData);
    }
    let categories = category_columns(records);

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    let header_format = Format::new().set_bold().set_background_color(0xDDDDDD);
    let datetime_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

    let mut col: u16 = 0;
    for header in FIXED_HEADERS {
        worksheet.write_string_with_format(0, col, header, &header_format)?;
        col += 1;
    }
    for category in &categories {
        worksheet.write_string_with_format(0, col, category, &header_format)?;
        col += 1;
    }

    for (row_idx, record) in records.iter().enumerate() {
        let row = (row_idx + 1) as u32;
        worksheet.write_string(row, 0, &record.id)?;
        worksheet.write_datetime_with_format(row, 1, &record.timestamp.naive_utc(), &datetime_format)?;
        worksheet.write_string(row, 2, &record.survey_title)?;

        let mut col: u16 = 3;
        for value in [record.results.score, record.results.percentage] {
            match value {
                Some(number) => worksheet.write_number(row, col, number)?,
                None => worksheet.write_string(row, col, "")?,
            };
            col += 1;
        }
        for category in &categories {
            match record.results.categories.get(category) {
                Some(number) => worksheet.write_number(row, col, *number)?,
                None => worksheet.write_string(row, col, "")?,
            };
            col += 1;
        }
    }

    workbook.save(path)?;
    Ok(())
}

/// Deduplicated recipient list, optionally partitioned by survey
/// version. A later occurrence of an already-seen address never
/// overwrites the first-seen entry.
pub fn generate_mailing_list(
    emails: &[EmailRecord],
    survey: Option<&str>,
) -> Result<Vec<MailingEntry>, ExportError> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut entries: Vec<MailingEntry> = Vec::new();

    for record in emails {
        if let Some(survey) = survey {
            if record.survey_title != survey {
                continue;
            }
        }
        if !seen.insert(canonical_email(&record.recipient_email)) {
            continue;
        }
        entries.push(MailingEntry {
            email: record.recipient_email.clone(),
            survey_title: record.survey_title.clone(),
            method: record.method.clone(),
            timestamp: record.timestamp,
        });
    }

    if entries.is_empty() {
        return Err(ExportError::NoData);
    }
    Ok(entries)
}

/// Dedup key: NFKC-folded, lowercased, trimmed address. The stored entry
/// keeps the original spelling.
fn canonical_email(address: &str) -> String {
    address.trim().nfkc().collect::<String>().to_lowercase()
}

pub fn mailing_list_json(entries: &[MailingEntry]) -> Result<String, ExportError> {
    if entries.is_empty() {
        return Err(ExportError::NoData);
    }
    Ok(serde_json::to_string_pretty(entries)?)
}

pub fn mailing_list_csv(entries: &[MailingEntry]) -> Result<String, ExportError> {
    if entries.is_empty() {
        return Err(ExportError::NoData);
    }

    let mut buffer = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut buffer);
        writer.write_record(["email", "surveyTitle", "method", "timestamp"])?;
        for entry in entries {
            let timestamp = entry.timestamp.format(TIMESTAMP_FORMAT).to_string();
            writer.write_record([
                entry.email.as_str(),
                entry.survey_title.as_str(),
                entry.method.as_deref().unwrap_or(""),
                timestamp.as_str(),
            ])?;
        }
        writer.flush().map_err(ExportError::Io)?;
    }

    String::from_utf8(buffer).map_err(|err| {
        ExportError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    })
}

/// Delivery-ready form: one address per line.
pub fn export_email_list(emails: &[EmailRecord]) -> Result<String, ExportError> {
    let entries = generate_mailing_list(emails, None)?;
    let addresses: Vec<&str> = entries.iter().map(|entry| entry.email.as_str()).collect();
    Ok(addresses.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::ResponsePayload;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn instant(text: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(text).unwrap().with_timezone(&Utc)
    }

    fn response(id: &str, percentage: Option<f64>, categories: &[(&str, f64)]) -> ResponseRecord {
        ResponseRecord {
            id: id.to_string(),
            timestamp: instant("2024-03-01T10:30:00Z"),
            synthetic_timestamp: false,
            survey_title: "V1".to_string(),
            results: ResponsePayload {
                score: percentage.map(|value| value / 10.0),
                percentage,
                answers: BTreeMap::new(),
                categories: categories
                    .iter()
                    .map(|(name, value)| (name.to_string(), *value))
                    .collect(),
            },
            ip: None,
            user_agent: None,
        }
    }

    fn email(id: &str, address: &str, survey: &str) -> EmailRecord {
        EmailRecord {
            id: id.to_string(),
            recipient_email: address.to_string(),
            survey_title: survey.to_string(),
            results: ResponsePayload::default(),
            timestamp: instant("2024-03-01T10:30:00Z"),
            synthetic_timestamp: false,
            ip: None,
            user_agent: None,
            method: Some("smtp".to_string()),
        }
    }

    #[test]
    fn csv_has_fixed_columns_then_category_columns() {
        let records = vec![
            response("a", Some(85.0), &[("focus", 4.0)]),
            response("b", None, &[("energy", 2.5)]),
        ];

        let csv = export_csv(&records).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "id,timestamp,surveyTitle,score,percentage,energy,focus"
        );
        assert_eq!(
            lines.next().unwrap(),
            "a,2024-03-01 10:30:00,V1,8.50,85.00,,4.00"
        );
        // Missing score/percentage render as empty cells, not "null".
        assert_eq!(lines.next().unwrap(), "b,2024-03-01 10:30:00,V1,,,2.50,");
    }

    #[test]
    fn json_export_round_trips() {
        let records = vec![
            response("a", Some(85.0), &[("focus", 4.0)]),
            response("b", None, &[]),
        ];

        let json = export_json(&records).unwrap();
        let parsed: Vec<ResponseRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, records);
    }

    #[test]
    fn xlsx_export_writes_a_workbook() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        let records = vec![response("a", Some(85.0), &[("focus", 4.0)])];

        export_xlsx(&records, &path).unwrap();

        let written = std::fs::metadata(&path).unwrap();
        assert!(written.len() > 0);
    }

    #[test]
    fn empty_input_is_a_distinct_export_error() {
        assert!(matches!(export_csv(&[]), Err(ExportError::NoData)));
        assert!(matches!(export_json(&[]), Err(ExportError::NoData)));
        assert!(matches!(
            generate_mailing_list(&[], None),
            Err(ExportError::NoData)
        ));
    }

    #[test]
    fn mailing_list_keeps_first_seen_metadata() {
        let emails = vec![
            email("e1", "Person@Example.com", "V1"),
            email("e2", "person@example.com", "V2"),
            email("e3", "other@example.com", "V1"),
        ];

        let entries = generate_mailing_list(&emails, None).unwrap();
        assert_eq!(entries.len(), 2);
        // First-seen spelling and survey version win for the duplicate.
        assert_eq!(entries[0].email, "Person@Example.com");
        assert_eq!(entries[0].survey_title, "V1");
        assert_eq!(entries[1].email, "other@example.com");
    }

    #[test]
    fn mailing_list_partitions_by_survey() {
        let emails = vec![
            email("e1", "a@example.com", "V1"),
            email("e2", "b@example.com", "V2"),
        ];

        let entries = generate_mailing_list(&emails, Some("V2")).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].email, "b@example.com");

        assert!(matches!(
            generate_mailing_list(&emails, Some("V3")),
            Err(ExportError::NoData)
        ));
    }

    #[test]
    fn email_list_is_one_address_per_line() {
        let emails = vec![
            email("e1", "a@example.com", "V1"),
            email("e2", "b@example.com", "V1"),
            email("e3", "a@example.com", "V2"),
        ];

        let list = export_email_list(&emails).unwrap();
        assert_eq!(list, "a@example.com\nb@example.com");
    }

    #[test]
    fn mailing_list_csv_round_trips_through_headers() {
        let entries = generate_mailing_list(&[email("e1", "a@example.com", "V1")], None).unwrap();
        let csv = mailing_list_csv(&entries).unwrap();

        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), "email,surveyTitle,method,timestamp");
        assert_eq!(
            lines.next().unwrap(),
            "a@example.com,V1,smtp,2024-03-01 10:30:00"
        );
    }
}
