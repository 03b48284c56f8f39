use chrono::{DateTime, SecondsFormat, Utc};
use csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::models::pass::Pass;

/// Column order of the export; downstream spreadsheets depend on it
pub const EXPORT_COLUMNS: [&str; 9] = [
    "id",
    "studentName",
    "teacher",
    "destination",
    "reason",
    "createdAt",
    "returnedAt",
    "status",
    "createdBy",
];

#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV buffer flush failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV output is not UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Millisecond RFC 3339 in UTC, e.g. `2024-03-04T09:15:00.000Z`
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Serialises passes in the given order. Every field is quoted, embedded
/// quotes are doubled, and rows end with `\n`.
pub fn export_passes(passes: &[Pass]) -> Result<String, ExportError> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(EXPORT_COLUMNS)?;

    for pass in passes {
        let created_at = format_timestamp(&pass.created_at);
        let returned_at = pass
            .returned_at
            .as_ref()
            .map(format_timestamp)
            .unwrap_or_default();

        writer.write_record([
            pass.id.as_str(),
            pass.student_name.as_str(),
            pass.teacher.as_str(),
            pass.destination.as_str(),
            pass.reason.as_deref().unwrap_or(""),
            created_at.as_str(),
            returned_at.as_str(),
            pass.status.as_str(),
            pass.created_by.as_str(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))?;

    Ok(String::from_utf8(bytes)?)
}

/// File name offered to the browser, stamped with the export date
pub fn export_filename(now: &DateTime<Utc>) -> String {
    format!("hall-passes-{}.csv", now.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pass::{Destination, PassStatus};
    use chrono::{Duration, TimeZone};

    fn sample_passes() -> Vec<Pass> {
        let created = Utc.with_ymd_and_hms(2024, 3, 4, 9, 15, 0).unwrap();
        vec![
            Pass {
                id: "p2".to_string(),
                student_name: "Jordan \"JJ\" Lee".to_string(),
                teacher: "Rm 101, upstairs".to_string(),
                destination: Destination::Custom("Library\nannex".to_string()),
                reason: Some("Needs a book, \"urgent\"".to_string()),
                created_at: created + Duration::minutes(5),
                returned_at: None,
                status: PassStatus::Active,
                created_by: "anonymous".to_string(),
            },
            Pass {
                id: "p1".to_string(),
                student_name: "Alex".to_string(),
                teacher: "Mrs. Daleo".to_string(),
                destination: Destination::Nurse,
                reason: None,
                created_at: created,
                returned_at: Some(created + Duration::minutes(7)),
                status: PassStatus::Returned,
                created_by: "mrs.daleo@school.edu".to_string(),
            },
        ]
    }

    #[test]
    fn test_header_and_quoting() {
        let csv = export_passes(&sample_passes()[1..]).unwrap();
        let expected = concat!(
            "\"id\",\"studentName\",\"teacher\",\"destination\",\"reason\",",
            "\"createdAt\",\"returnedAt\",\"status\",\"createdBy\"\n",
            "\"p1\",\"Alex\",\"Mrs. Daleo\",\"Nurse\",\"\",",
            "\"2024-03-04T09:15:00.000Z\",\"2024-03-04T09:22:00.000Z\",",
            "\"returned\",\"mrs.daleo@school.edu\"\n",
        );
        assert_eq!(csv, expected);
    }

    #[test]
    fn test_embedded_quotes_are_doubled() {
        let csv = export_passes(&sample_passes()[..1]).unwrap();
        assert!(csv.contains("\"Jordan \"\"JJ\"\" Lee\""));
    }

    #[test]
    fn test_parse_back_reproduces_fields() {
        let passes = sample_passes();
        let csv = export_passes(&passes).unwrap();

        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), EXPORT_COLUMNS.to_vec());

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), passes.len());

        for (row, pass) in rows.iter().zip(&passes) {
            assert_eq!(&row[0], pass.id);
            assert_eq!(&row[1], pass.student_name);
            assert_eq!(&row[2], pass.teacher);
            assert_eq!(&row[3], pass.destination.as_str());
            assert_eq!(&row[4], pass.reason.as_deref().unwrap_or(""));
            assert_eq!(
                DateTime::parse_from_rfc3339(&row[5]).unwrap().with_timezone(&Utc),
                pass.created_at
            );
            let returned_at = (!row[6].is_empty()).then(|| {
                DateTime::parse_from_rfc3339(&row[6])
                    .unwrap()
                    .with_timezone(&Utc)
            });
            assert_eq!(returned_at, pass.returned_at);
            assert_eq!(&row[7], pass.status.as_str());
            assert_eq!(&row[8], pass.created_by);
        }
        assert_eq!(&rows[0][6], "");
        assert_eq!(&rows[1][6], "2024-03-04T09:22:00.000Z");
    }

    #[test]
    fn test_empty_export_is_header_only() {
        let csv = export_passes(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn test_export_filename() {
        let now = Utc.with_ymd_and_hms(2024, 3, 4, 23, 59, 0).unwrap();
        assert_eq!(export_filename(&now), "hall-passes-2024-03-04.csv");
    }
}
