use crate::db::SubmissionSummary;
use crate::error::ExportError;
use crate::score::format_score;

pub const CSV_HEADER: [&str; 6] = [
    "name",
    "email",
    "course",
    "computed_score",
    "computed_grade",
    "submitted_at",
];

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Renders the submission log as UTF-8 CSV, rows in the order given.
pub fn submissions_csv(rows: &[SubmissionSummary]) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for row in rows {
        writer.write_record([
            row.name.as_str(),
            row.email.as_str(),
            row.course.as_str(),
            format_score(row.computed_score).as_str(),
            row.computed_grade.as_str(),
            row.submitted_at.format(TIMESTAMP_FORMAT).to_string().as_str(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| ExportError::Buffer(e.to_string()))
}
