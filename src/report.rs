use std::path::Path;

use pdf_canvas::{BuiltinFont, Canvas, Pdf};

use crate::analytics::AggregateMetrics;
use crate::error::ExportError;
use crate::store::models::ResponseRecord;

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;

/// Render the summary report: metrics overview on the first page, then
/// the full record table, paginated so large sets are never silently
/// truncated.
pub fn export_pdf(
    metrics: &AggregateMetrics,
    records: &[ResponseRecord],
    path: &Path,
) -> Result<(), ExportError> {
    if records.is_empty() {
        return Err(ExportError::NoData);
    }
    let path = path.to_str().ok_or_else(|| {
        ExportError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "non-UTF-8 output path",
        ))
    })?;

    let summary_lines = summary_lines(metrics);
    let record_lines: Vec<String> = records.iter().map(record_line).collect();

    let first_capacity = first_page_capacity(summary_lines.len());
    let follow_capacity = followup_page_capacity();
    let page_ranges = partition_record_lines(record_lines.len(), first_capacity, follow_capacity);

    let mut document = Pdf::create(path)?;
    let title = "Survey Analytics Report";

    let (first_start, first_end) = page_ranges[0];
    document.render_page(PAGE_WIDTH, PAGE_HEIGHT, |canvas| {
        render_first_page(
            canvas,
            title,
            &summary_lines,
            &record_lines[first_start..first_end],
        )
    })?;

    for (page_index, &(start, end)) in page_ranges.iter().enumerate().skip(1) {
        document.render_page(PAGE_WIDTH, PAGE_HEIGHT, |canvas| {
            render_followup_page(canvas, title, page_index, &record_lines[start..end])
        })?;
    }

    document.finish()?;
    Ok(())
}

fn summary_lines(metrics: &AggregateMetrics) -> Vec<String> {
    let mut lines = vec![
        format!("Total responses: {}", metrics.total_responses),
        format!("Average score: {}", format_average(metrics.average_score)),
        format!(
            "Average percentage: {}",
            format_average(metrics.average_percentage)
        ),
    ];

    for version in &metrics.version_counts {
        lines.push(format!(
            "{}: {} responses",
            version.survey_title, version.count
        ));
    }
    for band in &metrics.score_distribution {
        lines.push(format!("Range {}: {} responses", band.range, band.count));
    }

    lines
}

fn format_average(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{:.2}", value),
        None => "n/a".to_string(),
    }
}

fn record_line(record: &ResponseRecord) -> String {
    let percentage = record
        .results
        .percentage
        .map(|value| format!("{:.2}%", value))
        .unwrap_or_else(|| "no percentage".to_string());
    let score = record
        .results
        .score
        .map(|value| format!("score {:.2}", value))
        .unwrap_or_else(|| "no score".to_string());

    format!(
        "{} - {} | {} | {} | {}",
        record.id,
        record.survey_title,
        score,
        percentage,
        record.timestamp.format("%Y-%m-%d %H:%M")
    )
}

fn first_page_capacity(summary_count: usize) -> usize {
    let mut cursor: f64 = 800.0;
    cursor -= 24.0;
    cursor -= 40.0;
    cursor -= summary_count as f64 * 16.0;
    cursor -= 20.0;
    cursor -= 24.0;
    let available = cursor - 80.0;
    if available <= 0.0 {
        0
    } else {
        (available / 16.0).floor() as usize
    }
}

fn followup_page_capacity() -> usize {
    let mut cursor: f64 = 800.0;
    cursor -= 24.0;
    let available = cursor - 80.0;
    (available / 16.0).floor() as usize
}

fn partition_record_lines(
    total: usize,
    first_capacity: usize,
    follow_capacity: usize,
) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let first_end = first_capacity.min(total);
    ranges.push((0, first_end));
    let mut start = first_end;
    let capacity = follow_capacity.max(1);
    while start < total {
        let end = (start + capacity).min(total);
        ranges.push((start, end));
        start = end;
    }
    ranges
}

fn render_first_page(
    canvas: &mut Canvas<'_>,
    title: &str,
    summary_lines: &[String],
    record_lines: &[String],
) -> std::io::Result<()> {
    let mut cursor_y = 800.0;
    canvas.left_text(50.0, cursor_y, BuiltinFont::Helvetica_Bold, 18.0, title)?;
    cursor_y -= 24.0;
    canvas.left_text(
        50.0,
        cursor_y,
        BuiltinFont::Helvetica,
        12.0,
        "Aggregated results for the current filter selection",
    )?;
    cursor_y -= 40.0;

    for line in summary_lines {
        canvas.left_text(50.0, cursor_y, BuiltinFont::Helvetica, 12.0, line)?;
        cursor_y -= 16.0;
    }

    cursor_y -= 20.0;
    canvas.left_text(50.0, cursor_y, BuiltinFont::Helvetica_Bold, 14.0, "Responses")?;
    cursor_y -= 24.0;

    for line in record_lines {
        canvas.left_text(50.0, cursor_y, BuiltinFont::Helvetica, 11.0, line)?;
        cursor_y -= 16.0;
    }

    Ok(())
}

fn render_followup_page(
    canvas: &mut Canvas<'_>,
    title: &str,
    page_index: usize,
    record_lines: &[String],
) -> std::io::Result<()> {
    let mut cursor_y = 800.0;
    let header = if page_index == 1 {
        format!("{} (continued)", title)
    } else {
        format!("{} (continued {})", title, page_index)
    };
    canvas.left_text(50.0, cursor_y, BuiltinFont::Helvetica_Bold, 14.0, &header)?;
    cursor_y -= 24.0;

    for line in record_lines {
        canvas.left_text(50.0, cursor_y, BuiltinFont::Helvetica, 11.0, line)?;
        cursor_y -= 16.0;
    }

    Ok(())
}
