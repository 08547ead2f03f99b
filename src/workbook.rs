use std::path::Path;

use anyhow::Context;
use calamine::{open_workbook, Reader, Xlsx};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cell::{self, CellValue};
use crate::diag::Diagnostics;
use crate::metrics;

/// One student's result in one topic. `marks` is `None` when the student
/// was absent; `percentage` and `rank` are `None` exactly then.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub name: String,
    pub marks: Option<f64>,
    pub comments: String,
    pub percentage: Option<f64>,
    pub rank: Option<u32>,
}

/// One assessment event within a subject. `students` keeps the source row
/// order; ranking annotates, it never reorders.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicData {
    pub topic_name: String,
    pub date: DateTime<Utc>,
    pub total_marks: f64,
    pub students: Vec<StudentRecord>,
    pub class_average: f64,
    pub topper_marks: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectData {
    pub subject_name: String,
    pub class_name: String,
    pub topics: Vec<TopicData>,
}

/// Parses one sheet grid into a raw topic.
///
/// Expected layout: row 0 is `[Date, <date>, Total Marks, <number>]`,
/// row 1 holds column labels, rows 2.. are `[name, marks, comments?]`.
/// Returns `None` when the sheet does not carry that layout; not every
/// sheet in a workbook need represent a topic.
pub fn parse_sheet(
    sheet_name: &str,
    grid: &[Vec<CellValue>],
    diags: &mut Diagnostics,
) -> Option<TopicData> {
    if grid.len() < 3 {
        return None;
    }

    let header = &grid[0];
    let header_ok = matches!(header.first(), Some(CellValue::Text(s)) if s == "Date")
        && matches!(header.get(2), Some(CellValue::Text(s)) if s == "Total Marks");
    if !header_ok {
        diags.warn(
            "sheet_schema_mismatch",
            format!("sheet {:?}: unexpected header row, skipping", sheet_name),
        );
        return None;
    }

    let date = cell::normalize_date(header.get(1).unwrap_or(&CellValue::Empty), diags);
    let total_marks = total_marks_value(header.get(3).unwrap_or(&CellValue::Empty));

    // Row 1 is the column-label header; only its position matters.
    let mut students = Vec::new();
    for row in &grid[2..] {
        let name = row.first().map(CellValue::display).unwrap_or_default();
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let marks = cell::normalize_marks(row.get(1).unwrap_or(&CellValue::Empty), diags);
        let comments = row
            .get(2)
            .map(CellValue::display)
            .unwrap_or_default()
            .trim()
            .to_string();
        students.push(StudentRecord {
            name: name.to_string(),
            marks,
            comments,
            percentage: None,
            rank: None,
        });
    }

    Some(TopicData {
        topic_name: sheet_name.to_string(),
        date,
        total_marks,
        students,
        class_average: 0.0,
        topper_marks: 0.0,
    })
}

fn total_marks_value(cell: &CellValue) -> f64 {
    match cell {
        CellValue::Number(n) => *n,
        CellValue::Text(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Reads one subject workbook. Each sheet is one topic; sheets are parsed
/// independently and enriched before they join the subject, so one bad
/// sheet never loses the rest of the workbook.
pub fn parse_subject_file(
    path: &Path,
    class_name: &str,
    subject_name: &str,
    diags: &mut Diagnostics,
) -> anyhow::Result<SubjectData> {
    let mut workbook: Xlsx<_> =
        open_workbook(path).with_context(|| format!("open workbook {}", path.display()))?;

    let mut topics = Vec::new();
    for sheet_name in workbook.sheet_names().to_vec() {
        let range = match workbook.worksheet_range(&sheet_name) {
            Ok(r) => r,
            Err(e) => {
                diags.warn(
                    "sheet_unreadable",
                    format!("sheet {:?} in {}: {}", sheet_name, path.display(), e),
                );
                continue;
            }
        };
        let grid = cell::grid_from_range(&range);
        if let Some(mut topic) = parse_sheet(&sheet_name, &grid, diags) {
            metrics::process_topic(&mut topic);
            topics.push(topic);
        }
    }

    Ok(SubjectData {
        subject_name: subject_name.to_string(),
        class_name: class_name.to_string(),
        topics,
    })
}
