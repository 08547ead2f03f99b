use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::diag::{Diagnostic, Diagnostics};
use crate::metrics;
use crate::workbook::{self, SubjectData};

/// One full pass over the data tree. Rebuilt from the source files on every
/// query; nothing here outlives the call that produced it, so results are
/// always as fresh as the last file write.
#[derive(Debug, Default)]
pub struct Scan {
    pub classes: BTreeMap<String, Vec<SubjectData>>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Walks the data root: each top-level directory is a class, each workbook
/// inside it one subject named by the file stem. A missing root reads as
/// "no data"; a file that fails to parse costs only that subject.
pub fn scan_all(root: &Path) -> Scan {
    let mut diags = Diagnostics::new();
    let mut classes: BTreeMap<String, Vec<SubjectData>> = BTreeMap::new();

    let Ok(entries) = std::fs::read_dir(root) else {
        return Scan::default();
    };

    for ent in entries.flatten() {
        let class_dir = ent.path();
        if !class_dir.is_dir() {
            continue;
        }
        let Some(class_name) = class_dir
            .file_name()
            .and_then(|s| s.to_str())
            .map(str::to_string)
        else {
            continue;
        };
        let subjects = scan_class(&class_dir, &class_name, &mut diags);
        classes.insert(class_name, subjects);
    }

    Scan {
        classes,
        diagnostics: diags.into_events(),
    }
}

fn scan_class(class_dir: &Path, class_name: &str, diags: &mut Diagnostics) -> Vec<SubjectData> {
    let mut files: Vec<PathBuf> = Vec::new();
    let Ok(entries) = std::fs::read_dir(class_dir) else {
        diags.warn(
            "class_unreadable",
            format!("cannot list {}", class_dir.display()),
        );
        return Vec::new();
    };
    for ent in entries.flatten() {
        let p = ent.path();
        if !p.is_file() {
            continue;
        }
        let name = p.file_name().and_then(|s| s.to_str()).unwrap_or("");
        if is_subject_file(name) {
            files.push(p);
        }
    }
    files.sort();

    let mut subjects = Vec::new();
    for path in files {
        let Some(subject_name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        match workbook::parse_subject_file(&path, class_name, subject_name, diags) {
            Ok(subject) => subjects.push(subject),
            Err(e) => diags.warn(
                "subject_unreadable",
                format!("{}: {:#}", path.display(), e),
            ),
        }
    }
    subjects
}

/// Subject workbooks only; editor lock files carry the `~$` prefix.
fn is_subject_file(name: &str) -> bool {
    name.ends_with(".xlsx") && !name.starts_with("~$")
}

pub fn class_names(scan: &Scan) -> Vec<String> {
    scan.classes.keys().cloned().collect()
}

pub fn subject_names(scan: &Scan, class_name: &str) -> Vec<String> {
    scan.classes
        .get(class_name)
        .map(|subjects| subjects.iter().map(|s| s.subject_name.clone()).collect())
        .unwrap_or_default()
}

#[allow(dead_code)]
pub fn class_subjects(scan: &Scan, class_name: &str) -> Vec<SubjectData> {
    subjects_for(scan, class_name, None)
}

pub fn subjects_for(scan: &Scan, class_name: &str, subject: Option<&str>) -> Vec<SubjectData> {
    let Some(subjects) = scan.classes.get(class_name) else {
        return Vec::new();
    };
    subjects
        .iter()
        .filter(|s| subject.map(|f| s.subject_name == f).unwrap_or(true))
        .cloned()
        .collect()
}

/// One row of a student's chronological history: the student's own fields
/// merged with the topic-level context they were scored in.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentTopicRecord {
    pub name: String,
    pub marks: Option<f64>,
    pub comments: String,
    pub percentage: Option<f64>,
    pub rank: Option<u32>,
    pub subject: String,
    pub topic: String,
    pub date: DateTime<Utc>,
    pub total_marks: f64,
    pub class_average: f64,
    pub topper_marks: f64,
    pub class_average_percentage: Option<f64>,
    pub topper_percentage: Option<f64>,
}

/// Flattens every topic the student appears in (matched by exact name, the
/// first matching row per topic) across all classes and subjects, sorted
/// ascending by date.
pub fn student_history(scan: &Scan, student_name: &str) -> Vec<StudentTopicRecord> {
    let mut records = Vec::new();
    for subjects in scan.classes.values() {
        for subject in subjects {
            for topic in &subject.topics {
                let Some(row) = topic.students.iter().find(|s| s.name == student_name) else {
                    continue;
                };
                records.push(StudentTopicRecord {
                    name: row.name.clone(),
                    marks: row.marks,
                    comments: row.comments.clone(),
                    percentage: row.percentage,
                    rank: row.rank,
                    subject: subject.subject_name.clone(),
                    topic: topic.topic_name.clone(),
                    date: topic.date,
                    total_marks: topic.total_marks,
                    class_average: topic.class_average,
                    topper_marks: topic.topper_marks,
                    class_average_percentage: metrics::percentage(
                        Some(topic.class_average),
                        topic.total_marks,
                    ),
                    topper_percentage: metrics::percentage(
                        Some(topic.topper_marks),
                        topic.total_marks,
                    ),
                });
            }
        }
    }
    records.sort_by_key(|r| r.date);
    records
}
