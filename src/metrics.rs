use std::cmp::Ordering;

use crate::workbook::{StudentRecord, TopicData};

/// Half-up rounding at one decimal, shared by every derived metric.
pub fn round1(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

/// Absence propagates: no marks, no percentage. A zero denominator also
/// yields none.
pub fn percentage(marks: Option<f64>, total_marks: f64) -> Option<f64> {
    let marks = marks?;
    if total_marks == 0.0 {
        return None;
    }
    Some(round1(marks / total_marks * 100.0))
}

/// Standard competition ranking, highest marks first: equal marks share a
/// rank and consume the following slots (1-2-2-4). Absent students get no
/// rank and occupy no slot. Assignment goes through row indices so the
/// original row order is untouched.
pub fn assign_ranks(students: &mut [StudentRecord]) {
    let mut order: Vec<usize> = (0..students.len())
        .filter(|&i| students[i].marks.is_some())
        .collect();
    order.sort_by(|&a, &b| {
        students[b]
            .marks
            .partial_cmp(&students[a].marks)
            .unwrap_or(Ordering::Equal)
    });

    let mut prev_marks: Option<f64> = None;
    let mut prev_rank = 0u32;
    for (pos, &idx) in order.iter().enumerate() {
        let rank = if pos > 0 && students[idx].marks == prev_marks {
            prev_rank
        } else {
            pos as u32 + 1
        };
        prev_marks = students[idx].marks;
        prev_rank = rank;
        students[idx].rank = Some(rank);
    }
}

/// Mean of the non-absent marks at one decimal; 0 when nobody scored.
pub fn class_average(students: &[StudentRecord]) -> f64 {
    let scored: Vec<f64> = students.iter().filter_map(|s| s.marks).collect();
    if scored.is_empty() {
        return 0.0;
    }
    round1(scored.iter().sum::<f64>() / scored.len() as f64)
}

/// Highest non-absent mark; 0 when nobody scored.
pub fn topper_marks(students: &[StudentRecord]) -> f64 {
    students
        .iter()
        .filter_map(|s| s.marks)
        .reduce(f64::max)
        .unwrap_or(0.0)
}

/// Single enrichment entry point: per-student percentages, then ranks over
/// the enriched list, then the topic-level aggregates. Callers never invoke
/// the sub-metrics directly.
pub fn process_topic(topic: &mut TopicData) {
    for s in &mut topic.students {
        s.percentage = percentage(s.marks, topic.total_marks);
    }
    assign_ranks(&mut topic.students);
    topic.class_average = class_average(&topic.students);
    topic.topper_marks = topper_marks(&topic.students);
}
