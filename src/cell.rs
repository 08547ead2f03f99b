use calamine::Data;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::diag::Diagnostics;

/// Spreadsheet serial day of the Unix epoch (serial dates count from
/// 1899-12-30).
const UNIX_EPOCH_SERIAL: f64 = 25569.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Typed cell at the ingestion boundary. Raw workbook values are converted
/// once here; nothing deeper in the pipeline sees an untyped cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Date(DateTime<Utc>),
    Empty,
}

impl CellValue {
    pub fn from_data(data: &Data) -> Self {
        match data {
            Data::Empty | Data::Error(_) => CellValue::Empty,
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Float(f) => CellValue::Number(*f),
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Bool(b) => CellValue::Text(b.to_string()),
            // Keep the raw serial; normalize_date owns the epoch math.
            Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
            Data::DateTimeIso(s) => match parse_date_text(s) {
                Some(dt) => CellValue::Date(dt),
                None => CellValue::Text(s.clone()),
            },
            Data::DurationIso(s) => CellValue::Text(s.clone()),
        }
    }

    /// Cell content as the string a label or name column would show.
    pub fn display(&self) -> String {
        match self {
            CellValue::Number(n) => format!("{}", n),
            CellValue::Text(s) => s.clone(),
            CellValue::Date(dt) => dt.to_rfc3339(),
            CellValue::Empty => String::new(),
        }
    }
}

/// Flattens a worksheet's used range into a relative 2-D grid, row 0 being
/// the first used row.
pub fn grid_from_range(range: &calamine::Range<Data>) -> Vec<Vec<CellValue>> {
    range
        .rows()
        .map(|row| row.iter().map(CellValue::from_data).collect())
        .collect()
}

/// Converts a date cell to an absolute instant. Numeric cells are serial
/// day counts (midnight UTC of that day), date cells pass through, text is
/// parsed in the common formats. Anything else falls back to the current
/// instant; the fallback is reported on the diagnostics channel, never as
/// an error.
pub fn normalize_date(cell: &CellValue, diags: &mut Diagnostics) -> DateTime<Utc> {
    match cell {
        CellValue::Number(serial) => {
            let secs = ((serial - UNIX_EPOCH_SERIAL) * SECONDS_PER_DAY).round() as i64;
            match Utc.timestamp_opt(secs, 0).single() {
                Some(dt) => dt,
                None => date_fallback(diags, format!("serial {} out of range", serial)),
            }
        }
        CellValue::Date(dt) => *dt,
        CellValue::Text(s) => match parse_date_text(s) {
            Some(dt) => dt,
            None => date_fallback(diags, format!("unparsable date {:?}", s)),
        },
        CellValue::Empty => date_fallback(diags, "empty date cell".to_string()),
    }
}

fn date_fallback(diags: &mut Diagnostics, why: String) -> DateTime<Utc> {
    diags.warn("date_fallback", format!("{}, using current time", why));
    Utc::now()
}

fn parse_date_text(s: &str) -> Option<DateTime<Utc>> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(t, fmt) {
            return Some(Utc.from_utc_datetime(&dt));
        }
    }
    for fmt in ["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(t, fmt) {
            return d.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt));
        }
    }
    None
}

/// Converts a marks cell to a score. Empty cells and the absence tokens
/// yield `None`; so does non-numeric content, which additionally raises a
/// diagnostic so bad data stays observable.
pub fn normalize_marks(cell: &CellValue, diags: &mut Diagnostics) -> Option<f64> {
    match cell {
        CellValue::Empty => None,
        CellValue::Number(n) => Some(*n),
        CellValue::Date(_) => {
            diags.warn("marks_unparsable", "date in marks cell, treating as absent");
            None
        }
        CellValue::Text(s) => {
            let t = s.trim().to_ascii_uppercase();
            if t.is_empty() || matches!(t.as_str(), "AB" | "ABS" | "-") {
                return None;
            }
            match t.parse::<f64>() {
                Ok(n) => Some(n),
                Err(_) => {
                    diags.warn(
                        "marks_unparsable",
                        format!("marks cell {:?} is not numeric, treating as absent", s),
                    );
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn serial_dates_count_from_1899_12_30() {
        let mut diags = Diagnostics::new();
        assert_eq!(
            normalize_date(&CellValue::Number(25569.0), &mut diags),
            utc(1970, 1, 1)
        );
        assert_eq!(
            normalize_date(&CellValue::Number(45292.0), &mut diags),
            utc(2024, 1, 1)
        );
        assert!(diags.events().is_empty());
    }

    #[test]
    fn string_dates_parse_at_midnight_utc() {
        let mut diags = Diagnostics::new();
        let dt = normalize_date(&CellValue::Text("2024-01-05".to_string()), &mut diags);
        assert_eq!(dt, utc(2024, 1, 5));
        assert!(diags.events().is_empty());
    }

    #[test]
    fn date_cells_pass_through() {
        let mut diags = Diagnostics::new();
        let dt = utc(2023, 9, 14);
        assert_eq!(normalize_date(&CellValue::Date(dt), &mut diags), dt);
    }

    #[test]
    fn bad_dates_fall_back_to_now_with_diagnostic() {
        let mut diags = Diagnostics::new();
        let before = Utc::now();
        let dt = normalize_date(&CellValue::Text("soonish".to_string()), &mut diags);
        assert!(dt >= before);
        assert_eq!(diags.events().len(), 1);
        assert_eq!(diags.events()[0].code, "date_fallback");

        let empty = normalize_date(&CellValue::Empty, &mut diags);
        assert!(empty >= before);
        assert_eq!(diags.events().len(), 2);
    }

    #[test]
    fn absence_tokens_yield_no_marks() {
        let mut diags = Diagnostics::new();
        for cell in [
            CellValue::Empty,
            CellValue::Text(String::new()),
            CellValue::Text("  ".to_string()),
            CellValue::Text("AB".to_string()),
            CellValue::Text("abs".to_string()),
            CellValue::Text("-".to_string()),
        ] {
            assert_eq!(normalize_marks(&cell, &mut diags), None, "{:?}", cell);
        }
        // Absence is a normal state, not a diagnostic.
        assert!(diags.events().is_empty());
    }

    #[test]
    fn numeric_marks_parse() {
        let mut diags = Diagnostics::new();
        assert_eq!(normalize_marks(&CellValue::Number(87.0), &mut diags), Some(87.0));
        assert_eq!(
            normalize_marks(&CellValue::Text(" 42.5 ".to_string()), &mut diags),
            Some(42.5)
        );
    }

    #[test]
    fn unparsable_marks_degrade_to_absent_with_diagnostic() {
        let mut diags = Diagnostics::new();
        assert_eq!(
            normalize_marks(&CellValue::Text("n/a".to_string()), &mut diags),
            None
        );
        assert_eq!(diags.events().len(), 1);
        assert_eq!(diags.events()[0].code, "marks_unparsable");
    }
}
