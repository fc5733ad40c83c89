// src/importer/cell.rs

use calamine::{Data, DataType};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// One spreadsheet cell as the row parser sees it.
///
/// Readers (xlsx, ods, csv) map whatever the file holds into one of these four
/// shapes; every conversion to a typed value happens in the row parser.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    DateTime(NaiveDateTime),
    Empty,
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.is_empty() { Cell::Empty } else { Cell::Text(s) }
    }

    /// A cell counts as present when it carries something other than blanks.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) | Cell::DateTime(_) => false,
        }
    }

    /// Trimmed textual form of the cell.
    ///
    /// Whole numbers render without a decimal part so that a mobile number
    /// stored as a numeric cell reads back as `593991234567`.
    pub fn to_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            Cell::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// Cell at `idx`, treating a short row as trailing empty cells.
pub fn cell_at(row: &[Cell], idx: usize) -> &Cell {
    row.get(idx).unwrap_or(&Cell::Empty)
}

/// Base date spreadsheet programs use for time-only values.
fn time_base_date() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1899, 12, 30)
}

/// ODS stores dates as ISO 8601 text and times as ISO durations.
fn iso_datetime(value: &Data) -> Option<NaiveDateTime> {
    match value {
        Data::DateTimeIso(_) => value
            .as_datetime()
            .or_else(|| value.as_date().map(|d| d.and_time(NaiveTime::MIN))),
        Data::DurationIso(_) => value
            .as_time()
            .and_then(|t| time_base_date().map(|d| d.and_time(t))),
        _ => None,
    }
}

impl From<Data> for Cell {
    fn from(value: Data) -> Self {
        if let Some(dt) = iso_datetime(&value) {
            return Cell::DateTime(dt);
        }

        match value {
            Data::Empty => Cell::Empty,
            Data::String(s) => Cell::text(s),
            Data::Int(i) => Cell::Number(i as f64),
            Data::Float(f) => Cell::Number(f),
            Data::Bool(b) => Cell::Text(b.to_string()),
            Data::DateTime(dt) => match dt.as_datetime() {
                Some(ndt) => Cell::DateTime(ndt),
                None => Cell::Number(dt.as_f64()),
            },
            // unparseable ISO text stays text so the row parser can reject it
            Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::text(s),
            Data::Error(e) => Cell::Text(format!("#{e:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_numbers_render_as_integers() {
        assert_eq!(Cell::Number(593991234567.0).to_text(), "593991234567");
        assert_eq!(Cell::Number(1.5).to_text(), "1.5");
    }

    #[test]
    fn blank_detection_ignores_whitespace() {
        assert!(Cell::Empty.is_blank());
        assert!(Cell::Text("   ".into()).is_blank());
        assert!(!Cell::Number(0.0).is_blank());
        assert!(!Cell::Text(" x ".into()).is_blank());
    }

    #[test]
    fn short_rows_read_as_empty() {
        let row = vec![Cell::text("a")];
        assert_eq!(cell_at(&row, 0), &Cell::Text("a".into()));
        assert_eq!(cell_at(&row, 3), &Cell::Empty);
    }

    #[test]
    fn calamine_values_map_to_cells() {
        assert_eq!(Cell::from(calamine::Data::Int(7)), Cell::Number(7.0));
        assert_eq!(Cell::from(calamine::Data::String(String::new())), Cell::Empty);
        assert_eq!(
            Cell::from(calamine::Data::String("Juan".into())),
            Cell::Text("Juan".into())
        );
    }

    #[test]
    fn iso_date_cells_become_datetimes() {
        let expected = NaiveDate::from_ymd_opt(2026, 1, 20)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        assert_eq!(
            Cell::from(Data::DateTimeIso("2026-01-20T09:00:00".into())),
            Cell::DateTime(expected)
        );

        let midnight = NaiveDate::from_ymd_opt(2026, 1, 21)
            .unwrap()
            .and_time(NaiveTime::MIN);
        assert_eq!(
            Cell::from(Data::DateTimeIso("2026-01-21".into())),
            Cell::DateTime(midnight)
        );
    }

    #[test]
    fn iso_duration_cells_become_times_on_the_base_date() {
        let Cell::DateTime(dt) = Cell::from(Data::DurationIso("PT09H30M00S".into())) else {
            panic!("duration should map to a datetime");
        };
        assert_eq!(dt.time(), NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(1899, 12, 30).unwrap());
    }

    #[test]
    fn malformed_iso_cells_fall_back_to_text() {
        assert_eq!(
            Cell::from(Data::DateTimeIso("mañana".into())),
            Cell::Text("mañana".into())
        );
        assert_eq!(
            Cell::from(Data::DurationIso("P1D".into())),
            Cell::Text("P1D".into())
        );
    }

    #[test]
    fn datetime_text_form() {
        let dt = NaiveDate::from_ymd_opt(2026, 1, 20)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        assert_eq!(Cell::DateTime(dt).to_text(), "2026-01-20 09:00:00");
    }
}
