// src/importer/row_parser.rs
//
// Turns one spreadsheet row into a validated record or a rejection.
// Column layout:
//   patients:     [first name, last name, mobile]
//   appointments: [mobile, date, time, status?]
// Anything past those columns is ignored.

use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use super::cell::{cell_at, Cell};
use super::error::{RowError, RowRejection};
use super::store::ImportStore;
use crate::models::AppointmentStatus;

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];
const TIME_FORMATS: [&str; 2] = ["%H:%M", "%H:%M:%S"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientRecord {
    pub first_name: String,
    pub last_name: String,
    pub mobile: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppointmentRecord {
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: AppointmentStatus,
}

pub fn parse_patient_row(cells: &[Cell]) -> Result<PatientRecord, RowRejection> {
    let first_name = cell_at(cells, 0);
    let last_name = cell_at(cells, 1);
    let mobile = cell_at(cells, 2);

    if first_name.is_blank() || last_name.is_blank() || mobile.is_blank() {
        return Err(RowRejection::MissingRequiredData);
    }

    Ok(PatientRecord {
        first_name: first_name.to_text(),
        last_name: last_name.to_text(),
        mobile: mobile.to_text(),
    })
}

/// Validates an appointment row. The mobile number is resolved against the
/// store before the date and time are looked at, so a row for an unknown
/// patient is reported as such even if its date is also malformed.
pub async fn parse_appointment_row<S>(
    cells: &[Cell],
    store: &S,
) -> Result<AppointmentRecord, RowError>
where
    S: ImportStore + ?Sized,
{
    let mobile = cell_at(cells, 0);
    let date = cell_at(cells, 1);
    let time = cell_at(cells, 2);

    if mobile.is_blank() || date.is_blank() || time.is_blank() {
        return Err(RowRejection::MissingRequiredData.into());
    }

    let mobile = mobile.to_text();
    let patient = store
        .find_patient_by_mobile(&mobile)
        .await?
        .ok_or(RowRejection::PatientNotFound(mobile))?;
    if !patient.is_active {
        tracing::debug!(patient_id = %patient.patient_id, "appointment row for an inactive patient");
    }

    let date = parse_date(date)?;
    let time = parse_time(time)?;
    let status = normalize_status(cell_at(cells, 3));

    Ok(AppointmentRecord {
        patient_id: patient.patient_id,
        date,
        time,
        status,
    })
}

pub fn parse_date(cell: &Cell) -> Result<NaiveDate, RowRejection> {
    match cell {
        Cell::DateTime(dt) => Ok(dt.date()),
        other => {
            let raw = other.to_text();
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(&raw, fmt).ok())
                .ok_or(RowRejection::InvalidDate)
        }
    }
}

pub fn parse_time(cell: &Cell) -> Result<NaiveTime, RowRejection> {
    match cell {
        Cell::DateTime(dt) => Ok(dt.time()),
        other => {
            let raw = other.to_text();
            TIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveTime::parse_from_str(&raw, fmt).ok())
                .ok_or(RowRejection::InvalidTime)
        }
    }
}

/// Unknown or empty statuses fall back to `pendiente` instead of rejecting
/// the row.
pub fn normalize_status(cell: &Cell) -> AppointmentStatus {
    let raw = cell.to_text().to_lowercase();
    AppointmentStatus::parse(&raw).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::store::MemoryStore;

    fn text(s: &str) -> Cell {
        Cell::text(s)
    }

    #[test]
    fn patient_row_is_trimmed() {
        let rec = parse_patient_row(&[text("  Juan "), text("Pérez"), text(" +593991234567 ")])
            .unwrap();
        assert_eq!(
            rec,
            PatientRecord {
                first_name: "Juan".into(),
                last_name: "Pérez".into(),
                mobile: "+593991234567".into(),
            }
        );
    }

    #[test]
    fn patient_row_with_numeric_mobile() {
        let rec = parse_patient_row(&[text("Ana"), text("Ruiz"), Cell::Number(593991112233.0)])
            .unwrap();
        assert_eq!(rec.mobile, "593991112233");
    }

    #[test]
    fn patient_row_missing_cells_is_rejected() {
        assert_eq!(
            parse_patient_row(&[text("Juan"), Cell::Empty, text("+593991234567")]),
            Err(RowRejection::MissingRequiredData)
        );
        assert_eq!(
            parse_patient_row(&[text("Juan"), text("Pérez")]),
            Err(RowRejection::MissingRequiredData)
        );
        assert_eq!(
            parse_patient_row(&[text("Juan"), text("  "), text("1")]),
            Err(RowRejection::MissingRequiredData)
        );
    }

    #[test]
    fn dates_accept_iso_and_day_first() {
        let expected = NaiveDate::from_ymd_opt(2026, 1, 20).unwrap();
        assert_eq!(parse_date(&text("2026-01-20")), Ok(expected));
        assert_eq!(parse_date(&text("20/01/2026")), Ok(expected));
        let dt = expected.and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(parse_date(&Cell::DateTime(dt)), Ok(expected));
    }

    #[test]
    fn malformed_dates_are_rejected() {
        assert_eq!(parse_date(&text("20-01-2026")), Err(RowRejection::InvalidDate));
        assert_eq!(parse_date(&text("2026/01/20")), Err(RowRejection::InvalidDate));
        assert_eq!(parse_date(&Cell::Number(46042.0)), Err(RowRejection::InvalidDate));
    }

    #[test]
    fn times_accept_minutes_and_seconds() {
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        assert_eq!(parse_time(&text("09:00")), Ok(nine));
        assert_eq!(parse_time(&text("09:00:00")), Ok(nine));
        let dt = NaiveDate::from_ymd_opt(1899, 12, 31)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        assert_eq!(
            parse_time(&Cell::DateTime(dt)),
            Ok(NaiveTime::from_hms_opt(14, 30, 0).unwrap())
        );
        assert_eq!(parse_time(&text("9am")), Err(RowRejection::InvalidTime));
        assert_eq!(parse_time(&text("25:00")), Err(RowRejection::InvalidTime));
    }

    #[test]
    fn status_is_normalized_or_defaulted() {
        assert_eq!(normalize_status(&text(" Confirmada ")), AppointmentStatus::Confirmed);
        assert_eq!(normalize_status(&text("ATENDIDA")), AppointmentStatus::Attended);
        assert_eq!(normalize_status(&text("xyz")), AppointmentStatus::Pending);
        assert_eq!(normalize_status(&Cell::Empty), AppointmentStatus::Pending);
    }

    #[tokio::test]
    async fn appointment_row_for_unknown_patient() {
        let store = MemoryStore::default();
        let err = parse_appointment_row(
            &[text("+593991234567"), text("2026-01-20"), text("09:00"), text("confirmada")],
            &store,
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("no encontrado"));
        assert!(matches!(err, RowError::Rejected(RowRejection::PatientNotFound(ref m)) if m == "+593991234567"));
    }

    #[tokio::test]
    async fn appointment_row_checks_patient_before_date() {
        let store = MemoryStore::default();
        let err = parse_appointment_row(&[text("+593000000000"), text("bad"), text("09:00")], &store)
            .await
            .unwrap_err();
        assert!(matches!(err, RowError::Rejected(RowRejection::PatientNotFound(_))));
    }

    #[tokio::test]
    async fn appointment_row_with_malformed_date() {
        let store = MemoryStore::default();
        store.insert_patient("Juan", "Pérez", "+593991234567", true);

        let err = parse_appointment_row(&[text("+593991234567"), text("20-01-2026"), text("09:00")], &store)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Formato de fecha inválido.");
    }

    #[tokio::test]
    async fn appointment_row_defaults_status() {
        let store = MemoryStore::default();
        let patient_id = store.insert_patient("Juan", "Pérez", "+593991234567", true);

        let rec = parse_appointment_row(&[text("+593991234567"), text("20/01/2026"), text("09:30")], &store)
            .await
            .unwrap();

        assert_eq!(rec.patient_id, patient_id);
        assert_eq!(rec.date, NaiveDate::from_ymd_opt(2026, 1, 20).unwrap());
        assert_eq!(rec.time, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(rec.status, AppointmentStatus::Pending);
    }

    #[tokio::test]
    async fn appointment_row_missing_hour() {
        let store = MemoryStore::default();
        let err = parse_appointment_row(&[text("+593991234567"), text("2026-01-20")], &store)
            .await
            .unwrap_err();
        assert!(matches!(err, RowError::Rejected(RowRejection::MissingRequiredData)));
    }
}
