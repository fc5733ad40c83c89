// src/importer/reconciler.rs
//
// Runs one import batch row by row. Each row stands alone: a failure on row
// N never undoes what rows before it already wrote.

use uuid::Uuid;

use super::cell::Cell;
use super::error::RowError;
use super::outcome::ImportOutcome;
use super::row_parser::{parse_appointment_row, parse_patient_row};
use super::store::ImportStore;

/// Spreadsheet row number of the first data row (row 1 is the header).
pub const FIRST_DATA_ROW: usize = 2;

/// Who asked for the import and from which file. Only used for logging.
#[derive(Debug, Clone)]
pub struct ImportContext {
    pub requested_by: Uuid,
    pub file_name: String,
}

/// Imports patient rows (header already stripped).
pub async fn reconcile_patients<S>(ctx: &ImportContext, store: &S, rows: &[Vec<Cell>]) -> ImportOutcome
where
    S: ImportStore + ?Sized,
{
    let mut outcome = ImportOutcome::default();

    for (offset, row) in rows.iter().enumerate() {
        let row_index = FIRST_DATA_ROW + offset;

        let record = match parse_patient_row(row) {
            Ok(record) => record,
            Err(rejection) => {
                outcome.record_rejection(row_index, rejection.to_string());
                continue;
            }
        };

        match store.upsert_patient(&record).await {
            Ok(action) => outcome.record_upsert(action),
            Err(e) => {
                tracing::warn!(row = row_index, file = %ctx.file_name, error = %e, "patient upsert failed");
                outcome.record_rejection(row_index, e.to_string());
            }
        }
    }

    log_outcome("patients", ctx, &outcome);
    outcome
}

/// Imports appointment rows (header already stripped).
pub async fn reconcile_appointments<S>(
    ctx: &ImportContext,
    store: &S,
    rows: &[Vec<Cell>],
) -> ImportOutcome
where
    S: ImportStore + ?Sized,
{
    let mut outcome = ImportOutcome::default();

    for (offset, row) in rows.iter().enumerate() {
        let row_index = FIRST_DATA_ROW + offset;

        let record = match parse_appointment_row(row, store).await {
            Ok(record) => record,
            Err(RowError::Rejected(rejection)) => {
                outcome.record_rejection(row_index, rejection.to_string());
                continue;
            }
            Err(RowError::Store(e)) => {
                tracing::warn!(row = row_index, file = %ctx.file_name, error = %e, "patient lookup failed");
                outcome.record_rejection(row_index, e.to_string());
                continue;
            }
        };

        match store.upsert_appointment(&record).await {
            Ok(action) => outcome.record_upsert(action),
            Err(e) => {
                tracing::warn!(row = row_index, file = %ctx.file_name, error = %e, "appointment upsert failed");
                outcome.record_rejection(row_index, e.to_string());
            }
        }
    }

    log_outcome("appointments", ctx, &outcome);
    outcome
}

fn log_outcome(kind: &str, ctx: &ImportContext, outcome: &ImportOutcome) {
    tracing::info!(
        kind,
        requested_by = %ctx.requested_by,
        file = %ctx.file_name,
        created = outcome.created,
        updated = outcome.updated,
        rejected = outcome.rejected,
        "import finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::store::MemoryStore;
    use crate::models::AppointmentStatus;

    fn ctx() -> ImportContext {
        ImportContext {
            requested_by: Uuid::new_v4(),
            file_name: "test.xlsx".into(),
        }
    }

    fn row(cells: &[&str]) -> Vec<Cell> {
        cells.iter().map(|c| Cell::text(*c)).collect()
    }

    #[tokio::test]
    async fn patient_import_is_idempotent() {
        let store = MemoryStore::default();
        let rows = vec![row(&["Juan", "Pérez", "+593991234567"])];

        let first = reconcile_patients(&ctx(), &store, &rows).await;
        assert_eq!((first.created, first.updated, first.rejected), (1, 0, 0));

        let second = reconcile_patients(&ctx(), &store, &rows).await;
        assert_eq!((second.created, second.updated, second.rejected), (0, 1, 0));
        assert_eq!(store.patients.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reimport_refreshes_names_and_reactivates() {
        let store = MemoryStore::default();
        store.insert_patient("Juan", "Perez", "+593991234567", false);

        let outcome =
            reconcile_patients(&ctx(), &store, &[row(&["Juan Carlos", "Pérez", "+593991234567"])]).await;

        assert_eq!(outcome.updated, 1);
        let patient = store.patient("+593991234567").unwrap();
        assert!(patient.is_active);
        assert_eq!(patient.first_name, "Juan Carlos");
        assert_eq!(patient.last_name, "Pérez");
    }

    #[tokio::test]
    async fn duplicate_mobile_in_one_batch_updates_the_first() {
        let store = MemoryStore::default();
        let rows = vec![
            row(&["Juan", "Pérez", "+593991234567"]),
            row(&["Juana", "Pérez", "+593991234567"]),
        ];

        let outcome = reconcile_patients(&ctx(), &store, &rows).await;

        assert_eq!((outcome.created, outcome.updated), (1, 1));
        assert_eq!(store.patients.lock().unwrap().len(), 1);
        assert_eq!(store.patient("+593991234567").unwrap().first_name, "Juana");
    }

    #[tokio::test]
    async fn rejected_rows_carry_spreadsheet_row_numbers() {
        let store = MemoryStore::default();
        let rows = vec![
            row(&["Juan", "Pérez", "+593991234567"]),
            row(&["", "González", "+593992345678"]),
            row(&["Carlos", "López", "+593993456789"]),
        ];

        let outcome = reconcile_patients(&ctx(), &store, &rows).await;

        assert_eq!((outcome.created, outcome.rejected), (2, 1));
        assert_eq!(outcome.rejections[0].row_index, 3);
        assert_eq!(outcome.render().details, vec!["Fila 3: Faltan datos obligatorios"]);
    }

    #[tokio::test]
    async fn storage_errors_do_not_stop_the_batch() {
        let store = MemoryStore::default();
        store.fail_writes_for("+593992345678");
        let rows = vec![
            row(&["Juan", "Pérez", "+593991234567"]),
            row(&["María", "González", "+593992345678"]),
            row(&["Carlos", "López", "+593993456789"]),
        ];

        let outcome = reconcile_patients(&ctx(), &store, &rows).await;

        assert_eq!((outcome.created, outcome.rejected), (2, 1));
        assert_eq!(outcome.rejections[0].row_index, 3);
        assert!(outcome.rejections[0].reason.contains("duplicate key"));
    }

    #[tokio::test]
    async fn appointment_without_patient_is_rejected() {
        let store = MemoryStore::default();
        let rows = vec![row(&["+593991234567", "2026-01-20", "09:00", "confirmada"])];

        let outcome = reconcile_appointments(&ctx(), &store, &rows).await;

        assert_eq!((outcome.created, outcome.updated, outcome.rejected), (0, 0, 1));
        assert!(outcome.rejections[0].reason.contains("no encontrado"));
        assert!(store.appointments.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn appointment_with_malformed_date_is_rejected() {
        let store = MemoryStore::default();
        store.insert_patient("Juan", "Pérez", "+593991234567", true);

        let outcome =
            reconcile_appointments(&ctx(), &store, &[row(&["+593991234567", "20-01-2026", "09:00"])]).await;

        assert_eq!(outcome.rejected, 1);
        assert_eq!(outcome.rejections[0].reason, "Formato de fecha inválido.");
    }

    #[tokio::test]
    async fn appointment_upsert_only_touches_status() {
        let store = MemoryStore::default();
        store.insert_patient("Juan", "Pérez", "+593991234567", true);

        let first = reconcile_appointments(
            &ctx(),
            &store,
            &[row(&["+593991234567", "2026-01-20", "09:00", "confirmada"])],
        )
        .await;
        assert_eq!((first.created, first.updated), (1, 0));

        // same key written in the other date and time formats
        let second = reconcile_appointments(
            &ctx(),
            &store,
            &[row(&["+593991234567", "20/01/2026", "09:00:00", "cancelada"])],
        )
        .await;
        assert_eq!((second.created, second.updated), (0, 1));

        let appointments = store.appointments.lock().unwrap();
        assert_eq!(appointments.len(), 1);
        assert_eq!(appointments[0].status, AppointmentStatus::Cancelled);
    }

    #[tokio::test]
    async fn unknown_status_is_stored_as_pending() {
        let store = MemoryStore::default();
        store.insert_patient("Juan", "Pérez", "+593991234567", true);

        let outcome = reconcile_appointments(
            &ctx(),
            &store,
            &[row(&["+593991234567", "2026-01-20", "09:00", "xyz"])],
        )
        .await;

        assert_eq!((outcome.created, outcome.rejected), (1, 0));
        let appointments = store.appointments.lock().unwrap();
        assert_eq!(appointments[0].status, AppointmentStatus::Pending);
        assert_eq!(appointments[0].status.as_str(), "pendiente");
    }

    #[tokio::test]
    async fn appointment_batch_is_idempotent() {
        let store = MemoryStore::default();
        store.insert_patient("Juan", "Pérez", "+593991234567", true);
        store.insert_patient("María", "González", "+593992345678", true);
        let rows = vec![
            row(&["+593991234567", "2026-01-20", "09:00", "confirmada"]),
            row(&["+593992345678", "21/01/2026", "10:30"]),
            row(&["+593000000000", "2026-01-22", "11:00"]),
        ];

        let first = reconcile_appointments(&ctx(), &store, &rows).await;
        let second = reconcile_appointments(&ctx(), &store, &rows).await;

        assert_eq!((first.created, first.updated, first.rejected), (2, 0, 1));
        assert_eq!((second.created, second.updated, second.rejected), (0, 2, 1));
        assert_eq!(store.appointments.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_batch_yields_empty_outcome() {
        let store = MemoryStore::default();
        let outcome = reconcile_patients(&ctx(), &store, &[]).await;
        assert_eq!(outcome, ImportOutcome::default());
    }
}
