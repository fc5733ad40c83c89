// src/importer/store.rs

use async_trait::async_trait;
use uuid::Uuid;

use super::error::StoreError;
use super::row_parser::{AppointmentRecord, PatientRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    Created,
    Updated,
}

impl UpsertAction {
    fn from_inserted(inserted: bool) -> Self {
        if inserted { UpsertAction::Created } else { UpsertAction::Updated }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PatientRef {
    pub patient_id: Uuid,
    pub is_active: bool,
}

/// Persistence seen by the importer: lookups and natural-key upserts.
/// Uniqueness of the natural keys is the store's job.
#[async_trait]
pub trait ImportStore: Send + Sync {
    async fn find_patient_by_mobile(&self, mobile: &str) -> Result<Option<PatientRef>, StoreError>;

    /// Keyed by mobile. An existing patient gets the new names and is
    /// marked active again.
    async fn upsert_patient(&self, record: &PatientRecord) -> Result<UpsertAction, StoreError>;

    /// Keyed by (patient, date, time). An existing appointment only gets
    /// its status overwritten.
    async fn upsert_appointment(&self, record: &AppointmentRecord) -> Result<UpsertAction, StoreError>;
}

pub struct PgImportStore {
    db: sqlx::PgPool,
}

impl PgImportStore {
    pub fn new(db: sqlx::PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ImportStore for PgImportStore {
    async fn find_patient_by_mobile(&self, mobile: &str) -> Result<Option<PatientRef>, StoreError> {
        let row = sqlx::query_as::<_, PatientRef>(
            r#"
            SELECT patient_id, is_active
            FROM patient
            WHERE mobile = $1
            "#,
        )
        .bind(mobile)
        .fetch_optional(&self.db)
        .await?;

        Ok(row)
    }

    async fn upsert_patient(&self, record: &PatientRecord) -> Result<UpsertAction, StoreError> {
        // xmax = 0 only for freshly inserted tuples
        let inserted: bool = sqlx::query_scalar(
            r#"
            INSERT INTO patient (patient_id, first_name, last_name, mobile, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, TRUE, now(), now())
            ON CONFLICT ON CONSTRAINT patient_mobile_key DO UPDATE
            SET first_name = EXCLUDED.first_name,
                last_name  = EXCLUDED.last_name,
                is_active  = TRUE,
                updated_at = now()
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&record.first_name)
        .bind(&record.last_name)
        .bind(&record.mobile)
        .fetch_one(&self.db)
        .await?;

        Ok(UpsertAction::from_inserted(inserted))
    }

    async fn upsert_appointment(&self, record: &AppointmentRecord) -> Result<UpsertAction, StoreError> {
        let inserted: bool = sqlx::query_scalar(
            r#"
            INSERT INTO appointment (appointment_id, patient_id, appointment_date, appointment_time, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, now(), now())
            ON CONFLICT ON CONSTRAINT appointment_natural_key DO UPDATE
            SET status     = EXCLUDED.status,
                updated_at = now()
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(record.patient_id)
        .bind(record.date)
        .bind(record.time)
        .bind(record.status.as_str())
        .fetch_one(&self.db)
        .await?;

        Ok(UpsertAction::from_inserted(inserted))
    }
}

#[cfg(test)]
pub use memory::MemoryStore;

#[cfg(test)]
mod memory {
    use std::sync::Mutex;

    use chrono::{NaiveDate, NaiveTime};

    use super::*;
    use crate::models::AppointmentStatus;

    #[derive(Debug, Clone)]
    pub struct MemPatient {
        pub patient_id: Uuid,
        pub first_name: String,
        pub last_name: String,
        pub mobile: String,
        pub is_active: bool,
    }

    #[derive(Debug, Clone)]
    pub struct MemAppointment {
        pub patient_id: Uuid,
        pub date: NaiveDate,
        pub time: NaiveTime,
        pub status: AppointmentStatus,
    }

    /// In-memory store for tests. `fail_mobile` makes every write touching
    /// that mobile fail like a storage error would.
    #[derive(Default)]
    pub struct MemoryStore {
        pub patients: Mutex<Vec<MemPatient>>,
        pub appointments: Mutex<Vec<MemAppointment>>,
        pub fail_mobile: Mutex<Option<String>>,
    }

    impl MemoryStore {
        pub fn insert_patient(&self, first: &str, last: &str, mobile: &str, active: bool) -> Uuid {
            let patient_id = Uuid::new_v4();
            self.patients.lock().unwrap().push(MemPatient {
                patient_id,
                first_name: first.into(),
                last_name: last.into(),
                mobile: mobile.into(),
                is_active: active,
            });
            patient_id
        }

        pub fn patient(&self, mobile: &str) -> Option<MemPatient> {
            self.patients
                .lock()
                .unwrap()
                .iter()
                .find(|p| p.mobile == mobile)
                .cloned()
        }

        pub fn fail_writes_for(&self, mobile: &str) {
            *self.fail_mobile.lock().unwrap() = Some(mobile.to_string());
        }

        fn check_failure(&self, mobile: &str) -> Result<(), StoreError> {
            if self.fail_mobile.lock().unwrap().as_deref() == Some(mobile) {
                return Err(StoreError::Db(sqlx::Error::Protocol(format!(
                    "duplicate key value violates unique constraint for {mobile}"
                ))));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ImportStore for MemoryStore {
        async fn find_patient_by_mobile(&self, mobile: &str) -> Result<Option<PatientRef>, StoreError> {
            Ok(self.patient(mobile).map(|p| PatientRef {
                patient_id: p.patient_id,
                is_active: p.is_active,
            }))
        }

        async fn upsert_patient(&self, record: &PatientRecord) -> Result<UpsertAction, StoreError> {
            self.check_failure(&record.mobile)?;
            let mut patients = self.patients.lock().unwrap();
            if let Some(p) = patients.iter_mut().find(|p| p.mobile == record.mobile) {
                p.first_name = record.first_name.clone();
                p.last_name = record.last_name.clone();
                p.is_active = true;
                return Ok(UpsertAction::Updated);
            }
            patients.push(MemPatient {
                patient_id: Uuid::new_v4(),
                first_name: record.first_name.clone(),
                last_name: record.last_name.clone(),
                mobile: record.mobile.clone(),
                is_active: true,
            });
            Ok(UpsertAction::Created)
        }

        async fn upsert_appointment(&self, record: &AppointmentRecord) -> Result<UpsertAction, StoreError> {
            let mut appointments = self.appointments.lock().unwrap();
            if let Some(a) = appointments.iter_mut().find(|a| {
                a.patient_id == record.patient_id && a.date == record.date && a.time == record.time
            }) {
                a.status = record.status;
                return Ok(UpsertAction::Updated);
            }
            appointments.push(MemAppointment {
                patient_id: record.patient_id,
                date: record.date,
                time: record.time,
                status: record.status,
            });
            Ok(UpsertAction::Created)
        }
    }
}
