// src/importer/error.rs

use thiserror::Error;

/// Whole-file failures. Any of these aborts the import before a single row
/// is processed.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("formato de archivo no soportado: {0} (use .xlsx, .xls, .ods o .csv)")]
    UnsupportedFormat(String),

    #[error("el archivo está vacío")]
    EmptyFile,

    #[error("el archivo supera el tamaño máximo de {0} bytes")]
    TooLarge(usize),

    #[error("el libro no contiene hojas")]
    NoWorksheet,

    #[error("no se pudo leer el libro: {0}")]
    Workbook(String),

    #[error("no se pudo leer el CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("no se pudo generar la plantilla: {0}")]
    Template(#[from] rust_xlsxwriter::XlsxError),
}

/// Recognized per-row validation failures. The display text is what staff
/// see next to the row number.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowRejection {
    #[error("Faltan datos obligatorios")]
    MissingRequiredData,

    #[error("Paciente con móvil {0} no encontrado")]
    PatientNotFound(String),

    #[error("Formato de fecha inválido.")]
    InvalidDate,

    #[error("Formato de hora inválido.")]
    InvalidTime,
}

/// Persistence failures raised by an [`ImportStore`](super::store::ImportStore).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("db error: {0}")]
    Db(#[from] sqlx::Error),
}

/// Anything that can go wrong while handling one row.
#[derive(Error, Debug)]
pub enum RowError {
    #[error(transparent)]
    Rejected(#[from] RowRejection),

    #[error(transparent)]
    Store(#[from] StoreError),
}
