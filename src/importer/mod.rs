//! Spreadsheet import of patients and appointments.
//!
//! `workbook` turns an upload into rows of [`Cell`]s, `row_parser` validates
//! one row at a time and `reconciler` upserts every valid row through an
//! [`ImportStore`], collecting an [`ImportOutcome`].

pub mod cell;
pub mod error;
pub mod outcome;
pub mod reconciler;
pub mod row_parser;
pub mod store;
pub mod template;
pub mod workbook;

pub use cell::Cell;
pub use error::ImportError;
pub use outcome::{ImportOutcome, ImportReport};
pub use reconciler::{reconcile_appointments, reconcile_patients, ImportContext};
pub use store::PgImportStore;
pub use template::TemplateKind;
pub use workbook::read_sheet;
