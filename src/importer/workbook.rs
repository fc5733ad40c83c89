// src/importer/workbook.rs
//
// Uploaded file -> rows of cells. Excel-family and .ods files go through calamine,
// .csv through the csv crate. Only the first worksheet is read.

use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Reader};
use csv::ReaderBuilder;

use super::cell::Cell;
use super::error::ImportError;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// All rows of one worksheet, row 1 (the header) included. `rows[i]` is
/// spreadsheet row `i + 1`.
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    /// Rows after the header.
    pub fn data_rows(&self) -> &[Vec<Cell>] {
        self.rows.get(1..).unwrap_or(&[])
    }
}

pub fn read_sheet(file_name: &str, bytes: &[u8]) -> Result<Sheet, ImportError> {
    if bytes.is_empty() {
        return Err(ImportError::EmptyFile);
    }

    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "csv" => read_csv(bytes),
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_workbook(bytes),
        "" => Err(ImportError::UnsupportedFormat(file_name.to_string())),
        other => Err(ImportError::UnsupportedFormat(format!(".{other}"))),
    }
}

fn read_workbook(bytes: &[u8]) -> Result<Sheet, ImportError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ImportError::Workbook(e.to_string()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(ImportError::NoWorksheet)?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| ImportError::Workbook(e.to_string()))?;

    // calamine trims leading empty rows/columns from the used range; pad
    // them back so row numbers and column positions match the file.
    let (row_offset, col_offset) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); row_offset];
    for data_row in range.rows() {
        let mut cells = vec![Cell::Empty; col_offset];
        cells.extend(data_row.iter().cloned().map(Cell::from));
        rows.push(cells);
    }

    tracing::debug!(sheet = %sheet_name, rows = rows.len(), "workbook read");
    Ok(Sheet { rows })
}

fn read_csv(bytes: &[u8]) -> Result<Sheet, ImportError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(sniff_delimiter(bytes))
        .from_reader(bytes);

    let mut rows: Vec<Vec<Cell>> = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(Cell::text).collect());
    }

    Ok(Sheet { rows })
}

/// Spreadsheet apps in comma-decimal locales export CSV with `;`.
fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let first_line = bytes.split(|b| *b == b'\n').next().unwrap_or(&[]);
    let commas = first_line.iter().filter(|b| **b == b',').count();
    let semicolons = first_line.iter().filter(|b| **b == b';').count();
    if semicolons > commas { b';' } else { b',' }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    use crate::importer::row_parser::{parse_date, parse_time};

    const PACIENTES_XLSX: &[u8] = include_bytes!("../../tests/fixtures/pacientes.xlsx");
    const CITAS_XLSX: &[u8] = include_bytes!("../../tests/fixtures/citas.xlsx");
    const CITAS_ODS: &[u8] = include_bytes!("../../tests/fixtures/citas.ods");
    const CORRUPT_XLSX: &[u8] = include_bytes!("../../tests/fixtures/corrupto.xlsx");

    #[test]
    fn csv_rows_include_header() {
        let sheet = read_sheet("pacientes.csv", "Nombre,Apellido,Móvil\nJuan,Pérez,+593991234567\n".as_bytes())
            .unwrap();

        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.data_rows().len(), 1);
        assert_eq!(sheet.data_rows()[0][0], Cell::Text("Juan".into()));
    }

    #[test]
    fn csv_with_bom_and_semicolons() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice("Móvil;Fecha;Hora\n+593991234567;20/01/2026;09:00\n".as_bytes());

        let sheet = read_sheet("citas.CSV", &bytes).unwrap();

        assert_eq!(sheet.rows[0][0], Cell::Text("Móvil".into()));
        assert_eq!(
            sheet.data_rows()[0],
            vec![
                Cell::Text("+593991234567".into()),
                Cell::Text("20/01/2026".into()),
                Cell::Text("09:00".into()),
            ]
        );
    }

    #[test]
    fn csv_empty_fields_are_empty_cells() {
        let sheet = read_sheet("p.csv", b"a,b,c\nJuan,,1\n").unwrap();
        assert_eq!(sheet.data_rows()[0][1], Cell::Empty);
    }

    #[test]
    fn header_only_sheet_has_no_data_rows() {
        let sheet = read_sheet("p.csv", b"Nombre,Apellido,Movil\n").unwrap();
        assert!(sheet.data_rows().is_empty());
        assert!(Sheet::default().data_rows().is_empty());
    }

    #[test]
    fn unsupported_and_empty_files_fail_whole() {
        assert!(matches!(
            read_sheet("notas.pdf", b"%PDF"),
            Err(ImportError::UnsupportedFormat(ext)) if ext == ".pdf"
        ));
        assert!(matches!(read_sheet("sin_extension", b"x"), Err(ImportError::UnsupportedFormat(_))));
        assert!(matches!(read_sheet("p.xlsx", b""), Err(ImportError::EmptyFile)));
    }

    #[test]
    fn corrupt_workbook_fails_whole() {
        assert!(matches!(read_sheet("corrupto.xlsx", CORRUPT_XLSX), Err(ImportError::Workbook(_))));
    }

    #[test]
    fn xlsx_patient_sheet() {
        let sheet = read_sheet("pacientes.xlsx", PACIENTES_XLSX).unwrap();
        let data = sheet.data_rows();

        assert_eq!(data.len(), 3);
        assert_eq!(data[0][1], Cell::Text("Pérez".into()));
        assert_eq!(data[1][2].to_text(), "593991112233");
        assert!(data[2][1].is_blank());
    }

    #[test]
    fn xlsx_native_dates_and_times() {
        let sheet = read_sheet("citas.xlsx", CITAS_XLSX).unwrap();
        let data = sheet.data_rows();

        assert_eq!(data.len(), 2);
        assert_eq!(parse_date(&data[0][1]), Ok(NaiveDate::from_ymd_opt(2026, 1, 20).unwrap()));
        assert_eq!(parse_time(&data[0][2]), Ok(NaiveTime::from_hms_opt(9, 0, 0).unwrap()));
        assert_eq!(parse_date(&data[1][1]), Ok(NaiveDate::from_ymd_opt(2026, 1, 21).unwrap()));
    }

    #[test]
    fn ods_native_dates_and_times() {
        let sheet = read_sheet("citas.ods", CITAS_ODS).unwrap();
        let data = sheet.data_rows();

        assert_eq!(sheet.rows[0][0], Cell::Text("Móvil".into()));
        assert_eq!(data.len(), 2);
        assert_eq!(data[0][0].to_text(), "+593991234567");
        assert_eq!(parse_date(&data[0][1]), Ok(NaiveDate::from_ymd_opt(2026, 1, 20).unwrap()));
        assert_eq!(parse_time(&data[0][2]), Ok(NaiveTime::from_hms_opt(9, 0, 0).unwrap()));
        assert_eq!(data[0][3], Cell::Text("confirmada".into()));
        assert_eq!(parse_date(&data[1][1]), Ok(NaiveDate::from_ymd_opt(2026, 1, 21).unwrap()));
        assert_eq!(parse_time(&data[1][2]), Ok(NaiveTime::from_hms_opt(14, 30, 0).unwrap()));
    }
}
