// src/importer/template.rs

use rust_xlsxwriter::{Color, Format, FormatBorder, Workbook};

use super::error::ImportError;

/// Blank import templates offered for download: header row plus a few
/// example rows showing the accepted formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Patients,
    Appointments,
}

impl TemplateKind {
    pub fn file_name(self) -> &'static str {
        match self {
            TemplateKind::Patients => "plantilla_pacientes.xlsx",
            TemplateKind::Appointments => "plantilla_citas.xlsx",
        }
    }

    fn header(self) -> &'static [&'static str] {
        match self {
            TemplateKind::Patients => &["Nombre", "Apellido", "Móvil"],
            TemplateKind::Appointments => &["Móvil", "Fecha", "Hora", "Estado"],
        }
    }

    fn examples(self) -> &'static [&'static [&'static str]] {
        match self {
            TemplateKind::Patients => &[
                &["Juan", "Pérez", "+593991234567"],
                &["María", "González", "+593992345678"],
                &["Carlos", "López", "+593993456789"],
            ],
            TemplateKind::Appointments => &[
                &["+593991234567", "2026-01-20", "09:00", "confirmada"],
                &["+593992345678", "21/01/2026", "10:30", "pendiente"],
                &["+593993456789", "2026-01-22", "15:45:00", ""],
            ],
        }
    }

    fn sheet_name(self) -> &'static str {
        match self {
            TemplateKind::Patients => "Pacientes",
            TemplateKind::Appointments => "Citas",
        }
    }

    /// Single-sheet workbook with a bold, shaded header row. Example values
    /// are written as text so they show the accepted formats verbatim.
    pub fn render(self) -> Result<Vec<u8>, ImportError> {
        let header_format = Format::new()
            .set_bold()
            .set_font_color(Color::White)
            .set_background_color(Color::RGB(0x1F4E78))
            .set_border(FormatBorder::Thin);

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(self.sheet_name())?;

        for (col, title) in (0u16..).zip(self.header()) {
            sheet.write_string_with_format(0, col, *title, &header_format)?;
            sheet.set_column_width(col, 18)?;
        }
        for (row, values) in (1u32..).zip(self.examples()) {
            for (col, value) in (0u16..).zip(values.iter()) {
                if !value.is_empty() {
                    sheet.write_string(row, col, *value)?;
                }
            }
        }
        sheet.set_freeze_panes(1, 0)?;

        Ok(workbook.save_to_buffer()?)
    }
}
