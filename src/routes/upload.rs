// src/routes/upload.rs
//
// Pieces shared by the patient and appointment import endpoints.

use axum::{
    extract::Multipart,
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::Serialize;

use crate::{
    error::ApiError,
    importer::{ImportError, ImportOutcome, ImportReport, TemplateKind},
};

/// Form field names accepted for the uploaded spreadsheet.
const FILE_FIELDS: [&str; 2] = ["archivo", "file"];

#[derive(Debug)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Serialize)]
pub struct ImportResult {
    pub outcome: ImportOutcome,
    pub report: ImportReport,
}

impl From<ImportOutcome> for ImportResult {
    fn from(outcome: ImportOutcome) -> Self {
        let report = outcome.render();
        ImportResult { outcome, report }
    }
}

/// First file field of the form. Other fields are skipped.
pub async fn read_upload(mut multipart: Multipart, max_bytes: usize) -> Result<Upload, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if !FILE_FIELDS.contains(&name.as_str()) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation(e.body_text()))?;

        if data.len() > max_bytes {
            return Err(ImportError::TooLarge(max_bytes).into());
        }

        return Ok(Upload {
            file_name,
            bytes: data.to_vec(),
        });
    }

    Err(ApiError::validation("No se seleccionó ningún archivo."))
}

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub fn template_download(kind: TemplateKind) -> Result<impl IntoResponse, ApiError> {
    let body = kind
        .render()
        .map_err(|e| ApiError::Internal(format!("template error: {e}")))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", kind.file_name()),
            ),
        ],
        body,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn template_is_served_as_xlsx_attachment() {
        let response = template_download(TemplateKind::Appointments)
            .unwrap()
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], XLSX_CONTENT_TYPE);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"plantilla_citas.xlsx\""
        );
    }
}
