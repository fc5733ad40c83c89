// src/importer/outcome.rs

use serde::Serialize;

use super::store::UpsertAction;

/// How many rejection lines are shown to the user.
pub const MAX_DISPLAYED_REJECTIONS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowRejected {
    pub row_index: usize,
    pub reason: String,
}

/// Result of one import batch. Counters are always complete; only the
/// rendered report truncates the rejection list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportOutcome {
    pub created: usize,
    pub updated: usize,
    pub rejected: usize,
    pub rejections: Vec<RowRejected>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub summary: String,
    pub details: Vec<String>,
}

impl ImportOutcome {
    pub fn record_upsert(&mut self, action: UpsertAction) {
        match action {
            UpsertAction::Created => self.created += 1,
            UpsertAction::Updated => self.updated += 1,
        }
    }

    pub fn record_rejection(&mut self, row_index: usize, reason: impl Into<String>) {
        self.rejected += 1;
        self.rejections.push(RowRejected {
            row_index,
            reason: reason.into(),
        });
    }

    pub fn render(&self) -> ImportReport {
        let summary = format!(
            "✓ Importación completada: {} nuevos, {} actualizados, {} errores",
            self.created, self.updated, self.rejected
        );

        let mut details: Vec<String> = self
            .rejections
            .iter()
            .take(MAX_DISPLAYED_REJECTIONS)
            .map(|r| format!("Fila {}: {}", r.row_index, r.reason))
            .collect();

        if self.rejections.len() > MAX_DISPLAYED_REJECTIONS {
            details.push(format!(
                "... y {} errores más",
                self.rejections.len() - MAX_DISPLAYED_REJECTIONS
            ));
        }

        ImportReport { summary, details }
    }
}
