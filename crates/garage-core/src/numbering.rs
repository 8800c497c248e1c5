//! Document number formatting.
//!
//! Quotes and invoices carry yearly-scoped identifiers (`DEV-2026-001`,
//! `FAC-2026-014`). The sequence itself lives in the store's counter table
//! and is bumped atomically inside the transaction that inserts the
//! document row, so numbers stay gapless per (kind, year) even under
//! concurrent writers.

use serde::{Deserialize, Serialize};

/// Numbered document families, each with its own yearly counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    Quote,
    Invoice,
}

impl DocumentKind {
    /// Stable prefix used in document numbers and as the counter key.
    pub fn prefix(self) -> &'static str {
        match self {
            DocumentKind::Quote => "DEV",
            DocumentKind::Invoice => "FAC",
        }
    }
}

/// Render `PREFIX-YYYY-NNN`. Sequences past 999 widen naturally.
pub fn format_document_number(kind: DocumentKind, year: i32, seq: i64) -> String {
    format!("{}-{}-{:03}", kind.prefix(), year, seq)
}
