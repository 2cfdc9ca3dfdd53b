use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use super::{GraphStore, GraphWrite};
use crate::types::{EnrichedDeputy, GroupMembership, Legislature};

const PROVINCE_PREFIXES: [&str; 2] = ["Diputado por ", "Diputada por "];

/// `DD/MM/YYYY` to ISO `YYYY-MM-DD`. Blank input gives an empty string, and
/// so does an invalid date after a warning.
pub fn format_date(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }
    match NaiveDate::parse_from_str(raw, "%d/%m/%Y") {
        Ok(date) => date.format("%Y-%m-%d").to_string(),
        Err(_) => {
            log::warn!("Invalid date: {}", raw);
            String::new()
        }
    }
}

/// Drops the "Diputado por " / "Diputada por " wording around a province.
pub fn normalize_province(raw: &str) -> String {
    PROVINCE_PREFIXES
        .iter()
        .fold(raw.to_string(), |text, prefix| text.replace(prefix, ""))
        .trim()
        .to_string()
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub rows: usize,
    pub applied: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\nImport:")?;
        writeln!(f, "  Rows read:       {}", self.rows)?;
        writeln!(f, "  Writes applied:  {}", self.applied)?;
        writeln!(f, "  Writes failed:   {}", self.failed)?;
        writeln!(f, "  Rows skipped:    {}", self.skipped)
    }
}

impl ImportReport {
    async fn apply<G: GraphStore + ?Sized>(&mut self, store: &G, write: GraphWrite, row: &str) {
        match store.apply(&write).await {
            Ok(()) => self.applied += 1,
            Err(e) => {
                self.failed += 1;
                log::warn!("Error writing {} for row {}: {}", write.kind(), row, e);
            }
        }
    }
}

/// Merges each membership row into the graph under `legislature`.
///
/// The legislature argument wins over the row's own column. A failed write
/// is logged and counted; the remaining rows are still imported.
pub async fn import_groups<G: GraphStore + ?Sized>(
    store: &G,
    rows: &[GroupMembership],
    legislature: &Legislature,
) -> ImportReport {
    let mut report = ImportReport {
        rows: rows.len(),
        ..ImportReport::default()
    };

    for row in rows {
        let member = row.member_name.trim();
        let group = row.group_name.trim();
        if member.is_empty() || group.is_empty() {
            log::debug!("Skipping membership row without name or group: {:?}", row);
            report.skipped += 1;
            continue;
        }

        let write = GraphWrite::Membership {
            member: member.to_string(),
            group: group.to_string(),
            legislature: legislature.to_string(),
            join_date: format_date(&row.join_date),
            leave_date: format_date(&row.leave_date),
        };
        report.apply(store, write, &row.to_string()).await;
    }

    log::info!(
        "Group import done: {} applied, {} failed",
        report.applied,
        report.failed
    );
    report
}

/// Province representation and substitution links for each deputy row.
///
/// The two merges of a row are independent: one failing does not stop the
/// other.
pub async fn import_deputies<G: GraphStore + ?Sized>(
    store: &G,
    rows: &[EnrichedDeputy],
    legislature: &Legislature,
) -> ImportReport {
    let mut report = ImportReport {
        rows: rows.len(),
        ..ImportReport::default()
    };

    for row in rows {
        let context = row.to_string();
        let name = row.name.trim();
        let province = normalize_province(&row.province);
        let substituted = row.substitutes.trim();
        let mut written = false;

        if !name.is_empty() && !province.is_empty() && !legislature.as_str().is_empty() {
            let write = GraphWrite::Representation {
                member: name.to_string(),
                province,
                legislature: legislature.to_string(),
            };
            report.apply(store, write, &context).await;
            written = true;
        }

        if !name.is_empty() && !substituted.is_empty() {
            let write = GraphWrite::Substitution {
                substitute: name.to_string(),
                substituted: substituted.to_string(),
                start_date: format_date(&row.substitution_start),
                end_date: format_date(&row.substitution_end),
            };
            report.apply(store, write, &context).await;
            written = true;
        }

        if !written {
            report.skipped += 1;
        }
    }

    log::info!(
        "Deputy import done: {} applied, {} failed",
        report.applied,
        report.failed
    );
    report
}
