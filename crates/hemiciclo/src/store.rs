//! CSV handoff between the scrapers and the graph import.

use std::io;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::types::{Deputy, EnrichedDeputy, GroupMembership, Substitution};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("{source_name} is missing required columns: {}", .missing.join(", "))]
    MissingColumns {
        source_name: String,
        missing: Vec<String>,
    },
}

/// A record with a fixed CSV header. Column order follows field order.
pub trait CsvRecord: Serialize {
    const COLUMNS: &'static [&'static str];
}

impl CsvRecord for GroupMembership {
    const COLUMNS: &'static [&'static str] = &[
        "nombre",
        "grupo_parlamentario",
        "fecha_alta",
        "fecha_baja",
        "legislatura",
    ];
}

impl CsvRecord for Deputy {
    const COLUMNS: &'static [&'static str] =
        &["nombre", "grupo_actual", "provincia", "legislatura"];
}

impl CsvRecord for EnrichedDeputy {
    const COLUMNS: &'static [&'static str] = &[
        "nombre",
        "grupo_actual",
        "provincia",
        "sustituye_a",
        "sustituido_por",
        "fecha_alta_suplencia",
        "fecha_baja_suplencia",
        "legislatura",
    ];
}

impl CsvRecord for Substitution {
    const COLUMNS: &'static [&'static str] = &[
        "nombre",
        "fecha_alta",
        "fecha_baja",
        "sustituye_a",
        "sustituido_por",
        "legislatura",
    ];
}

/// Columns a deputies file must carry to be imported.
pub const DEPUTY_IMPORT_COLUMNS: &[&str] = &[
    "nombre",
    "provincia",
    "sustituye_a",
    "fecha_alta_suplencia",
    "fecha_baja_suplencia",
    "legislatura",
];

/// Writes the header even when there are no records.
pub fn write_records_to<W: io::Write, T: CsvRecord>(
    writer: W,
    records: &[T],
) -> Result<(), csv::Error> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    wtr.write_record(T::COLUMNS)?;
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_records<T: CsvRecord>(path: &Path, records: &[T]) -> Result<(), csv::Error> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    write_records_to(std::fs::File::create(path)?, records)?;
    log::info!("Wrote {} rows to {}", records.len(), path.display());
    Ok(())
}

/// Reads all rows after checking the header carries every `required` column.
pub fn read_records_from<R: io::Read, T: DeserializeOwned>(
    reader: R,
    source_name: &str,
    required: &[&str],
) -> Result<Vec<T>, ImportError> {
    let mut rdr = csv::Reader::from_reader(reader);

    let headers = rdr.headers()?;
    let missing: Vec<String> = required
        .iter()
        .filter(|column| !headers.iter().any(|h| h.trim() == **column))
        .map(|column| column.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns {
            source_name: source_name.to_string(),
            missing,
        });
    }

    let rows = rdr.deserialize().collect::<Result<Vec<T>, _>>()?;
    Ok(rows)
}

pub fn read_group_rows(path: &Path) -> Result<Vec<GroupMembership>, ImportError> {
    let file = std::fs::File::open(path)?;
    read_records_from(file, &path.display().to_string(), GroupMembership::COLUMNS)
}

pub fn read_deputy_rows(path: &Path) -> Result<Vec<EnrichedDeputy>, ImportError> {
    let file = std::fs::File::open(path)?;
    read_records_from(file, &path.display().to_string(), DEPUTY_IMPORT_COLUMNS)
}
