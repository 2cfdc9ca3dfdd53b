//! Property-graph side: typed merge operations and the stores that apply them.

pub mod client;
pub mod importer;
pub mod memory;
pub mod migrate;
#[cfg(feature = "test-utils")]
pub mod testutil;

use async_trait::async_trait;

use crate::config::ConfigError;

pub use client::GraphClient;
pub use importer::{ImportReport, format_date, import_deputies, import_groups, normalize_province};
pub use memory::MemoryGraph;
pub use migrate::ensure_constraints;

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Neo4j error: {0}")]
    Neo4j(#[from] neo4rs::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Write rejected: {0}")]
    Rejected(String),
}

/// A uniqueness constraint on a node label's natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constraint {
    pub name: &'static str,
    pub label: &'static str,
    pub property: &'static str,
}

pub const CONSTRAINTS: [Constraint; 4] = [
    Constraint {
        name: "diputado_nombre_unico",
        label: "Diputado",
        property: "nombre",
    },
    Constraint {
        name: "grupo_nombre_unico",
        label: "Grupo",
        property: "nombre",
    },
    Constraint {
        name: "provincia_nombre_unico",
        label: "Provincia",
        property: "nombre",
    },
    Constraint {
        name: "legislatura_numero_unico",
        label: "Legislatura",
        property: "numero",
    },
];

/// One idempotent upsert. Dates are ISO `YYYY-MM-DD`; an empty string is
/// stored as null.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphWrite {
    /// Diputado -PERTENECE_A-> Grupo -EXISTE_EN-> Legislatura, plus PARTICIPA_EN.
    Membership {
        member: String,
        group: String,
        legislature: String,
        join_date: String,
        leave_date: String,
    },
    /// Diputado -REPRESENTA_A-> Provincia, plus PARTICIPA_EN.
    Representation {
        member: String,
        province: String,
        legislature: String,
    },
    /// Substitute -SUSTITUYE_A-> substituted.
    Substitution {
        substitute: String,
        substituted: String,
        start_date: String,
        end_date: String,
    },
}

impl GraphWrite {
    pub fn kind(&self) -> &'static str {
        match self {
            GraphWrite::Membership { .. } => "PERTENECE_A",
            GraphWrite::Representation { .. } => "REPRESENTA_A",
            GraphWrite::Substitution { .. } => "SUSTITUYE_A",
        }
    }
}

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Creates the constraint unless it already exists.
    async fn ensure_constraint(&self, constraint: &Constraint) -> Result<(), GraphError>;

    async fn apply(&self, write: &GraphWrite) -> Result<(), GraphError>;
}
