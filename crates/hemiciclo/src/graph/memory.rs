use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{Constraint, GraphError, GraphStore, GraphWrite};

/// Start and end of a dated relationship; `None` stands for a null date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Period {
    pub fecha_alta: Option<String>,
    pub fecha_baja: Option<String>,
}

impl Period {
    fn new(start: &str, end: &str) -> Self {
        let date = |d: &str| (!d.is_empty()).then(|| d.to_string());
        Self {
            fecha_alta: date(start),
            fecha_baja: date(end),
        }
    }
}

/// Nodes keyed by natural key and relationships keyed by their endpoints.
#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    pub constraints: BTreeSet<String>,
    pub deputies: BTreeSet<String>,
    pub groups: BTreeSet<String>,
    pub provinces: BTreeSet<String>,
    pub legislatures: BTreeSet<String>,
    pub memberships: BTreeMap<(String, String), Period>,
    pub group_legislatures: BTreeSet<(String, String)>,
    pub participations: BTreeSet<(String, String)>,
    pub representations: BTreeSet<(String, String)>,
    pub substitutions: BTreeMap<(String, String), Period>,
}

impl GraphSnapshot {
    pub fn node_count(&self) -> usize {
        self.deputies.len() + self.groups.len() + self.provinces.len() + self.legislatures.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.memberships.len()
            + self.group_legislatures.len()
            + self.participations.len()
            + self.representations.len()
            + self.substitutions.len()
    }
}

impl fmt::Display for GraphSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\nGraph:")?;
        writeln!(f, "  Diputado nodes:     {}", self.deputies.len())?;
        writeln!(f, "  Grupo nodes:        {}", self.groups.len())?;
        writeln!(f, "  Provincia nodes:    {}", self.provinces.len())?;
        writeln!(f, "  Legislatura nodes:  {}", self.legislatures.len())?;
        writeln!(f, "  PERTENECE_A:        {}", self.memberships.len())?;
        writeln!(f, "  REPRESENTA_A:       {}", self.representations.len())?;
        writeln!(f, "  SUSTITUYE_A:        {}", self.substitutions.len())?;
        writeln!(f, "  Relationships:      {}", self.relationship_count())
    }
}

/// In-process graph with the same merge semantics as the Neo4j store.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    state: Mutex<GraphSnapshot>,
    rejected: Mutex<HashSet<String>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every later write touching `name` fails.
    pub fn reject_writes_for(&self, name: &str) {
        lock(&self.rejected).insert(name.to_string());
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        lock(&self.state).clone()
    }

    fn check(&self, names: &[&str]) -> Result<(), GraphError> {
        let rejected = lock(&self.rejected);
        match names.iter().find(|n| rejected.contains(**n)) {
            Some(name) => Err(GraphError::Rejected(format!("write touching {name}"))),
            None => Ok(()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn pair(a: &str, b: &str) -> (String, String) {
    (a.to_string(), b.to_string())
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn ensure_constraint(&self, constraint: &Constraint) -> Result<(), GraphError> {
        lock(&self.state)
            .constraints
            .insert(constraint.name.to_string());
        Ok(())
    }

    async fn apply(&self, write: &GraphWrite) -> Result<(), GraphError> {
        match write {
            GraphWrite::Membership {
                member,
                group,
                legislature,
                join_date,
                leave_date,
            } => {
                self.check(&[member.as_str(), group.as_str()])?;
                let mut g = lock(&self.state);
                g.legislatures.insert(legislature.clone());
                g.groups.insert(group.clone());
                g.group_legislatures.insert(pair(group, legislature));
                g.deputies.insert(member.clone());
                g.memberships
                    .insert(pair(member, group), Period::new(join_date, leave_date));
                g.participations.insert(pair(member, legislature));
            }
            GraphWrite::Representation {
                member,
                province,
                legislature,
            } => {
                self.check(&[member.as_str(), province.as_str()])?;
                let mut g = lock(&self.state);
                g.deputies.insert(member.clone());
                g.provinces.insert(province.clone());
                g.legislatures.insert(legislature.clone());
                g.representations.insert(pair(member, province));
                g.participations.insert(pair(member, legislature));
            }
            GraphWrite::Substitution {
                substitute,
                substituted,
                start_date,
                end_date,
            } => {
                self.check(&[substitute.as_str(), substituted.as_str()])?;
                let mut g = lock(&self.state);
                g.deputies.insert(substitute.clone());
                g.deputies.insert(substituted.clone());
                g.substitutions.insert(
                    pair(substitute, substituted),
                    Period::new(start_date, end_date),
                );
            }
        }
        Ok(())
    }
}
