use neo4rs::query;

use super::{CONSTRAINTS, GraphError, GraphStore};

/// Creates the natural-key uniqueness constraints. Failures are logged and
/// never abort the import; returns how many constraints are in place.
pub async fn ensure_constraints<G: GraphStore + ?Sized>(store: &G) -> usize {
    let mut ensured = 0;
    for constraint in &CONSTRAINTS {
        match store.ensure_constraint(constraint).await {
            Ok(()) => {
                ensured += 1;
                log::info!(
                    "Constraint '{}' verified for {}.{}",
                    constraint.name,
                    constraint.label,
                    constraint.property
                );
            }
            Err(e) => log::error!("Error creating constraint for {}: {}", constraint.label, e),
        }
    }
    ensured
}

pub(crate) fn is_already_exists(message: &str) -> bool {
    let msg = message.to_lowercase();
    msg.contains("already exists") || msg.contains("equivalent")
}

/// Runs a schema statement; "already exists" style failures count as success.
pub(crate) async fn run_ignoring_exists(
    g: &neo4rs::Graph,
    cypher: &str,
) -> Result<(), GraphError> {
    match g.run(query(cypher)).await {
        Ok(()) => Ok(()),
        Err(e) if is_already_exists(&e.to_string()) => {
            log::warn!(
                "Already exists (skipped): {}",
                cypher.chars().take(80).collect::<String>()
            );
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemoryGraph;

    #[test]
    fn test_already_exists_detection() {
        assert!(is_already_exists(
            "Neo.ClientError.Schema.EquivalentSchemaRuleAlreadyExists"
        ));
        assert!(is_already_exists("Constraint already exists: foo"));
        assert!(!is_already_exists("Invalid input 'CREAT'"));
    }

    #[tokio::test]
    async fn test_constraints_are_idempotent() {
        let graph = MemoryGraph::new();
        assert_eq!(ensure_constraints(&graph).await, 4);
        assert_eq!(ensure_constraints(&graph).await, 4);
        assert_eq!(graph.snapshot().constraints.len(), 4);
    }
}
