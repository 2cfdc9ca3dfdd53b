use async_trait::async_trait;
use neo4rs::{ConfigBuilder, Graph, query};

use super::migrate::run_ignoring_exists;
use super::{Constraint, GraphError, GraphStore, GraphWrite};
use crate::config::GraphConfig;

const MEMBERSHIP_CYPHER: &str = r#"
MERGE (l:Legislatura {numero: $legislatura})
MERGE (g:Grupo {nombre: $grupo})
MERGE (g)-[:EXISTE_EN]->(l)
MERGE (d:Diputado {nombre: $nombre})
MERGE (d)-[r:PERTENECE_A]->(g)
SET r.fecha_alta = CASE WHEN $fecha_alta <> "" THEN date($fecha_alta) ELSE NULL END,
    r.fecha_baja = CASE WHEN $fecha_baja <> "" THEN date($fecha_baja) ELSE NULL END
MERGE (d)-[:PARTICIPA_EN]->(l)
"#;

const REPRESENTATION_CYPHER: &str = r#"
MERGE (d:Diputado {nombre: $nombre})
MERGE (p:Provincia {nombre: $provincia})
MERGE (l:Legislatura {numero: $legislatura})
MERGE (d)-[:REPRESENTA_A]->(p)
MERGE (d)-[:PARTICIPA_EN]->(l)
"#;

const SUBSTITUTION_CYPHER: &str = r#"
MERGE (d1:Diputado {nombre: $sustituto})
MERGE (d2:Diputado {nombre: $sustituido})
MERGE (d1)-[r:SUSTITUYE_A]->(d2)
SET r.fecha_alta = CASE WHEN $fecha_alta <> "" THEN date($fecha_alta) ELSE NULL END,
    r.fecha_baja = CASE WHEN $fecha_baja <> "" THEN date($fecha_baja) ELSE NULL END
"#;

/// Neo4j connection applying [`GraphWrite`]s as Cypher `MERGE`s.
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
}

impl GraphClient {
    pub async fn connect(config: &GraphConfig) -> Result<Self, GraphError> {
        let neo = ConfigBuilder::default()
            .uri(config.uri.as_str())
            .user(config.user.as_str())
            .password(config.password.as_str())
            .db(config.database.as_str())
            .fetch_size(500)
            .max_connections(4)
            .build()?;
        let graph = Graph::connect(neo).await?;
        log::info!("Connected to Neo4j at {} ({})", config.uri, config.database);
        Ok(Self { graph })
    }

    pub fn inner(&self) -> &Graph {
        &self.graph
    }
}

#[async_trait]
impl GraphStore for GraphClient {
    async fn ensure_constraint(&self, constraint: &Constraint) -> Result<(), GraphError> {
        let cypher = format!(
            "CREATE CONSTRAINT {} IF NOT EXISTS FOR (n:{}) REQUIRE n.{} IS UNIQUE",
            constraint.name, constraint.label, constraint.property
        );
        run_ignoring_exists(&self.graph, &cypher).await?;
        Ok(())
    }

    async fn apply(&self, write: &GraphWrite) -> Result<(), GraphError> {
        let q = match write {
            GraphWrite::Membership {
                member,
                group,
                legislature,
                join_date,
                leave_date,
            } => query(MEMBERSHIP_CYPHER)
                .param("nombre", member.as_str())
                .param("grupo", group.as_str())
                .param("legislatura", legislature.as_str())
                .param("fecha_alta", join_date.as_str())
                .param("fecha_baja", leave_date.as_str()),
            GraphWrite::Representation {
                member,
                province,
                legislature,
            } => query(REPRESENTATION_CYPHER)
                .param("nombre", member.as_str())
                .param("provincia", province.as_str())
                .param("legislatura", legislature.as_str()),
            GraphWrite::Substitution {
                substitute,
                substituted,
                start_date,
                end_date,
            } => query(SUBSTITUTION_CYPHER)
                .param("sustituto", substitute.as_str())
                .param("sustituido", substituted.as_str())
                .param("fecha_alta", start_date.as_str())
                .param("fecha_baja", end_date.as_str()),
        };
        self.graph.run(q).await?;
        Ok(())
    }
}
