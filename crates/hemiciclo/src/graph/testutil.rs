//! Disposable Neo4j for integration tests.

use testcontainers::{
    ContainerAsync, GenericImage, ImageExt,
    core::{ContainerPort, WaitFor},
    runners::AsyncRunner,
};

use super::GraphClient;
use crate::config::GraphConfig;

const PASSWORD: &str = "hemiciclo-test";

/// Starts a Neo4j container and connects to it.
///
/// The container stops when the returned handle is dropped, so keep it alive
/// for the whole test.
pub async fn neo4j_container() -> (ContainerAsync<GenericImage>, GraphClient) {
    let image = GenericImage::new("neo4j", "5.25.1-community")
        .with_exposed_port(ContainerPort::Tcp(7687))
        .with_wait_for(WaitFor::message_on_stdout("Started."))
        .with_env_var("NEO4J_AUTH", format!("neo4j/{PASSWORD}"));

    let container = image
        .start()
        .await
        .expect("Failed to start Neo4j container");
    let port = container
        .get_host_port_ipv4(7687)
        .await
        .expect("Failed to get Neo4j host port");

    let config = GraphConfig {
        uri: format!("bolt://127.0.0.1:{port}"),
        user: "neo4j".to_string(),
        password: PASSWORD.to_string(),
        database: "neo4j".to_string(),
    };
    let client = GraphClient::connect(&config)
        .await
        .expect("Failed to connect to Neo4j");

    (container, client)
}
