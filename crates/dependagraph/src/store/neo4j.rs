//! Neo4j graph store over the HTTP transactional Cypher endpoint.
//!
//! Every operation is a single `POST {uri}/db/{database}/tx/commit`. All
//! statements in one request run in one transaction: if any of them fails the
//! server rolls the whole request back and reports it in `errors`.

use crate::config::StoreSettings;
use crate::domain::{GraphNode, GraphStats, Repository, RepositoryReference};
use crate::error::StoreError;
use crate::store::GraphStore;
use async_trait::async_trait;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashSet;

const SCHEMA_CONSTRAINT: &str = "CREATE CONSTRAINT repository_full_name IF NOT EXISTS \
     FOR (r:Repository) REQUIRE r.full_name IS UNIQUE";

const MARK_TARGETED: &str =
    "MERGE (c:Repository {full_name: $full_name}) SET c.last_targeted = timestamp()";

// Neighbor nodes are merged on their own before the edge, so an existing node
// is reused instead of a second one being created by a pattern MERGE.
const MERGE_DEPENDENCIES: &str = "MATCH (c:Repository {full_name: $full_name}) \
     UNWIND $names AS name \
     MERGE (d:Repository {full_name: name}) \
     MERGE (c)-[:DEPENDS_ON]->(d)";

const MERGE_DEPENDENTS: &str = "MATCH (c:Repository {full_name: $full_name}) \
     UNWIND $names AS name \
     MERGE (d:Repository {full_name: name}) \
     MERGE (d)-[:DEPENDS_ON]->(c)";

const UNTARGETED_NODE: &str = "MATCH (n:Repository) \
     WHERE n.last_targeted IS NULL \
       AND NOT n.full_name CONTAINS '.' \
       AND n.full_name =~ '[^/]+/[^/]+' \
       AND NOT n.full_name IN $exclude \
     RETURN n.full_name LIMIT 1";

const GET_NODE: &str =
    "MATCH (n:Repository {full_name: $full_name}) RETURN n.full_name, n.last_targeted";

const GET_DEPENDENCIES: &str = "MATCH (:Repository {full_name: $full_name})-[:DEPENDS_ON]->(d:Repository) \
     RETURN DISTINCT d.full_name ORDER BY d.full_name";

const GET_DEPENDENTS: &str = "MATCH (:Repository {full_name: $full_name})<-[:DEPENDS_ON]-(d:Repository) \
     RETURN DISTINCT d.full_name ORDER BY d.full_name";

const COUNT_NODES: &str =
    "MATCH (n:Repository) RETURN count(n), count(n.last_targeted)";

const COUNT_EDGES: &str = "MATCH (:Repository)-[r:DEPENDS_ON]->(:Repository) RETURN count(r)";

/// One Cypher statement with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct Statement {
    statement: &'static str,
    parameters: Value,
}

impl Statement {
    fn new(statement: &'static str, parameters: Value) -> Self {
        Self {
            statement,
            parameters,
        }
    }
}

#[derive(Debug, Serialize)]
struct CommitRequest<'a> {
    statements: &'a [Statement],
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    errors: Vec<CypherError>,
}

#[derive(Debug, Default, Deserialize)]
struct StatementResult {
    #[serde(default)]
    data: Vec<ResultRow>,
}

#[derive(Debug, Deserialize)]
struct ResultRow {
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct CypherError {
    code: String,
    message: String,
}

/// Graph store backed by a Neo4j server.
pub struct Neo4jStore {
    client: reqwest::Client,
    commit_url: String,
    user: String,
    password: String,
}

impl Neo4jStore {
    /// Build a store for the server at `uri` without contacting it.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Http` if the HTTP client cannot be built.
    pub fn new(uri: &str, settings: &StoreSettings) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("dependagraph/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            commit_url: commit_url(uri, &settings.database),
            user: settings.user.clone(),
            password: settings.password.clone(),
        })
    }

    /// Build a store and make sure the `full_name` uniqueness constraint exists.
    ///
    /// This is the first round trip, so bad credentials or an unreachable
    /// server surface here rather than on the first crawl.
    ///
    /// # Errors
    ///
    /// Any error from [`Neo4jStore::new`] or from running the schema statement.
    pub async fn connect(uri: &str, settings: &StoreSettings) -> Result<Self, StoreError> {
        let store = Self::new(uri, settings)?;
        store
            .commit(&[Statement::new(SCHEMA_CONSTRAINT, json!({}))])
            .await?;
        tracing::debug!(url = %store.commit_url, "Connected to Neo4j");
        Ok(store)
    }

    async fn commit(&self, statements: &[Statement]) -> Result<Vec<StatementResult>, StoreError> {
        let response = self
            .client
            .post(&self.commit_url)
            .basic_auth(&self.user, Some(&self.password))
            .header(reqwest::header::ACCEPT, "application/json;charset=UTF-8")
            .json(&CommitRequest { statements })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status(status.as_u16()));
        }

        let body: CommitResponse = response.json().await?;
        into_results(body)
    }
}

fn commit_url(uri: &str, database: &str) -> String {
    format!("{}/db/{database}/tx/commit", uri.trim_end_matches('/'))
}

fn names(repositories: &[Repository]) -> Vec<&str> {
    repositories
        .iter()
        .map(|r| r.fully_qualified_name.as_str())
        .collect()
}

pub(crate) fn window_statements(
    reference: &RepositoryReference,
    dependencies: &[Repository],
    dependents: &[Repository],
) -> Vec<Statement> {
    let full_name = reference.to_string();
    vec![
        Statement::new(MARK_TARGETED, json!({ "full_name": full_name })),
        Statement::new(
            MERGE_DEPENDENCIES,
            json!({ "full_name": full_name, "names": names(dependencies) }),
        ),
        Statement::new(
            MERGE_DEPENDENTS,
            json!({ "full_name": full_name, "names": names(dependents) }),
        ),
    ]
}

fn into_results(body: CommitResponse) -> Result<Vec<StatementResult>, StoreError> {
    if let Some(error) = body.errors.into_iter().next() {
        return Err(StoreError::Database {
            code: error.code,
            message: error.message,
        });
    }
    Ok(body.results)
}

fn first_result(results: Vec<StatementResult>) -> StatementResult {
    results.into_iter().next().unwrap_or_default()
}

fn string_column(result: StatementResult) -> Vec<String> {
    result
        .data
        .into_iter()
        .filter_map(|row| row.row.into_iter().next())
        .filter_map(|value| value.as_str().map(str::to_string))
        .collect()
}

fn count_at(result: &StatementResult, column: usize) -> usize {
    result
        .data
        .first()
        .and_then(|row| row.row.get(column))
        .and_then(Value::as_u64)
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0)
}

fn decode_node(result: StatementResult) -> Option<GraphNode> {
    let row = result.data.into_iter().next()?.row;
    let full_name = row.first()?.as_str()?.to_string();
    let last_targeted = row
        .get(1)
        .and_then(Value::as_i64)
        .and_then(DateTime::from_timestamp_millis);
    Some(GraphNode {
        full_name,
        last_targeted,
    })
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn save_window(
        &self,
        reference: &RepositoryReference,
        dependencies: &[Repository],
        dependents: &[Repository],
    ) -> Result<(), StoreError> {
        self.commit(&window_statements(reference, dependencies, dependents))
            .await?;
        tracing::debug!(
            repository = %reference,
            dependencies = dependencies.len(),
            dependents = dependents.len(),
            "Saved window"
        );
        Ok(())
    }

    async fn get_untargeted_node(
        &self,
        exclude: &HashSet<String>,
    ) -> Result<Option<RepositoryReference>, StoreError> {
        let exclude: Vec<&str> = exclude.iter().map(String::as_str).collect();
        let results = self
            .commit(&[Statement::new(UNTARGETED_NODE, json!({ "exclude": exclude }))])
            .await?;

        // Parsing again keeps a bad row from surfacing as a reference.
        Ok(string_column(first_result(results))
            .iter()
            .find_map(|name| RepositoryReference::parse(name).ok()))
    }

    async fn get_node(&self, full_name: &str) -> Result<Option<GraphNode>, StoreError> {
        let results = self
            .commit(&[Statement::new(GET_NODE, json!({ "full_name": full_name }))])
            .await?;
        Ok(decode_node(first_result(results)))
    }

    async fn get_dependencies(&self, full_name: &str) -> Result<Vec<String>, StoreError> {
        let results = self
            .commit(&[Statement::new(GET_DEPENDENCIES, json!({ "full_name": full_name }))])
            .await?;
        Ok(string_column(first_result(results)))
    }

    async fn get_dependents(&self, full_name: &str) -> Result<Vec<String>, StoreError> {
        let results = self
            .commit(&[Statement::new(GET_DEPENDENTS, json!({ "full_name": full_name }))])
            .await?;
        Ok(string_column(first_result(results)))
    }

    async fn stats(&self) -> Result<GraphStats, StoreError> {
        let mut results = self
            .commit(&[
                Statement::new(COUNT_NODES, json!({})),
                Statement::new(COUNT_EDGES, json!({})),
            ])
            .await?
            .into_iter();
        let nodes = results.next().unwrap_or_default();
        let edges = results.next().unwrap_or_default();
        Ok(GraphStats {
            nodes: count_at(&nodes, 0),
            edges: count_at(&edges, 0),
            targeted: count_at(&nodes, 1),
        })
    }

    async fn close(&self) -> Result<(), StoreError> {
        // Every request is its own committed transaction; nothing is pending.
        Ok(())
    }
}
